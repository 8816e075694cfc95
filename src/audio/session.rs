//! # Recording Session State
//!
//! One [`RecordingSession`] exists per WebSocket connection, created when
//! the connection opens and destroyed when it closes. A `start` action
//! (re)initializes the session for a new recording; `stop` freezes frame
//! intake but keeps the transcript around for summarize requests until the
//! next `start` or the disconnect.
//!
//! ## Session Lifecycle:
//! 1. **Idle**: connection open, frames dropped
//! 2. **Recording**: frames accepted into the buffer, passes triggered
//! 3. **Idle again**: after `stop`, transcript retained
//! 4. **Closed**: connection gone, all session memory released

use crate::audio::buffer::SessionBuffer;
use crate::language::Language;
use crate::transcript::TranscriptAggregator;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Per-connection state for one recording-to-transcript lifecycle.
///
/// ## Thread Safety:
/// Shared as `Arc<RecordingSession>` between the WebSocket actor, the
/// per-session transcription worker, and detached summarize tasks. The
/// buffer and transcript carry their own interior locking; the recording
/// flag and language use atomics/`RwLock` so no caller ever blocks on an
/// inference call.
pub struct RecordingSession {
    /// Unique identifier for this connection's session
    pub session_id: String,

    /// Whether audio frames are currently accepted into the buffer
    recording: AtomicBool,

    /// Language declared on the last `start`
    language: RwLock<Language>,

    /// Sample buffer and transcription watermark
    pub buffer: SessionBuffer,

    /// Running transcript of recognized fragments
    pub transcript: TranscriptAggregator,

    /// When the connection was opened
    pub created_at: DateTime<Utc>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            recording: AtomicBool::new(false),
            language: RwLock::new(Language::DEFAULT),
            buffer: SessionBuffer::new(),
            transcript: TranscriptAggregator::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn language(&self) -> Language {
        *self.language.read().unwrap()
    }

    /// (Re)initialize the session for a new recording.
    ///
    /// Clears the buffer (bumping its generation), clears the transcript,
    /// records the declared language, and starts accepting frames. Calling
    /// this while already recording is a full reset; nothing from the
    /// previous recording survives.
    pub fn begin_recording(&self, language: Language) {
        self.buffer.reset();
        self.transcript.clear();
        *self.language.write().unwrap() = language;
        self.recording.store(true, Ordering::SeqCst);
    }

    /// Stop accepting frames. Returns whether the session was recording;
    /// a `stop` on an idle session is a no-op.
    ///
    /// The buffer and transcript are left intact: the final flush still
    /// needs the unprocessed tail, and summarize requests remain valid
    /// until the next `start`.
    pub fn end_recording(&self) -> bool {
        self.recording.swap(false, Ordering::SeqCst)
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of live sessions with a concurrency cap.
///
/// Sessions share no mutable state with each other, so the registry exists
/// only to bound resource usage and feed the health endpoints.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<RecordingSession>>>,
    max_concurrent_sessions: usize,
}

impl SessionManager {
    pub fn new(max_concurrent_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_concurrent_sessions,
        }
    }

    /// Register a session at connection time.
    ///
    /// Fails when the concurrent session limit is reached; the connection
    /// is refused before the WebSocket handshake completes.
    pub fn register(&self, session: Arc<RecordingSession>) -> Result<(), String> {
        let mut sessions = self.sessions.write().unwrap();

        if sessions.len() >= self.max_concurrent_sessions {
            return Err(format!(
                "Maximum concurrent sessions ({}) reached",
                self.max_concurrent_sessions
            ));
        }

        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    /// Remove a session on disconnect. Returns whether it was registered.
    pub fn unregister(&self, session_id: &str) -> bool {
        self.sessions.write().unwrap().remove(session_id).is_some()
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<RecordingSession>> {
        self.sessions.read().unwrap().get(session_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_concurrent_sessions
    }
}
