//! # WebSocket Transcription Handler
//!
//! Drives one live transcription session per connection at
//! `/ws/transcription`.
//!
//! ## WebSocket Protocol:
//! - **Client → Server, binary**: raw PCM audio frames (mono, 16 kHz,
//!   little-endian 32-bit float samples)
//! - **Client → Server, text**: JSON control messages
//!   `{"action": "start", "lang": "fr"}`, `{"action": "stop"}`,
//!   `{"action": "summarize"}`
//! - **Server → Client, text**: JSON events
//!   `{"type": "info" | "transcription" | "summary", "message": "..."}`
//!
//! ## Session State Machine:
//! IDLE (post-connect) → RECORDING (after `start`) → IDLE (after `stop`,
//! transcript retained) → CLOSED (disconnect, from any state). Frames
//! outside RECORDING are dropped silently; malformed control messages are
//! ignored without an outbound error.
//!
//! ## Concurrency Model:
//! The actor itself never blocks on inference. Transcription passes run on
//! a dedicated per-session worker task fed through a FIFO job queue, so
//! results apply to the buffer in the order the passes were issued and a
//! `stop`'s final flush queues behind any in-flight pass. Summarize
//! requests run as detached tasks against a transcript snapshot. On
//! disconnect, in-flight calls are abandoned; events aimed at a closed
//! connection are dropped silently.

use crate::audio::decoder;
use crate::audio::scheduler::{PassMode, WindowingScheduler};
use crate::audio::session::{RecordingSession, SessionManager};
use crate::language::Language;
use crate::state::AppState;
use crate::summarization::{summarize_transcript, SummarizerRegistry};
use crate::transcription::SpeechToText;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Idle time after which a silent client is disconnected.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Event message sent when a recording starts.
pub const START_MESSAGE: &str = "🎤 Transcription démarrée";

/// Event message sent once a `stop`'s final flush has completed.
pub const STOP_MESSAGE: &str = "⏹️ Transcription arrêtée";

/// Warning sent for a `summarize` on an empty transcript.
pub const EMPTY_TRANSCRIPT_WARNING: &str = "⚠️ Aucun texte à résumer";

/// Control messages a client can send.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Begin a new recording; resets any previous one on this connection
    Start {
        /// Optional language code, lower-cased server-side; defaults to "fr"
        #[serde(default)]
        lang: Option<String>,
    },

    /// Stop the recording and flush remaining audio
    Stop,

    /// Summarize the transcript collected so far
    Summarize,
}

/// Events the server sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Informational and non-fatal error notices
    Info { message: String },

    /// A newly recognized transcript fragment
    Transcription { message: String },

    /// An on-demand summary (or the empty-transcript warning)
    Summary { message: String },
}

impl ServerEvent {
    pub fn info(message: impl Into<String>) -> Self {
        ServerEvent::Info {
            message: message.into(),
        }
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        ServerEvent::Transcription {
            message: message.into(),
        }
    }

    pub fn summary(message: impl Into<String>) -> Self {
        ServerEvent::Summary {
            message: message.into(),
        }
    }
}

/// Jobs on the per-session transcription queue.
#[derive(Debug, Clone, Copy)]
pub enum TranscribeJob {
    /// Threshold-triggered pass
    Incremental,

    /// `stop` flush over whatever unprocessed audio remains.
    /// Carries the recording generation at `stop` time so a flush queued
    /// behind a `start` does not touch the new recording.
    FinalFlush { generation: u64 },
}

/// Run one transcription pass end to end.
///
/// Claims a window, invokes the recognizer, and applies the result. On
/// success the watermark advances and any non-empty fragment is appended
/// and emitted. On failure only an `info` event goes out; the watermark
/// stays where it was, so the same audio is retried on the next triggering
/// append. Returns whether a pass ran and its result was applied.
async fn run_pass(
    session: &RecordingSession,
    scheduler: &WindowingScheduler,
    stt: &dyn SpeechToText,
    events: &mpsc::UnboundedSender<ServerEvent>,
    mode: PassMode,
) -> bool {
    let Some(window) = scheduler.claim(&session.buffer, mode) else {
        return false;
    };
    let language = session.language();

    debug!(
        session = %session.session_id,
        start = window.start,
        end = window.end,
        "Submitting transcription pass"
    );

    match stt.transcribe(&window.samples, language).await {
        Ok(text) => {
            if !scheduler.complete(&session.buffer, &window, mode) {
                debug!(
                    session = %session.session_id,
                    "Discarding pass result from a previous recording"
                );
                return false;
            }
            if let Some(fragment) = session.transcript.append(&text) {
                let _ = events.send(ServerEvent::transcription(fragment));
            }
            true
        }
        Err(e) => {
            warn!(session = %session.session_id, error = %e, "Transcription pass failed");
            let _ = events.send(ServerEvent::info(format!("Erreur transcription: {}", e)));
            false
        }
    }
}

/// Per-session transcription worker.
///
/// A single consumer drains the FIFO job queue, which serializes result
/// application: passes apply in issue order, and a final flush runs only
/// after every pass queued before the `stop`. The worker exits when the
/// actor drops its end of the queue.
pub(crate) async fn run_transcription_worker(
    session: Arc<RecordingSession>,
    scheduler: WindowingScheduler,
    stt: Arc<dyn SpeechToText>,
    events: mpsc::UnboundedSender<ServerEvent>,
    pass_pending: Arc<AtomicBool>,
    mut jobs: mpsc::UnboundedReceiver<TranscribeJob>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            TranscribeJob::Incremental => {
                // Frames kept arriving during the pass; keep going while a
                // full window is ready. A failed pass stops the loop; the
                // retry happens on the next triggering append instead.
                while run_pass(&session, &scheduler, stt.as_ref(), &events, PassMode::Incremental)
                    .await
                    && scheduler.should_trigger(session.buffer.unprocessed_len())
                {}
                pass_pending.store(false, Ordering::SeqCst);
            }
            TranscribeJob::FinalFlush { generation } => {
                if session.buffer.generation() == generation {
                    run_pass(&session, &scheduler, stt.as_ref(), &events, PassMode::Final).await;
                }
                let _ = events.send(ServerEvent::info(STOP_MESSAGE));
            }
        }
    }
}

/// Handle one `summarize` request against a transcript snapshot.
pub(crate) async fn run_summarize(
    session: Arc<RecordingSession>,
    summarizers: Arc<SummarizerRegistry>,
    chunk_size: usize,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let transcript = session.transcript.snapshot();
    if transcript.is_empty() {
        let _ = events.send(ServerEvent::summary(EMPTY_TRANSCRIPT_WARNING));
        return;
    }

    let language = session.language();
    info!(
        session = %session.session_id,
        language = %language,
        chars = transcript.len(),
        "Summarize requested"
    );

    match summarize_transcript(&summarizers, &transcript, language, chunk_size).await {
        Ok(summary) => {
            let _ = events.send(ServerEvent::summary(summary));
        }
        Err(e) => {
            warn!(session = %session.session_id, error = %e, "Summarization failed");
            let _ = events.send(ServerEvent::info(format!("Erreur résumé: {}", e)));
        }
    }
}

/// Event routed from a background task back to the client.
#[derive(Message)]
#[rtype(result = "()")]
struct Outbound(ServerEvent);

/// WebSocket actor for one transcription session.
pub struct TranscriptionSocket {
    /// This connection's session state
    session: Arc<RecordingSession>,

    /// Windowing policy from the audio configuration
    scheduler: WindowingScheduler,

    /// Shared speech recognizer
    stt: Arc<dyn SpeechToText>,

    /// Shared summarization collaborators
    summarizers: Arc<SummarizerRegistry>,

    /// Session registry for disconnect cleanup
    sessions: Arc<SessionManager>,

    /// Transcript chunk bound for summarize requests
    chunk_size: usize,

    /// Canonical sample rate, for duration accounting
    sample_rate: u32,

    /// Buffered duration past which the recording is flagged in the logs
    long_session_warn_secs: u64,
    long_session_warned: bool,

    /// Job queue feeding the transcription worker
    jobs: mpsc::UnboundedSender<TranscribeJob>,
    job_rx: Option<mpsc::UnboundedReceiver<TranscribeJob>>,

    /// Event channel shared with the worker and summarize tasks
    events: mpsc::UnboundedSender<ServerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ServerEvent>>,

    /// Set while an incremental pass is queued or running
    pass_pending: Arc<AtomicBool>,

    last_heartbeat: Instant,
}

impl TranscriptionSocket {
    pub fn new(session: Arc<RecordingSession>, state: &AppState) -> Self {
        let config = state.get_config();
        let (jobs, job_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();

        Self {
            session,
            scheduler: WindowingScheduler::new(config.audio.to_window_config()),
            stt: state.transcription(),
            summarizers: state.summarizers(),
            sessions: state.sessions(),
            chunk_size: config.summarization.chunk_size,
            sample_rate: config.audio.sample_rate,
            long_session_warn_secs: config.audio.long_session_warn_secs,
            long_session_warned: false,
            jobs,
            job_rx: Some(job_rx),
            events,
            event_rx: Some(event_rx),
            pass_pending: Arc::new(AtomicBool::new(false)),
            last_heartbeat: Instant::now(),
        }
    }

    /// Serialize and send one event on the socket.
    fn send_event(&self, ctx: &mut ws::WebsocketContext<Self>, event: ServerEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => ctx.text(json),
            Err(e) => error!("Failed to serialize outbound event: {}", e),
        }
    }

    fn handle_control(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::from_str::<ClientCommand>(text) {
            Ok(ClientCommand::Start { lang }) => self.handle_start(lang, ctx),
            Ok(ClientCommand::Stop) => self.handle_stop(),
            Ok(ClientCommand::Summarize) => self.handle_summarize(),
            Err(e) => {
                // Malformed control input: no state change, no outbound error
                debug!(
                    session = %self.session.session_id,
                    "Ignoring malformed control message: {}",
                    e
                );
            }
        }
    }

    /// `start`: full (re)initialization, even when already recording.
    fn handle_start(&mut self, lang: Option<String>, ctx: &mut ws::WebsocketContext<Self>) {
        let language = Language::parse_or_default(lang.as_deref());
        self.session.begin_recording(language);
        self.pass_pending.store(false, Ordering::SeqCst);
        self.long_session_warned = false;

        info!(
            session = %self.session.session_id,
            language = %language,
            "Recording started"
        );
        self.send_event(ctx, ServerEvent::info(START_MESSAGE));
    }

    /// `stop`: freeze intake and queue the final flush behind any pass
    /// already in flight. No-op when already idle.
    fn handle_stop(&mut self) {
        if self.session.end_recording() {
            let generation = self.session.buffer.generation();
            info!(session = %self.session.session_id, "Recording stopped, flushing");
            let _ = self.jobs.send(TranscribeJob::FinalFlush { generation });
        }
    }

    /// `summarize`: valid in any state; runs detached from frame intake.
    fn handle_summarize(&mut self) {
        tokio::spawn(run_summarize(
            self.session.clone(),
            self.summarizers.clone(),
            self.chunk_size,
            self.events.clone(),
        ));
    }

    /// Binary frame: decode, buffer, and check the trigger threshold.
    fn handle_frame(&mut self, data: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        if !self.session.is_recording() {
            // Frames outside RECORDING are dropped, not buffered for later
            return;
        }

        match decoder::decode_frame(data) {
            Ok(samples) => {
                let total = self.session.buffer.append(&samples);
                self.maybe_flag_long_session(total);

                if self.scheduler.should_trigger(self.session.buffer.unprocessed_len())
                    && !self.pass_pending.swap(true, Ordering::SeqCst)
                    && self.jobs.send(TranscribeJob::Incremental).is_err()
                {
                    self.pass_pending.store(false, Ordering::SeqCst);
                }
            }
            Err(e) => {
                // The failed frame never reaches the buffer; the session
                // stays usable
                warn!(session = %self.session.session_id, "Audio frame rejected: {}", e);
                self.send_event(ctx, ServerEvent::info(format!("Erreur audio: {}", e)));
            }
        }
    }

    /// The sample buffer grows for the whole recording. Flag (but never
    /// truncate) recordings that exceed the configured duration.
    fn maybe_flag_long_session(&mut self, total_samples: usize) {
        if self.long_session_warned {
            return;
        }
        let limit = self.sample_rate as u64 * self.long_session_warn_secs;
        if total_samples as u64 > limit {
            warn!(
                session = %self.session.session_id,
                buffered_secs = total_samples as u64 / self.sample_rate.max(1) as u64,
                "Recording exceeds {}s; sample buffer keeps growing",
                self.long_session_warn_secs
            );
            self.long_session_warned = true;
        }
    }
}

impl Actor for TranscriptionSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session = %self.session.session_id, "WebSocket connection started");

        // Heartbeat: ping on an interval, drop clients that stop answering
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    session = %act.session.session_id,
                    "WebSocket heartbeat timeout, closing connection"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });

        // Transcription worker, fed through the FIFO job queue
        if let Some(job_rx) = self.job_rx.take() {
            tokio::spawn(run_transcription_worker(
                self.session.clone(),
                self.scheduler.clone(),
                self.stt.clone(),
                self.events.clone(),
                self.pass_pending.clone(),
                job_rx,
            ));
        }

        // Route worker/summarize events back into the actor mailbox
        if let Some(mut event_rx) = self.event_rx.take() {
            let addr = ctx.address();
            tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    addr.do_send(Outbound(event));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Dropping the actor drops the job queue sender; the worker drains
        // and exits, and any in-flight pass result has nowhere to go
        self.sessions.unregister(&self.session.session_id);
        info!(session = %self.session.session_id, "WebSocket connection closed");
    }
}

impl Handler<Outbound> for TranscriptionSocket {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        self.send_event(ctx, msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for TranscriptionSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.handle_control(&text, ctx),
            Ok(ws::Message::Binary(data)) => self.handle_frame(&data, ctx),
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session = %self.session.session_id, "WebSocket closed: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                error!(session = %self.session.session_id, "WebSocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler for `/ws/transcription`.
///
/// Creates and registers the connection's session before upgrading;
/// connections over the session limit are refused with 503.
pub async fn transcription_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let session = Arc::new(RecordingSession::new());
    let sessions = app_state.sessions();

    if let Err(e) = sessions.register(session.clone()) {
        warn!("Refusing WebSocket connection: {}", e);
        return Ok(HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({ "error": { "type": "session_limit", "message": e } })));
    }

    info!(
        session = %session.session_id,
        peer = ?req.connection_info().peer_addr(),
        "New WebSocket connection request"
    );

    let socket = TranscriptionSocket::new(session.clone(), app_state.get_ref());
    match ws::start(socket, &req, stream) {
        Ok(response) => Ok(response),
        Err(e) => {
            sessions.unregister(&session.session_id);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::scheduler::WindowConfig;
    use crate::error::EngineError;
    use crate::summarization::Summarizer;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted recognizer: pops one response per call and records the
    /// window length and language hint it was given.
    struct FakeSpeechToText {
        responses: Mutex<VecDeque<Result<String, EngineError>>>,
        calls: Mutex<Vec<(usize, Language)>>,
    }

    impl FakeSpeechToText {
        fn with_responses(responses: Vec<Result<String, EngineError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(usize, Language)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechToText for FakeSpeechToText {
        async fn transcribe(
            &self,
            samples: &[f32],
            language: Language,
        ) -> Result<String, EngineError> {
            self.calls.lock().unwrap().push((samples.len(), language));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))
        }
    }

    /// Fake summarization collaborator tagging each chunk it receives.
    struct EchoSummarizer {
        inputs: Mutex<Vec<String>>,
    }

    impl EchoSummarizer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inputs: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, text: &str) -> Result<String, EngineError> {
            self.inputs.lock().unwrap().push(text.to_string());
            Ok(format!("résumé({})", text))
        }
    }

    fn test_harness(
        stt: Arc<FakeSpeechToText>,
    ) -> (
        Arc<RecordingSession>,
        mpsc::UnboundedSender<TranscribeJob>,
        mpsc::UnboundedReceiver<ServerEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let session = Arc::new(RecordingSession::new());
        let scheduler = WindowingScheduler::new(WindowConfig::default());
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(run_transcription_worker(
            session.clone(),
            scheduler,
            stt,
            events_tx,
            pending,
            jobs_rx,
        ));

        (session, jobs_tx, events_rx, worker)
    }

    #[test]
    fn test_client_command_parsing() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"action":"start","lang":"en"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Start { lang: Some(ref l) } if l == "en"));

        let cmd: ClientCommand = serde_json::from_str(r#"{"action":"start"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Start { lang: None }));

        assert!(matches!(
            serde_json::from_str::<ClientCommand>(r#"{"action":"stop"}"#).unwrap(),
            ClientCommand::Stop
        ));
        assert!(matches!(
            serde_json::from_str::<ClientCommand>(r#"{"action":"summarize"}"#).unwrap(),
            ClientCommand::Summarize
        ));

        // Unknown actions and non-JSON are rejected (and ignored upstream)
        assert!(serde_json::from_str::<ClientCommand>(r#"{"action":"reboot"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>("not json").is_err());
    }

    #[test]
    fn test_server_event_wire_format() {
        let json = serde_json::to_string(&ServerEvent::transcription("hello world")).unwrap();
        assert_eq!(json, r#"{"type":"transcription","message":"hello world"}"#);

        let json = serde_json::to_string(&ServerEvent::summary("le résumé")).unwrap();
        assert_eq!(json, r#"{"type":"summary","message":"le résumé"}"#);

        let json = serde_json::to_string(&ServerEvent::info(START_MESSAGE)).unwrap();
        assert!(json.starts_with(r#"{"type":"info""#));
    }

    #[tokio::test]
    async fn test_full_session_scenario() {
        // start{lang:"en"} → 40_000 samples → one pass over [0, 40_000) →
        // "hello world" → stop → final pass over the remainder → summarize
        let stt = FakeSpeechToText::with_responses(vec![
            Ok("hello world".to_string()),
            Ok(String::new()),
        ]);
        let (session, jobs, mut events, worker) = test_harness(stt.clone());

        session.begin_recording(Language::English);
        session.buffer.append(&[0.0; 40_000]);
        jobs.send(TranscribeJob::Incremental).unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::transcription("hello world")
        );
        // Watermark retreats one overlap from the window end
        assert_eq!(session.buffer.processed(), 32_000);

        // stop: 8_000 unprocessed samples remain → exactly one final pass
        assert!(session.end_recording());
        jobs.send(TranscribeJob::FinalFlush {
            generation: session.buffer.generation(),
        })
        .unwrap();

        // The tail was silence: no transcription event, only the stop notice
        assert_eq!(events.recv().await.unwrap(), ServerEvent::info(STOP_MESSAGE));
        assert_eq!(session.buffer.processed(), 40_000);

        let calls = stt.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (40_000, Language::English)); // [0, 40_000)
        assert_eq!(calls[1], (16_000, Language::English)); // [24_000, 40_000)

        // summarize: one chunk "hello world" to the English collaborator
        let english = EchoSummarizer::new();
        let multilingual = EchoSummarizer::new();
        let registry = Arc::new(SummarizerRegistry::from_parts(
            multilingual.clone(),
            english.clone(),
        ));
        let (events_tx, mut summary_events) = mpsc::unbounded_channel();
        run_summarize(session.clone(), registry, 1800, events_tx).await;

        assert_eq!(
            summary_events.recv().await.unwrap(),
            ServerEvent::summary("résumé(hello world)")
        );
        assert_eq!(english.inputs.lock().unwrap().as_slice(), ["hello world"]);
        assert!(multilingual.inputs.lock().unwrap().is_empty());

        drop(jobs);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_pass_keeps_audio_eligible_for_retry() {
        let stt = FakeSpeechToText::with_responses(vec![
            Err(EngineError::Inference("asr exploded".to_string())),
            Ok("deuxième tentative".to_string()),
        ]);
        let (session, jobs, mut events, worker) = test_harness(stt.clone());

        session.begin_recording(Language::French);
        session.buffer.append(&[0.0; 32_000]);
        jobs.send(TranscribeJob::Incremental).unwrap();

        // Failure comes back as a non-fatal info event
        match events.recv().await.unwrap() {
            ServerEvent::Info { message } => {
                assert!(message.starts_with("Erreur transcription:"))
            }
            other => panic!("expected info event, got {:?}", other),
        }
        // Watermark untouched: the window stays eligible
        assert_eq!(session.buffer.processed(), 0);
        assert!(session.transcript.is_empty());

        // Next triggering append retries the same (now larger) window
        session.buffer.append(&[0.0; 1_000]);
        jobs.send(TranscribeJob::Incremental).unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::transcription("deuxième tentative")
        );
        assert_eq!(session.buffer.processed(), 33_000 - 8_000);
        assert_eq!(stt.calls()[1].0, 33_000);

        drop(jobs);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_drains_backlog_accumulated_during_pass() {
        let stt = FakeSpeechToText::with_responses(vec![
            Ok("un".to_string()),
            Ok("deux".to_string()),
        ]);
        let (session, jobs, mut events, worker) = test_harness(stt.clone());

        session.begin_recording(Language::French);
        // Two full windows of backlog behind a single queued job
        session.buffer.append(&[0.0; 64_000]);
        jobs.send(TranscribeJob::Incremental).unwrap();

        assert_eq!(events.recv().await.unwrap(), ServerEvent::transcription("un"));
        assert_eq!(events.recv().await.unwrap(), ServerEvent::transcription("deux"));
        assert_eq!(session.transcript.snapshot(), "un deux");

        drop(jobs);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_silence_windows_produce_no_events() {
        let stt = FakeSpeechToText::with_responses(vec![Ok("   ".to_string())]);
        let (session, jobs, mut events, worker) = test_harness(stt.clone());

        session.begin_recording(Language::French);
        session.buffer.append(&[0.0; 32_000]);
        jobs.send(TranscribeJob::Incremental).unwrap();

        // Watermark advances even though nothing was recognized
        drop(jobs);
        worker.await.unwrap();
        assert_eq!(session.buffer.processed(), 24_000);
        assert!(session.transcript.is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_final_flush_skips_new_recording() {
        let stt = FakeSpeechToText::with_responses(vec![]);
        let (session, jobs, mut events, worker) = test_harness(stt.clone());

        session.begin_recording(Language::French);
        session.buffer.append(&[0.0; 10_000]);
        assert!(session.end_recording());
        let stale_generation = session.buffer.generation();

        // A new recording starts before the flush job is processed
        session.begin_recording(Language::French);
        session.buffer.append(&[0.0; 5_000]);
        jobs.send(TranscribeJob::FinalFlush {
            generation: stale_generation,
        })
        .unwrap();

        // The stop notice still goes out, but no pass touched the new
        // recording's audio
        assert_eq!(events.recv().await.unwrap(), ServerEvent::info(STOP_MESSAGE));
        assert!(stt.calls().is_empty());
        assert_eq!(session.buffer.processed(), 0);
        assert_eq!(session.buffer.len(), 5_000);

        drop(jobs);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_summarize_on_empty_transcript_warns_without_dispatch() {
        let session = Arc::new(RecordingSession::new());
        let english = EchoSummarizer::new();
        let multilingual = EchoSummarizer::new();
        let registry = Arc::new(SummarizerRegistry::from_parts(
            multilingual.clone(),
            english.clone(),
        ));
        let (events_tx, mut events) = mpsc::unbounded_channel();

        run_summarize(session, registry, 1800, events_tx).await;

        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::summary(EMPTY_TRANSCRIPT_WARNING)
        );
        assert!(english.inputs.lock().unwrap().is_empty());
        assert!(multilingual.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_failure_reports_info_event() {
        struct BrokenSummarizer;

        #[async_trait]
        impl Summarizer for BrokenSummarizer {
            async fn summarize(&self, _text: &str) -> Result<String, EngineError> {
                Err(EngineError::Timeout { seconds: 30 })
            }
        }

        let session = Arc::new(RecordingSession::new());
        session.begin_recording(Language::French);
        session.transcript.append("quelques mots");

        let registry = Arc::new(SummarizerRegistry::from_parts(
            Arc::new(BrokenSummarizer),
            Arc::new(BrokenSummarizer),
        ));
        let (events_tx, mut events) = mpsc::unbounded_channel();

        run_summarize(session.clone(), registry, 1800, events_tx).await;

        match events.recv().await.unwrap() {
            ServerEvent::Info { message } => assert!(message.starts_with("Erreur résumé:")),
            other => panic!("expected info event, got {:?}", other),
        }
        // The transcript is untouched by the failure
        assert_eq!(session.transcript.snapshot(), "quelques mots");
    }
}
