//! # Speech Recognition
//!
//! Speech-to-text over sample windows using Whisper via the Candle-rs
//! framework, with no FFI bindings to whisper.cpp.
//!
//! The session layer talks to recognition only through the [`SpeechToText`]
//! trait: a sample window and a language hint in, recognized text out,
//! typed error on failure. [`TranscriptionService`] is the production
//! implementation; tests substitute fakes at the same seam.

use crate::error::EngineError;
use crate::language::Language;
use async_trait::async_trait;

pub mod engine; // Shared transcription service with single-flight model init
pub mod model; // Candle Whisper model loading and decoding

pub use engine::TranscriptionService;
pub use model::ModelSize;

/// The narrow interface the session core consumes.
///
/// Implementations may take seconds per call; callers offload invocations
/// so frame ingestion never blocks on one.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Recognize text in a window of canonical samples.
    ///
    /// Must tolerate short windows (down to the minimum trigger window).
    /// Failures surface as [`EngineError`] and must leave no side effects:
    /// the caller decides what, if anything, to retry.
    async fn transcribe(&self, samples: &[f32], language: Language) -> Result<String, EngineError>;
}
