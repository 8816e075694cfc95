//! # Transcription Service
//!
//! Shared speech-recognition engine. The Whisper model is expensive to
//! initialize, so a single instance is shared read-mostly across every
//! session and loaded lazily exactly once: the first session to need it
//! triggers the load, and racing sessions all await the same in-flight
//! initialization (single-flight via `tokio::sync::OnceCell`).
//!
//! The service is constructed once at startup and handed to sessions at
//! connection time; nothing here is ambient global state.

use crate::error::EngineError;
use crate::language::Language;
use crate::transcription::model::{ModelSize, WhisperModel};
use crate::transcription::SpeechToText;
use async_trait::async_trait;
use candle_core::Device;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Lazily-initialized Whisper engine shared across sessions.
pub struct TranscriptionService {
    /// Model slot; initialized at most once even under concurrent first use
    model: OnceCell<Arc<Mutex<WhisperModel>>>,

    /// Which Whisper variant to load
    size: ModelSize,

    /// Device for inference (CPU/GPU)
    device: Device,

    /// Deadline for one transcription call
    timeout: Duration,
}

impl TranscriptionService {
    pub fn new(size: ModelSize, device: Device, timeout: Duration) -> Self {
        Self {
            model: OnceCell::new(),
            size,
            device,
            timeout,
        }
    }

    /// The model slot, loading it on first use.
    async fn model(&self) -> Result<&Arc<Mutex<WhisperModel>>, EngineError> {
        self.model
            .get_or_try_init(|| async {
                let model = WhisperModel::load(self.size, self.device.clone()).await?;
                Ok(Arc::new(Mutex::new(model)))
            })
            .await
    }

    /// Eagerly load the model (startup warm-up; optional).
    pub async fn preload(&self) -> Result<(), EngineError> {
        self.model().await.map(|_| ())
    }

    /// Whether the model has finished loading.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    pub fn model_size(&self) -> ModelSize {
        self.size
    }
}

#[async_trait]
impl SpeechToText for TranscriptionService {
    /// Run one recognition pass over a sample window.
    ///
    /// ## Process:
    /// 1. Reject empty windows (they are never submitted by the scheduler)
    /// 2. Ensure the shared model is loaded (single-flight)
    /// 3. Run inference under the model lock, bounded by the deadline
    ///
    /// A timeout is reported as a plain transcription failure; the caller's
    /// watermark stays untouched either way.
    async fn transcribe(&self, samples: &[f32], language: Language) -> Result<String, EngineError> {
        if samples.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let model = self.model().await?.clone();
        let deadline = self.timeout;
        let samples = samples.to_vec();

        // Inference is CPU-bound; run it on the blocking pool so the
        // deadline can actually fire and the runtime keeps serving frames
        let inference = tokio::task::spawn_blocking(move || {
            let mut guard = model.blocking_lock();
            guard.transcribe(&samples, language)
        });

        match tokio::time::timeout(deadline, inference).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(EngineError::Inference(format!(
                "transcription task failed: {}",
                join_error
            ))),
            Err(_) => Err(EngineError::Timeout {
                seconds: deadline.as_secs(),
            }),
        }
    }
}
