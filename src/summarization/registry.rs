//! # Summarizer Selection and Dispatch
//!
//! One summarization collaborator exists per model, not per session. The
//! registry maps a session language onto its collaborator through an
//! exhaustive `match`, so the fallback for languages without a dedicated
//! model is a visible part of the contract rather than a dictionary
//! default.
//!
//! Each collaborator loads its model lazily and exactly once, the same
//! single-flight pattern the transcription service uses.

use crate::error::EngineError;
use crate::language::Language;
use crate::summarization::chunker::chunk_text;
use crate::summarization::model::T5Summarizer;
use crate::transcript::normalize_whitespace;
use async_trait::async_trait;
use candle_core::Device;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// The narrow interface the dispatcher consumes: one chunk in, one summary
/// out. Implementations may take seconds per call.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, EngineError>;
}

/// A summarizer slot backed by a lazily-loaded T5 model.
pub struct LazySummarizer {
    model: OnceCell<Arc<Mutex<T5Summarizer>>>,
    repo_id: String,
    device: Device,
    timeout: Duration,
}

impl LazySummarizer {
    pub fn new(repo_id: impl Into<String>, device: Device, timeout: Duration) -> Self {
        Self {
            model: OnceCell::new(),
            repo_id: repo_id.into(),
            device,
            timeout,
        }
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<&Arc<Mutex<T5Summarizer>>, EngineError> {
        self.model
            .get_or_try_init(|| async {
                let model = T5Summarizer::load(&self.repo_id, self.device.clone()).await?;
                Ok(Arc::new(Mutex::new(model)))
            })
            .await
    }
}

#[async_trait]
impl Summarizer for LazySummarizer {
    async fn summarize(&self, text: &str) -> Result<String, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let model = self.model().await?.clone();
        let deadline = self.timeout;
        let text = text.to_string();

        // CPU-bound decode runs on the blocking pool, same as transcription
        let inference = tokio::task::spawn_blocking(move || {
            let mut guard = model.blocking_lock();
            guard.summarize(&text)
        });

        match tokio::time::timeout(deadline, inference).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(EngineError::Inference(format!(
                "summarization task failed: {}",
                join_error
            ))),
            Err(_) => Err(EngineError::Timeout {
                seconds: deadline.as_secs(),
            }),
        }
    }
}

/// Language-keyed summarizer table.
pub struct SummarizerRegistry {
    /// mT5-family model covering French, Arabic, and any future fallback
    multilingual: Arc<dyn Summarizer>,

    /// Dedicated English model
    english: Arc<dyn Summarizer>,
}

impl SummarizerRegistry {
    /// Build the production registry from configured model repositories.
    pub fn new(
        multilingual_repo: &str,
        english_repo: &str,
        device: Device,
        timeout: Duration,
    ) -> Self {
        Self {
            multilingual: Arc::new(LazySummarizer::new(multilingual_repo, device.clone(), timeout)),
            english: Arc::new(LazySummarizer::new(english_repo, device, timeout)),
        }
    }

    /// Build a registry from arbitrary collaborators (tests use fakes here).
    pub fn from_parts(multilingual: Arc<dyn Summarizer>, english: Arc<dyn Summarizer>) -> Self {
        Self {
            multilingual,
            english,
        }
    }

    /// Select the collaborator for a session language.
    ///
    /// The default language's collaborator serves every language without a
    /// dedicated model of its own.
    pub fn for_language(&self, language: Language) -> &Arc<dyn Summarizer> {
        match language {
            Language::English => &self.english,
            // French is the default; Arabic shares the multilingual model
            Language::French | Language::Arabic => &self.multilingual,
        }
    }
}

/// Summarize a full transcript snapshot.
///
/// ## Process:
/// 1. Split the snapshot into contiguous ≤ `chunk_size`-character pieces
/// 2. Summarize each piece independently through the language's collaborator
/// 3. Join the per-chunk summaries in order with single spaces and normalize
///
/// The input must be non-empty; the caller handles the empty-transcript
/// warning before dispatching.
pub async fn summarize_transcript(
    registry: &SummarizerRegistry,
    transcript: &str,
    language: Language,
    chunk_size: usize,
) -> Result<String, EngineError> {
    if transcript.trim().is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let summarizer = registry.for_language(language);
    let mut pieces = Vec::new();

    for chunk in chunk_text(transcript, chunk_size) {
        pieces.push(summarizer.summarize(chunk).await?);
    }

    Ok(normalize_whitespace(&pieces.join(" ")))
}
