//! # Whisper Model
//!
//! Loads Whisper weights from HuggingFace and runs greedy decoding over
//! mel spectrograms. One instance is shared by every session through
//! [`super::TranscriptionService`].
//!
//! ## Loading Process:
//! 1. Download model files from HuggingFace (cached locally by hf-hub)
//! 2. Load tokenizer and configuration
//! 3. Initialize weights on the selected device (CPU/GPU)

use crate::error::EngineError;
use crate::language::Language;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, audio, Config};
use tokenizers::Tokenizer;

/// Available Whisper model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace model repository for this size.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate weight size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            other => Err(format!("Unknown model size: {}", other)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// Maximum decoded tokens per pass.
const MAX_TOKENS: usize = 224;

/// A loaded Whisper model ready for transcription.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
    size: ModelSize,
}

impl WhisperModel {
    /// Download (if needed) and load a Whisper model.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self, EngineError> {
        tracing::info!("Loading Whisper {} model...", size);
        let start_time = std::time::Instant::now();

        let api = hf_hub::api::tokio::ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| EngineError::ModelLoad(format!("HuggingFace API init: {}", e)))?;
        let repo = api.model(size.repo_name().to_string());

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| EngineError::ModelLoad(format!("config.json from {}: {}", size.repo_name(), e)))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EngineError::ModelLoad(format!("tokenizer.json from {}: {}", size.repo_name(), e)))?;
        let weights_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EngineError::ModelLoad(format!("weights from {}: {}", size.repo_name(), e)))?;

        let config_file = std::fs::File::open(config_filename)
            .map_err(|e| EngineError::ModelLoad(format!("open config.json: {}", e)))?;
        let config: Config = serde_json::from_reader(config_file)
            .map_err(|e| EngineError::ModelLoad(format!("parse config.json: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| EngineError::ModelLoad(format!("load tokenizer: {}", e)))?;

        let mel_filters = build_mel_filter_bank(config.num_mel_bins as usize);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], m::DTYPE, &device)
                .map_err(|e| EngineError::ModelLoad(format!("map weights: {}", e)))?
        };
        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| EngineError::ModelLoad(format!("init model: {}", e)))?;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            mel_filters,
            size,
        })
    }

    pub fn size(&self) -> ModelSize {
        self.size
    }

    /// Transcribe a window of canonical samples.
    ///
    /// ## Parameters:
    /// - **samples**: 32-bit float samples, 16 kHz, mono, in [-1.0, 1.0]
    /// - **language**: recognition hint from the session's `start` action
    pub fn transcribe(&mut self, samples: &[f32], language: Language) -> Result<String, EngineError> {
        if samples.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let start_time = std::time::Instant::now();
        let mel = self.compute_mel(samples)?;
        let encoder_output = self.model.encoder.forward(&mel, true)?;

        // SOT, language hint, task, and no-timestamps prefix
        let mut tokens = vec![self.special_token("<|startoftranscript|>", 50258)];
        if let Some(lang_token) = self.language_token(language) {
            tokens.push(lang_token);
        }
        tokens.push(self.special_token("<|transcribe|>", 50359));
        tokens.push(self.special_token("<|notimestamps|>", 50363));

        let eot = self.special_token("<|endoftext|>", 50257);
        let prefix_len = tokens.len();

        for i in 0..MAX_TOKENS {
            let tokens_t = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &encoder_output, i == 0)?;

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?;
            let next_token = logits.argmax(0)?.to_scalar::<u32>()?;

            if next_token == eot {
                break;
            }
            if is_repetitive(&tokens[prefix_len..], next_token) {
                tracing::debug!("Stopping decode on repetitive output");
                break;
            }
            tokens.push(next_token);
        }

        let text = self.decode_tokens(&tokens[prefix_len..])?;

        tracing::debug!(
            "Transcribed {:.2}s of audio in {:.2}s: '{}'",
            samples.len() as f64 / m::SAMPLE_RATE as f64,
            start_time.elapsed().as_secs_f64(),
            text
        );

        Ok(text)
    }

    /// Convert samples to a batched mel spectrogram tensor.
    fn compute_mel(&self, samples: &[f32]) -> Result<Tensor, EngineError> {
        let mel = audio::pcm_to_mel(&self.config, samples, &self.mel_filters);
        let n_mels = self.config.num_mel_bins as usize;
        let n_frames = mel.len() / n_mels;
        Ok(Tensor::from_vec(mel, (1, n_mels, n_frames), &self.device)?)
    }

    /// Look up a special token id, falling back to the standard vocabulary
    /// position when the tokenizer does not expose it.
    fn special_token(&self, token: &str, fallback: u32) -> u32 {
        self.tokenizer.token_to_id(token).unwrap_or(fallback)
    }

    /// Language hint token, e.g. `<|fr|>`.
    fn language_token(&self, language: Language) -> Option<u32> {
        self.tokenizer
            .token_to_id(&format!("<|{}|>", language.code()))
    }

    fn decode_tokens(&self, tokens: &[u32]) -> Result<String, EngineError> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| EngineError::Inference(format!("tokenizer decode: {}", e)))?;
        Ok(text.trim().to_string())
    }
}

/// Triangular mel filter bank over the Whisper FFT bins.
fn build_mel_filter_bank(n_mels: usize) -> Vec<f32> {
    // Whisper uses a 400-point FFT at 16 kHz: 201 frequency bins
    let n_freqs = m::N_FFT / 2 + 1;
    let mut filters = vec![0.0f32; n_mels * n_freqs];

    for mel_bin in 0..n_mels {
        let center = (mel_bin + 1) * n_freqs / (n_mels + 1);
        let width = n_freqs / (n_mels + 1);

        for freq in center.saturating_sub(width)..(center + width).min(n_freqs) {
            let distance = (freq as i64 - center as i64).unsigned_abs() as f32;
            filters[mel_bin * n_freqs + freq] = (1.0 - distance / width as f32).max(0.0);
        }
    }

    filters
}

/// Detect immediate and short-pattern token repetition.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    if tokens.len() >= 2 {
        let n = tokens.len();
        if tokens[n - 1] == new_token && tokens[n - 2] == new_token {
            return true;
        }
    }
    if tokens.len() >= 6 {
        let n = tokens.len();
        if tokens[n - 3..] == tokens[n - 6..n - 3] {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("medium".parse::<ModelSize>().unwrap(), ModelSize::Medium);
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("invalid".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_display_round_trip() {
        for size in [
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::Large,
        ] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
        }
    }

    #[test]
    fn test_mel_filter_bank_dimensions() {
        let filters = build_mel_filter_bank(80);
        assert_eq!(filters.len(), 80 * (m::N_FFT / 2 + 1));
        // Filters carry actual weight
        assert!(filters.iter().any(|&w| w > 0.0));
    }

    #[test]
    fn test_repetition_detection() {
        assert!(is_repetitive(&[5, 5], 5));
        assert!(is_repetitive(&[1, 2, 3, 1, 2, 3], 9));
        assert!(!is_repetitive(&[1, 2, 3], 4));
        assert!(!is_repetitive(&[], 1));
    }
}
