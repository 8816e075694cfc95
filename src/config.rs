//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Built-in default values
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_AUDIO_OVERLAP_MS, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The windowing constants in `[audio]` are deployment-tunable but have
//! fixed defaults: 16 kHz sample rate, 2000 ms minimum-new-audio trigger,
//! 500 ms overlap.

use crate::audio::scheduler::WindowConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub summarization: SummarizationConfig,
    pub models: ModelsConfig,
    pub performance: PerformanceConfig,
}

/// Server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Streaming audio and windowing settings.
///
/// ## Fields:
/// - `sample_rate`: canonical stream rate in Hz (Whisper expects 16 kHz)
/// - `min_new_audio_ms`: unprocessed audio required before a transcription
///   pass triggers
/// - `overlap_ms`: trailing audio re-submitted with the next pass so a word
///   on the window boundary is never clipped
/// - `long_session_warn_secs`: buffered duration past which a recording is
///   flagged in the logs (the buffer itself is never truncated)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub min_new_audio_ms: u32,
    pub overlap_ms: u32,
    pub long_session_warn_secs: u64,
}

impl AudioConfig {
    /// Windowing constants consumed by the scheduler.
    pub fn to_window_config(&self) -> WindowConfig {
        WindowConfig {
            sample_rate: self.sample_rate,
            min_new_audio_ms: self.min_new_audio_ms,
            overlap_ms: self.overlap_ms,
        }
    }
}

/// Summarization dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Maximum transcript chunk length, in characters
    pub chunk_size: usize,
}

/// Model selection.
///
/// ## Fields:
/// - `whisper_model`: Whisper size ("tiny", "base", "small", "medium", "large")
/// - `multilingual_summarizer`: HuggingFace repo serving French/Arabic (and
///   the fallback for any language without a dedicated model)
/// - `english_summarizer`: HuggingFace repo serving English
/// - `device`: inference device preference ("auto", "cpu", "cuda", "metal")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub whisper_model: String,
    pub multilingual_summarizer: String,
    pub english_summarizer: String,
    pub device: String,
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum simultaneous WebSocket sessions
    pub max_concurrent_sessions: usize,
    /// Deadline for one transcription or summarization call, in seconds
    pub engine_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            audio: AudioConfig {
                sample_rate: 16_000,
                min_new_audio_ms: 2_000,
                overlap_ms: 500,
                long_session_warn_secs: 3_600,
            },
            summarization: SummarizationConfig { chunk_size: 1_800 },
            models: ModelsConfig {
                whisper_model: "medium".to_string(),
                multilingual_summarizer: "csebuetnlp/mT5_multilingual_XLSum".to_string(),
                english_summarizer: "Falconsai/text_summarization".to_string(),
                device: "auto".to_string(),
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,
                engine_timeout_secs: 30,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: override server host
    /// - `APP_AUDIO_OVERLAP_MS=250`: override the overlap window
    /// - `HOST` / `PORT`: deployment-platform shorthands
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.sample_rate == 0 {
            return Err(anyhow::anyhow!("Audio sample rate must be greater than 0"));
        }

        if self.audio.min_new_audio_ms == 0 {
            return Err(anyhow::anyhow!(
                "Minimum new audio threshold must be greater than 0"
            ));
        }

        if self.summarization.chunk_size == 0 {
            return Err(anyhow::anyhow!("Summarization chunk size must be greater than 0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        if self.performance.engine_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Engine timeout must be greater than 0"));
        }

        self.models
            .whisper_model
            .parse::<crate::transcription::ModelSize>()
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(())
    }

    /// Apply a partial update from a JSON body (runtime config endpoint).
    ///
    /// Only the fields present in the JSON are touched; the updated
    /// configuration is re-validated before being accepted.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("sample_rate").and_then(|v| v.as_u64()) {
                self.audio.sample_rate = rate as u32;
            }
            if let Some(min_new) = audio.get("min_new_audio_ms").and_then(|v| v.as_u64()) {
                self.audio.min_new_audio_ms = min_new as u32;
            }
            if let Some(overlap) = audio.get("overlap_ms").and_then(|v| v.as_u64()) {
                self.audio.overlap_ms = overlap as u32;
            }
        }

        if let Some(summarization) = partial_config.get("summarization") {
            if let Some(size) = summarization.get("chunk_size").and_then(|v| v.as_u64()) {
                self.summarization.chunk_size = size as usize;
            }
        }

        if let Some(models) = partial_config.get("models") {
            if let Some(whisper) = models.get("whisper_model").and_then(|v| v.as_str()) {
                self.models.whisper_model = whisper.to_string();
            }
            if let Some(repo) = models.get("multilingual_summarizer").and_then(|v| v.as_str()) {
                self.models.multilingual_summarizer = repo.to_string();
            }
            if let Some(repo) = models.get("english_summarizer").and_then(|v| v.as_str()) {
                self.models.english_summarizer = repo.to_string();
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(sessions) = performance
                .get("max_concurrent_sessions")
                .and_then(|v| v.as_u64())
            {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
            if let Some(timeout) = performance.get("engine_timeout_secs").and_then(|v| v.as_u64()) {
                self.performance.engine_timeout_secs = timeout;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.min_new_audio_ms, 2_000);
        assert_eq!(config.audio.overlap_ms, 500);
        assert_eq!(config.summarization.chunk_size, 1_800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_config_conversion() {
        let config = AppConfig::default();
        let window = config.audio.to_window_config();
        assert_eq!(window.min_new_samples(), 32_000);
        assert_eq!(window.overlap_samples(), 8_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.models.whisper_model = "humongous".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.summarization.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"audio": {"overlap_ms": 250}, "server": {"port": 9090}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.audio.overlap_ms, 250);
        assert_eq!(config.server.port, 9090);
        // Untouched fields keep their values
        assert_eq!(config.audio.min_new_audio_ms, 2_000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_update_is_rejected() {
        let mut config = AppConfig::default();
        let json = r#"{"models": {"whisper_model": "enormous"}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
