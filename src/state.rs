//! # Application State Management
//!
//! Shared state accessed by every HTTP request handler and WebSocket
//! session: the runtime configuration, request metrics, the session
//! registry, and the shared ML engines.
//!
//! ## Sharing Model:
//! Mutable data sits behind `Arc<RwLock<_>>`: many readers or one writer.
//! The engines themselves are immutable service objects constructed once at
//! startup and injected into each session at connection time; their model
//! weights load lazily with single-flight initialization.

use crate::audio::session::SessionManager;
use crate::config::AppConfig;
use crate::device;
use crate::summarization::SummarizerRegistry;
use crate::transcription::{ModelSize, TranscriptionService};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration (updatable through the config endpoint)
    pub config: Arc<RwLock<AppConfig>>,

    /// HTTP request metrics
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,

    /// Shared speech-recognition engine
    transcription: Arc<TranscriptionService>,

    /// Shared summarization collaborators, keyed by language
    summarizers: Arc<SummarizerRegistry>,

    /// Live session registry
    sessions: Arc<SessionManager>,
}

/// Request metrics collected across all HTTP endpoints.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total HTTP requests processed since server start
    pub request_count: u64,

    /// Total errors encountered since server start
    pub error_count: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Statistics for a single endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the application state, constructing the shared engines from
    /// the configuration.
    pub fn new(config: AppConfig) -> Result<Self> {
        let device = device::device_from_config(&config.models.device);
        let timeout = Duration::from_secs(config.performance.engine_timeout_secs);

        let whisper_size: ModelSize = config
            .models
            .whisper_model
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let transcription = Arc::new(TranscriptionService::new(
            whisper_size,
            device.clone(),
            timeout,
        ));

        let summarizers = Arc::new(SummarizerRegistry::new(
            &config.models.multilingual_summarizer,
            &config.models.english_summarizer,
            device,
            timeout,
        ));

        let sessions = Arc::new(SessionManager::new(
            config.performance.max_concurrent_sessions,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            transcription,
            summarizers,
            sessions,
        })
    }

    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validation.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn transcription(&self) -> Arc<TranscriptionService> {
        self.transcription.clone()
    }

    pub fn summarizers(&self) -> Arc<SummarizerRegistry> {
        self.summarizers.clone()
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record duration and outcome for one request to one endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics for the metrics endpoint.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint, in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
