//! # Application State Management
//!
//! Shared state handed to every HTTP request handler. The two stateful core
//! components — the relay hub and the session buffer store — are constructed
//! once in `main` and injected here, so nothing in the crate reaches for a
//! global instance.
//!
//! ## Concurrency layout:
//! - `hub`: an actor address; all registry access is message submission,
//!   never shared memory
//! - `buffers`: internally synchronized with its own mutex, accessed
//!   directly by producer handlers without going through the hub
//! - `config`/`metrics`: `Arc<RwLock>` — many readers or one writer
//! - `start_time`: immutable after construction, no locking needed

use crate::audio::buffer::SessionBufferStore;
use crate::config::AppConfig;
use crate::relay::hub::RelayHub;
use actix::Addr;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    config: Arc<RwLock<AppConfig>>,

    /// The broadcast dispatcher owning the connection registry
    hub: Addr<RelayHub>,

    /// Per-session capped audio accumulation
    buffers: Arc<SessionBufferStore>,

    /// Counters updated by the telemetry middleware and the ingest handlers
    metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    start_time: Instant,
}

/// Counters collected across all requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total HTTP requests processed since start
    pub request_count: u64,

    /// Total error responses since start
    pub error_count: u64,

    /// Transcript segments accepted from producers
    pub segments_received: u64,

    /// Raw audio bytes accepted from producers
    pub audio_bytes_received: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Request statistics for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, hub: Addr<RelayHub>, buffers: Arc<SessionBufferStore>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            hub,
            buffers,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Snapshot of the current configuration. Cloned so the lock is
    /// released immediately.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn hub(&self) -> &Addr<RelayHub> {
        &self.hub
    }

    pub fn buffers(&self) -> &SessionBufferStore {
        &self.buffers
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    pub fn record_segments(&self, count: u64) {
        self.metrics.write().unwrap().segments_received += count;
    }

    pub fn record_audio_bytes(&self, bytes: u64) {
        self.metrics.write().unwrap().audio_bytes_received += bytes;
    }

    /// Fold one finished request into the per-endpoint statistics.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics for serialization, so no lock is held
    /// while the HTTP response is built.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            segments_received: metrics.segments_received,
            audio_bytes_received: metrics.audio_bytes_received,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
