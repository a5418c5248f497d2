//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST`/`PORT` environment variables (deployment platform convention)
//! 2. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use crate::audio::buffer::DEFAULT_BUFFER_CAP_BYTES;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub audio: AudioConfig,
}

/// Server-specific configuration settings.
///
/// - `host = "127.0.0.1"`: only accept connections from localhost
/// - `host = "0.0.0.0"`: accept connections from any address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Relay behavior settings.
///
/// The two fields decide the server-side audio retention variant: when
/// `retain_audio_buffer` is off, clients keep their own audio and the
/// server computes statistics from each chunk alone. `buffer_cap_bytes`
/// sizes the per-session sliding window and is read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub retain_audio_buffer: bool,
    pub buffer_cap_bytes: usize,
}

/// Fallback audio format for requests that don't state one.
///
/// PCM chunks are not self-describing; producers normally pass
/// `sample_rate`/`channels` as query parameters and these defaults cover
/// the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub default_sample_rate: u32,
    pub default_channels: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            relay: RelayConfig {
                retain_audio_buffer: true,
                buffer_cap_bytes: DEFAULT_BUFFER_CAP_BYTES,
            },
            audio: AudioConfig {
                default_sample_rate: 8000,
                default_channels: 1,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: override server host
    /// - `APP_SERVER_PORT=3000`: override server port
    /// - `HOST`/`PORT`: special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.relay.buffer_cap_bytes == 0 {
            return Err(anyhow::anyhow!("Audio buffer cap must be greater than 0"));
        }

        if self.audio.default_sample_rate == 0 {
            return Err(anyhow::anyhow!("Default sample rate must be greater than 0"));
        }

        if self.audio.default_channels == 0 {
            return Err(anyhow::anyhow!("Default channel count must be greater than 0"));
        }

        Ok(())
    }

    /// Apply a partial update from a JSON document (runtime config updates).
    ///
    /// Only the fields present in the JSON are touched; the result is
    /// re-validated before it replaces anything. Note that `server.*` and
    /// `relay.buffer_cap_bytes` only take effect on restart — the listener
    /// is already bound and the buffer store is already sized.
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

        if let Some(relay) = partial_config.get("relay") {
            if let Some(retain) = relay.get("retain_audio_buffer").and_then(|v| v.as_bool()) {
                self.relay.retain_audio_buffer = retain;
            }
            if let Some(cap) = relay.get("buffer_cap_bytes").and_then(|v| v.as_u64()) {
                self.relay.buffer_cap_bytes = cap as usize;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("default_sample_rate").and_then(|v| v.as_u64()) {
                self.audio.default_sample_rate = rate as u32;
            }
            if let Some(channels) = audio.get("default_channels").and_then(|v| v.as_u64()) {
                self.audio.default_channels = channels as u16;
            }
        }

        self.validate()?;
        Ok(())
    }
}
