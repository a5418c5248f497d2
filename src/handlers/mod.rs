//! # HTTP Request Handlers
//!
//! The producer-facing and operational endpoints. These are thin wrappers:
//! they validate the request, derive timestamps/statistics, and hand the
//! payload to the relay hub or buffer store — all session state lives in
//! the core, none here.

pub mod audio;       // Audio ingest, buffer retrieval, WAV conversion
pub mod config;      // Runtime configuration view/update
pub mod index;       // Minimal status page
pub mod transcript;  // Transcript segment ingest

pub use audio::{convert_audio_buffer, process_audio, read_audio_buffer};
pub use config::{get_config, update_config};
pub use index::index;
pub use transcript::process_transcript;

use crate::config::AppConfig;
use crate::error::AppError;
use actix_web::{web, HttpRequest};
use std::collections::HashMap;

/// Decoded query string; tolerates a malformed query by treating it as
/// empty.
fn query_map(req: &HttpRequest) -> HashMap<String, String> {
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default()
}

/// The `uid` query parameter carrying the session identifier. Required on
/// every producer and subscriber endpoint; the core is never invoked
/// without it.
pub fn required_uid(req: &HttpRequest) -> Result<String, AppError> {
    match query_map(req).remove("uid") {
        Some(uid) if !uid.is_empty() => Ok(uid),
        _ => Err(AppError::BadRequest(
            "uid parameter is required".to_string(),
        )),
    }
}

/// Sample rate and channel count for one request. PCM is not
/// self-describing, so producers state the format on every call.
#[derive(Debug, Clone, Copy)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Read `sample_rate`/`channels` from the query string, falling back to
/// the configured defaults when a parameter is missing or unparsable.
pub fn audio_format_from_query(req: &HttpRequest, config: &AppConfig) -> AudioFormat {
    let query = query_map(req);
    AudioFormat {
        sample_rate: query
            .get("sample_rate")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.audio.default_sample_rate),
        channels: query
            .get("channels")
            .and_then(|v| v.parse().ok())
            .unwrap_or(config.audio.default_channels),
    }
}
