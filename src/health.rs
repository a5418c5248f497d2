use crate::relay::messages::Snapshot;
use crate::relay::registry::RegistryCounts;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    // A hub that cannot answer reads as an empty registry rather than a
    // failed health check.
    let relay: RegistryCounts = state
        .hub()
        .send(Snapshot)
        .await
        .unwrap_or_default();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "transcript-relay-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "segments_received": metrics.segments_received,
            "audio_bytes_received": metrics.audio_bytes_received
        },
        "relay": relay,
        "buffer_store": {
            "retention_enabled": config.relay.retain_audio_buffer,
            "sessions": state.buffers().session_count(),
            "total_bytes": state.buffers().total_bytes(),
            "cap_bytes": state.buffers().cap()
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let relay: RegistryCounts = state
        .hub()
        .send(Snapshot)
        .await
        .unwrap_or_default();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            },
            "segments_received": metrics.segments_received,
            "audio_bytes_received": metrics.audio_bytes_received
        },
        "relay": relay,
        "endpoints": endpoint_stats
    }))
}
