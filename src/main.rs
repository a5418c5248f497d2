//! # Transcript Relay Backend - Main Application Entry Point
//!
//! An Actix-web server that relays live transcript segments and raw PCM
//! audio from HTTP producers to WebSocket subscribers, partitioned by an
//! opaque session identifier.
//!
//! ## Application Architecture:
//! - **relay**: connection registry + broadcast dispatcher (the hub actor)
//! - **audio**: session buffer store, PCM statistics, WAV header codec
//! - **websocket**: subscriber connection actors (`/ws`, `/ws/audio`)
//! - **handlers**: producer and operational HTTP endpoints
//! - **config / state / error / middleware / health**: the usual plumbing
//!
//! ## Lifecycle:
//! The hub and buffer store are constructed before the HTTP server binds
//! and injected through `AppState`; on shutdown the server stops accepting
//! requests first, then the hub drains (closes) every live subscriber.

mod audio;       // Buffer store, stats engine, WAV codec
mod config;      // Configuration management (config.rs)
mod error;       // Error handling types (error.rs)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Health check endpoints (health.rs)
mod middleware;  // Request telemetry (middleware/ directory)
mod relay;       // Registry + hub actor (relay/ directory)
mod state;       // Shared application state (state.rs)
mod websocket;   // Subscriber WebSocket endpoints (websocket.rs)

use actix::Actor;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use relay::hub::RelayHub;
use relay::messages::Drain;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown signal, set by the signal handler task and polled by
/// the main task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting transcript-relay-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!(
        "Audio buffer retention: {} (cap {} bytes)",
        config.relay.retain_audio_buffer, config.relay.buffer_cap_bytes
    );

    // Core components exist before the server binds; handlers receive them
    // through AppState rather than a global.
    let hub = RelayHub::new().start();
    let buffers = Arc::new(audio::buffer::SessionBufferStore::new(
        config.relay.buffer_cap_bytes,
    ));
    let app_state = AppState::new(config.clone(), hub.clone(), buffers);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::RequestTelemetry)
            .route("/", web::get().to(handlers::index))
            .route("/transcript/process", web::post().to(handlers::process_transcript))
            .route("/audio/process", web::post().to(handlers::process_audio))
            .route("/audio/buffer", web::post().to(handlers::convert_audio_buffer))
            .route("/audio/buffer", web::get().to(handlers::read_audio_buffer))
            .route("/ws", web::get().to(websocket::transcript_websocket))
            .route("/ws/audio", web::get().to(websocket::audio_websocket))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    // Server no longer accepts requests; close every live subscriber.
    match hub.send(Drain).await {
        Ok(closed) => info!("Closed {} subscriber connections", closed),
        Err(e) => error!("Failed to drain relay hub: {}", e),
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging with `RUST_LOG`-style filtering.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcript_relay_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Flip the shutdown flag on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag every 100ms until it is set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
