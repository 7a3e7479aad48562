//! Room Controller
//!
//! Runs the room session actor against tracing-only collaborators. Useful for
//! exercising slot arbitration end to end: transport events and user input can
//! be replayed from a JSON lines script.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Spawn `RoomActor` and connect
//! 4. Replay `ROOM_EVENT_SCRIPT` if set
//! 5. Wait for shutdown signal, then disconnect
//!
//! # Event script
//!
//! One JSON value per line, for example:
//!
//! ```text
//! {"transport":{"event":"connected"}}
//! {"transport":{"event":"stream_received","stream_id":"s-1","connection_id":"c-1"}}
//! "featured_ready"
//! {"input":{"input":"long_press","view":1}}
//! ```

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use room_controller::actors::{RoomActor, RoomActorHandle, TransportEvent, UserInput};
use room_controller::collaborators::{
    Collaborators, TracingSurface, TracingTelemetrySink, TracingTransport,
};
use room_controller::config::Config;
use room_controller::errors::RoomError;
use room_controller::observability::init_metrics_recorder;
use room_controller::telemetry::SysinfoProbe;
use serde::Deserialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One line of an event script.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ScriptStep {
    Transport(TransportEvent),
    Input(UserInput),
    FeaturedReady,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_controller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        session_id = %config.session_id,
        publisher = %config.publisher.name,
        telemetry_interval_ms = u64::try_from(config.telemetry_interval.as_millis()).unwrap_or(u64::MAX),
        auto_promote_on_featured_leave = config.auto_promote_on_featured_leave,
        metrics_bind_address = %config.metrics_bind_address,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    // This must happen before any metrics are recorded
    let metrics_addr: SocketAddr = config.metrics_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.metrics_bind_address, "Invalid metrics bind address");
        format!("Invalid metrics bind address: {e}")
    })?;
    init_metrics_recorder(metrics_addr).map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!(addr = %metrics_addr, "Prometheus metrics recorder initialized");

    let cancel_token = CancellationToken::new();
    let collaborators = Collaborators {
        transport: Arc::new(TracingTransport),
        surface: Arc::new(TracingSurface),
        telemetry_sink: Arc::new(TracingTelemetrySink),
        probe: Box::new(SysinfoProbe::new()),
    };
    let (handle, task) = RoomActor::spawn(&config, collaborators, cancel_token.child_token());
    info!("Room actor started");

    handle.connect().await.map_err(|e| {
        error!(error = %e, "Failed to connect");
        e
    })?;

    if let Some(path) = &config.event_script {
        replay_script(&handle, path).await?;
    }

    info!("Room Controller running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, disconnecting...");
    if let Err(e) = handle.disconnect().await {
        warn!(error = %e, "Disconnect failed");
    }

    cancel_token.cancel();
    if let Err(e) = task.await {
        warn!(error = %e, "Room actor task failed");
    }

    info!("Room Controller shutdown complete");
    Ok(())
}

/// Feed every step of a JSON lines script to the room actor, in order.
///
/// Blank lines and lines starting with `#` are skipped. A malformed line is
/// logged and skipped.
async fn replay_script(handle: &RoomActorHandle, path: &str) -> Result<(), RoomError> {
    let script = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RoomError::Config(format!("cannot read event script {path}: {e}")))?;

    let mut applied = 0usize;
    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let step: ScriptStep = match serde_json::from_str(line) {
            Ok(step) => step,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed script line");
                continue;
            }
        };

        match step {
            ScriptStep::Transport(event) => handle.transport_event(event).await?,
            ScriptStep::Input(input) => handle.user_input(input).await?,
            ScriptStep::FeaturedReady => handle.featured_ready().await?,
        }
        applied += 1;
    }

    let snapshot = handle.get_state().await?;
    info!(
        path,
        applied,
        state = snapshot.state.as_str(),
        featured = ?snapshot.featured,
        grid = ?snapshot.grid,
        "Event script replayed"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
