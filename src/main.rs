// src/main.rs - Fleet simulation host
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::LocalSet;

use fleetsim_rs::config;
use fleetsim_rs::optimizer::RemoteOptimizer;
use fleetsim_rs::session::SimulationSession;
use fleetsim_rs::web::api::{AppState, create_router};
use fleetsim_rs::web::session_channel::{SessionRequest, run_session_task};

/// Simulation host for the fleet operations dashboard.
#[derive(Parser, Debug)]
#[command(name = "fleet-host", about = "LPG fleet simulation host.")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, default_value = "fleetsim.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting fleet simulation host");
    tracing::info!("Loading configuration from: {}", cli.config);

    let config = config::load_config(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    tracing::info!(
        "Scenario: {} starting {}-{:02}-{:02} {:02}:{:02}, resync every {} virtual minutes",
        config.simulation.mode.as_str(),
        config.simulation.start_year,
        config.simulation.start_month,
        config.simulation.start_day,
        config.simulation.start_hour,
        config.simulation.start_minute,
        config.simulation.minutes_per_tick
    );
    tracing::info!("Optimizer backend: {}", config.optimizer.addr);

    let client = Arc::new(RemoteOptimizer::new(config.optimizer.addr.clone()));
    let bind = config.web.bind.clone();
    let session = SimulationSession::new(config, client);
    let events = session.event_sender();

    // Channel between the Axum handlers and the session task.
    let (session_tx, session_rx) = mpsc::channel::<SessionRequest>(16);

    // LocalSet keeps the whole engine single-threaded and cooperative.
    let local = LocalSet::new();
    local.spawn_local(run_session_task(session, session_rx));

    let app = create_router(AppState { session_tx, events });
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    local.spawn_local(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Web server error: {}", e);
        }
    });
    local.await;

    Ok(())
}
