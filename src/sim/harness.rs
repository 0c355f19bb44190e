//! CLI entry point for the simulation harness: accelerated headless runs
//! against the synthetic optimizer, with an optional JSONL status trace.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::task::LocalSet;

use fleetsim_rs::config::{Config, SimulationMode};
use fleetsim_rs::optimizer::SyntheticOptimizer;
use fleetsim_rs::session::{CompletionReason, SessionEvent, SimulationSession};

/// Simulation Harness CLI
#[derive(Parser, Debug)]
#[command(
    name = "sim-harness",
    about = "Headless fleet simulation runs for engine regression checks."
)]
struct Cli {
    /// Simulation mode: daily, weekly or collapse
    #[arg(long, default_value = "daily")]
    mode: String,

    /// Seed for the synthetic optimizer
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fleet size
    #[arg(long, default_value_t = 6)]
    vehicles: usize,

    /// Wall-clock milliseconds per virtual minute
    #[arg(long, default_value_t = 5)]
    tick_ms: u64,

    /// Animation frame period in milliseconds
    #[arg(long, default_value_t = 5)]
    frame_ms: u64,

    /// Wall-clock milliseconds per route segment
    #[arg(long, default_value_t = 20)]
    segment_ms: u64,

    /// Virtual minutes between resynchronizations
    #[arg(long, default_value_t = 15)]
    minutes_per_tick: i64,

    /// Simulated optimizer round-trip latency in milliseconds
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,

    /// Abort the run after this many wall-clock seconds
    #[arg(long, default_value_t = 60)]
    max_wall_secs: u64,

    /// Write a JSONL status trace to this path
    #[arg(long)]
    trace: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct StatusRecord {
    wall_ms: u128,
    virtual_minute: i64,
    day: i64,
    hour: u8,
    minute: u8,
    speed: f64,
    running: bool,
    finished: bool,
    pending_orders: usize,
    delivered_orders: usize,
}

fn parse_mode(raw: &str) -> Result<SimulationMode, String> {
    match raw {
        "daily" => Ok(SimulationMode::Daily),
        "weekly" => Ok(SimulationMode::Weekly),
        "collapse" => Ok(SimulationMode::Collapse),
        other => Err(format!(
            "unknown mode '{}', expected daily|weekly|collapse",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let mode = parse_mode(&cli.mode)?;

    let mut config = Config::default();
    config.simulation.mode = mode;
    config.simulation.minutes_per_tick = cli.minutes_per_tick;
    config.playback.base_tick_ms = cli.tick_ms;
    config.playback.frame_interval_ms = cli.frame_ms;
    config.playback.segment_base_ms = cli.segment_ms;
    config.validate()?;

    tracing::info!(
        "Harness run: mode={}, seed={}, fleet={}, tick={}ms",
        mode.as_str(),
        cli.seed,
        cli.vehicles,
        cli.tick_ms
    );

    let client = Arc::new(
        SyntheticOptimizer::new(cli.seed, cli.vehicles)
            .with_latency(Duration::from_millis(cli.latency_ms)),
    );
    let session = SimulationSession::new(config, client);
    let mut events = session.subscribe();

    let mut trace = match &cli.trace {
        Some(path) => Some(std::fs::File::create(path)?),
        None => None,
    };

    let local = LocalSet::new();
    let outcome = local
        .run_until(async move {
            session.start().await?;
            let started = std::time::Instant::now();
            let deadline = tokio::time::sleep(Duration::from_secs(cli.max_wall_secs));
            tokio::pin!(deadline);
            let mut sample = tokio::time::interval(Duration::from_millis(250));

            let reason = loop {
                tokio::select! {
                    event = events.recv() => {
                        match event {
                            Ok(SessionEvent::Finished(reason)) => break Some(reason),
                            Err(_) => break None,
                        }
                    }
                    _ = &mut deadline => {
                        tracing::warn!("Wall-clock limit reached, stopping run");
                        session.stop().await;
                        break None;
                    }
                    _ = sample.tick() => {
                        let status = session.status().await;
                        if let Some(file) = trace.as_mut() {
                            let record = StatusRecord {
                                wall_ms: started.elapsed().as_millis(),
                                virtual_minute: status.virtual_minute,
                                day: status.time.day,
                                hour: status.time.hour,
                                minute: status.time.minute,
                                speed: status.speed,
                                running: status.running,
                                finished: status.finished,
                                pending_orders: status.pending_orders,
                                delivered_orders: status.delivered_orders,
                            };
                            writeln!(file, "{}", serde_json::to_string(&record)?)?;
                        }
                    }
                }
            };

            let status = session.status().await;
            session.shutdown().await;
            Ok::<_, Box<dyn std::error::Error + Send + Sync + 'static>>((reason, status))
        })
        .await?;

    let (reason, status) = outcome;
    match reason {
        Some(CompletionReason::Horizon) => {
            tracing::info!(
                "Run complete at {}: horizon reached, {} order(s) delivered",
                status.time,
                status.delivered_orders
            );
        }
        Some(CompletionReason::Collapse(report)) => {
            tracing::info!(
                "Run collapsed at minute {}: {} overdue order(s)",
                report.detected_at_minute,
                report.overdue.len()
            );
            for order in &report.overdue {
                tracing::info!(
                    "  order '{}' appeared at {} with a {}h deadline",
                    order.id,
                    order.appearance_minute,
                    order.deadline_hours
                );
            }
        }
        None => {
            tracing::info!(
                "Run stopped at {} without completing ({} order(s) delivered)",
                status.time,
                status.delivered_orders
            );
        }
    }
    Ok(())
}
