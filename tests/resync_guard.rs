// Integration test for the resynchronization in-flight guard: boundaries
// arriving faster than the optimizer round trip must never produce
// overlapping fetches.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::LocalSet;

use fleetsim_rs::config::{Config, SimulationMode};
use fleetsim_rs::fleet::{BoardDto, RouteFetchDto};
use fleetsim_rs::optimizer::{
    BreakdownRequest, OptimizerClient, OptimizerError, RouteRequest,
};
use fleetsim_rs::session::SimulationSession;

/// Blocks every route fetch until permits are released, counting calls
/// and concurrent calls.
struct GatedClient {
    gate: Semaphore,
    started: AtomicUsize,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl GatedClient {
    fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OptimizerClient for GatedClient {
    async fn initialize(&self, _mode: SimulationMode) -> Result<(), OptimizerError> {
        Ok(())
    }

    async fn fetch_routes(&self, _request: &RouteRequest) -> Result<RouteFetchDto, OptimizerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(RouteFetchDto::default())
    }

    async fn fetch_board(
        &self,
        _request: &fleetsim_rs::optimizer::BoardRequest,
    ) -> Result<BoardDto, OptimizerError> {
        Ok(BoardDto::default())
    }

    async fn register_breakdown(&self, _request: &BreakdownRequest) -> Result<(), OptimizerError> {
        Ok(())
    }

    async fn reset(&self) -> Result<(), OptimizerError> {
        Ok(())
    }
}

fn guard_config() -> Config {
    let mut config = Config::default();
    config.simulation.mode = SimulationMode::Daily;
    // A boundary on every virtual minute, one tick per millisecond: far
    // faster than the gated round trip.
    config.simulation.minutes_per_tick = 1;
    config.playback.base_tick_ms = 1;
    config.playback.frame_interval_ms = 1;
    config.validate().unwrap();
    config
}

#[tokio::test(start_paused = true)]
async fn test_one_outstanding_fetch_at_a_time() {
    let client = Arc::new(GatedClient::new());
    let session = SimulationSession::new(guard_config(), client.clone());
    let local = LocalSet::new();
    local
        .run_until(async {
            session.start().await.unwrap();
            // Dozens of boundaries elapse while the first fetch is stuck.
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(client.started.load(Ordering::SeqCst), 1);

            // Release the round trip; later boundaries may fetch again,
            // but never two at once.
            client.gate.add_permits(100);
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert!(client.started.load(Ordering::SeqCst) >= 2);
            assert_eq!(client.max_concurrent.load(Ordering::SeqCst), 1);

            session.shutdown().await;
        })
        .await;
}

/// Serves one good fetch, then fails every later one.
struct DegradingClient {
    fetches: AtomicUsize,
}

#[async_trait]
impl OptimizerClient for DegradingClient {
    async fn initialize(&self, _mode: SimulationMode) -> Result<(), OptimizerError> {
        Ok(())
    }

    async fn fetch_routes(&self, _request: &RouteRequest) -> Result<RouteFetchDto, OptimizerError> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(RouteFetchDto {
                vehicles: vec![fleetsim_rs::fleet::VehicleDto {
                    id: "TA-01".to_string(),
                    position: "3,4".to_string(),
                    heading: None,
                    route: vec![],
                }],
                orders: vec![],
                blockages: vec![],
            })
        } else {
            Err(OptimizerError::Rejected("planner crashed".to_string()))
        }
    }

    async fn fetch_board(
        &self,
        _request: &fleetsim_rs::optimizer::BoardRequest,
    ) -> Result<BoardDto, OptimizerError> {
        Ok(BoardDto::default())
    }

    async fn register_breakdown(&self, _request: &BreakdownRequest) -> Result<(), OptimizerError> {
        Ok(())
    }

    async fn reset(&self) -> Result<(), OptimizerError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_keeps_stale_snapshot() {
    let client = Arc::new(DegradingClient {
        fetches: AtomicUsize::new(0),
    });
    let session = SimulationSession::new(guard_config(), client.clone());
    let local = LocalSet::new();
    local
        .run_until(async {
            session.start().await.unwrap();
            tokio::time::sleep(Duration::from_millis(60)).await;
            // Later boundaries kept retrying and failing.
            assert!(client.fetches.load(Ordering::SeqCst) > 2);
            // The run is unharmed and the stale vehicle stays displayed.
            let status = session.status().await;
            assert!(status.running);
            assert!(!status.finished);
            let vehicles = session.vehicles().await;
            assert_eq!(vehicles.len(), 1);
            assert_eq!(vehicles[0].id, "TA-01");
            session.shutdown().await;
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_clock_keeps_ticking_during_slow_fetch() {
    let client = Arc::new(GatedClient::new());
    let session = SimulationSession::new(guard_config(), client.clone());
    let local = LocalSet::new();
    local
        .run_until(async {
            session.start().await.unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
            let status = session.status().await;
            // Staleness is tolerated, blocking is not: the clock ran on
            // while the fetch stayed outstanding.
            assert!(status.elapsed_minutes >= 30);
            assert_eq!(client.started.load(Ordering::SeqCst), 1);
            session.shutdown().await;
        })
        .await;
}
