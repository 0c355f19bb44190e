// src/optimizer/synthetic.rs - In-process optimizer stand-in
//
// Deterministic for a given seed. Routes are orthogonal hops on the city
// grid; no actual optimization happens here. Used by the simulation
// harness and the integration tests.
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::config::SimulationMode;
use crate::fleet::ingest::{BoardDto, OrderDto, RouteFetchDto, VehicleDto, WaypointDto};
use crate::optimizer::{
    BoardRequest, BreakdownRequest, BreakdownSeverity, OptimizerClient, OptimizerError,
    RouteRequest,
};

const GRID_WIDTH: f64 = 70.0;
const GRID_HEIGHT: f64 = 50.0;
const DEPOT_X: f64 = 35.0;
const DEPOT_Y: f64 = 25.0;

#[derive(Debug)]
struct SyntheticVehicle {
    id: String,
    x: f64,
    y: f64,
}

#[derive(Debug)]
struct SyntheticState {
    rng: StdRng,
    initialized: bool,
    start_minute: i64,
    vehicles: Vec<SyntheticVehicle>,
    orders: Vec<OrderDto>,
    disabled: HashSet<String>,
}

/// Seeded synthetic route source implementing the optimizer contract.
pub struct SyntheticOptimizer {
    state: Mutex<SyntheticState>,
    vehicle_count: usize,
    latency: Duration,
}

impl SyntheticOptimizer {
    pub fn new(seed: u64, vehicle_count: usize) -> Self {
        Self {
            state: Mutex::new(SyntheticState {
                rng: StdRng::seed_from_u64(seed),
                initialized: false,
                start_minute: 0,
                vehicles: Vec::new(),
                orders: Vec::new(),
                disabled: HashSet::new(),
            }),
            vehicle_count,
            latency: Duration::ZERO,
        }
    }

    /// Add an artificial round-trip delay to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn format_point(x: f64, y: f64) -> String {
    format!("{:.1},{:.1}", x, y)
}

#[async_trait]
impl OptimizerClient for SyntheticOptimizer {
    async fn initialize(&self, mode: SimulationMode) -> Result<(), OptimizerError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.vehicles = (0..self.vehicle_count)
            .map(|i| SyntheticVehicle {
                id: format!("TA-{:02}", i + 1),
                x: DEPOT_X,
                y: DEPOT_Y,
            })
            .collect();
        state.disabled.clear();
        state.orders.clear();
        state.initialized = true;
        tracing::debug!(
            "Synthetic optimizer initialized: mode={}, fleet={}",
            mode.as_str(),
            self.vehicle_count
        );
        Ok(())
    }

    async fn fetch_routes(&self, request: &RouteRequest) -> Result<RouteFetchDto, OptimizerError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(OptimizerError::Rejected(
                "simulation not initialized".to_string(),
            ));
        }
        let now_minute = state.start_minute + request.elapsed_minutes;
        let open_orders: Vec<String> = state
            .orders
            .iter()
            .filter(|o| o.appearance_minute <= now_minute && !o.delivered)
            .map(|o| o.id.clone())
            .collect();
        let mut open_orders = open_orders.into_iter();

        let mut vehicles = Vec::new();
        for i in 0..state.vehicles.len() {
            let (id, mut x, mut y, active) = {
                let v = &state.vehicles[i];
                (v.id.clone(), v.x, v.y, !state.disabled.contains(&v.id))
            };
            let mut route = Vec::new();
            if active {
                route.push(WaypointDto {
                    position: format_point(x, y),
                    warehouse: false,
                    order_id: None,
                    eta_minute: None,
                });
                let hops = state.rng.random_range(2..=5);
                for _ in 0..hops {
                    if state.rng.random_bool(0.5) {
                        x = state.rng.random_range(0..GRID_WIDTH as i64) as f64;
                    } else {
                        y = state.rng.random_range(0..GRID_HEIGHT as i64) as f64;
                    }
                    route.push(WaypointDto {
                        position: format_point(x, y),
                        warehouse: false,
                        order_id: None,
                        eta_minute: None,
                    });
                }
                if let Some(order_id) = open_orders.next() {
                    if let Some(last) = route.last_mut() {
                        last.order_id = Some(order_id);
                        last.eta_minute = Some(now_minute + request.minutes_per_tick);
                    }
                }
            }
            state.vehicles[i].x = x;
            state.vehicles[i].y = y;
            vehicles.push(VehicleDto {
                id,
                position: format_point(x, y),
                heading: Some("0".to_string()),
                route,
            });
        }
        Ok(RouteFetchDto {
            vehicles,
            orders: state.orders.clone(),
            blockages: Vec::new(),
        })
    }

    async fn fetch_board(&self, request: &BoardRequest) -> Result<BoardDto, OptimizerError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.start_minute = request.day as i64 * 24 * 60
            + request.hour as i64 * 60
            + request.minute as i64;
        let count = state.rng.random_range(6..=12);
        let start = state.start_minute;
        let mut orders = Vec::with_capacity(count);
        for i in 0..count {
            let appearance = start + state.rng.random_range(0..600);
            let deadline_hours = state.rng.random_range(4..=24);
            orders.push(OrderDto {
                id: format!("o-{}", i + 1),
                appearance_minute: appearance,
                deadline_hours,
                delivered: false,
            });
        }
        state.orders = orders;
        Ok(BoardDto {
            orders: state.orders.clone(),
            blockages: Vec::new(),
        })
    }

    async fn register_breakdown(&self, request: &BreakdownRequest) -> Result<(), OptimizerError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if request.severity == BreakdownSeverity::Total {
            state.disabled.insert(request.vehicle_id.clone());
        }
        tracing::debug!(
            "Synthetic optimizer recorded {:?} breakdown for '{}'",
            request.severity,
            request.vehicle_id
        );
        Ok(())
    }

    async fn reset(&self) -> Result<(), OptimizerError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.initialized = false;
        state.vehicles.clear();
        state.orders.clear();
        state.disabled.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationMode;

    fn board_request() -> BoardRequest {
        BoardRequest {
            year: 2025,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
        }
    }

    fn route_request(elapsed: i64) -> RouteRequest {
        RouteRequest {
            year: 2025,
            month: 1,
            elapsed_minutes: elapsed,
            minutes_per_tick: 15,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_before_initialize_rejected() {
        let opt = SyntheticOptimizer::new(7, 3);
        let err = opt.fetch_routes(&route_request(0)).await.unwrap_err();
        assert!(matches!(err, OptimizerError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_routes_are_deterministic_per_seed() {
        let payloads = {
            let mut out = Vec::new();
            for _ in 0..2 {
                let opt = SyntheticOptimizer::new(42, 3);
                opt.initialize(SimulationMode::Daily).await.unwrap();
                opt.fetch_board(&board_request()).await.unwrap();
                let fetch = opt.fetch_routes(&route_request(15)).await.unwrap();
                out.push(serde_json::to_string(&fetch).unwrap());
            }
            out
        };
        assert_eq!(payloads[0], payloads[1]);
    }

    #[tokio::test]
    async fn test_total_breakdown_empties_route() {
        let opt = SyntheticOptimizer::new(1, 2);
        opt.initialize(SimulationMode::Collapse).await.unwrap();
        opt.fetch_board(&board_request()).await.unwrap();
        let report = BreakdownRequest::new("TA-01", BreakdownSeverity::Total);
        opt.register_breakdown(&report).await.unwrap();
        let fetch = opt.fetch_routes(&route_request(15)).await.unwrap();
        let broken = fetch.vehicles.iter().find(|v| v.id == "TA-01").unwrap();
        assert!(broken.route.is_empty());
        let healthy = fetch.vehicles.iter().find(|v| v.id == "TA-02").unwrap();
        assert!(!healthy.route.is_empty());
    }

    #[tokio::test]
    async fn test_reset_requires_reinitialize() {
        let opt = SyntheticOptimizer::new(1, 2);
        opt.initialize(SimulationMode::Daily).await.unwrap();
        opt.reset().await.unwrap();
        let err = opt.fetch_routes(&route_request(0)).await.unwrap_err();
        assert!(matches!(err, OptimizerError::Rejected(_)));
    }
}
