// src/optimizer/mod.rs - The seam to the external route optimizer
pub mod remote;
pub mod synthetic;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SimulationMode;
use crate::fleet::ingest::{BoardDto, RouteFetchDto};

pub use remote::RemoteOptimizer;
pub use synthetic::SyntheticOptimizer;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Optimizer rejected request: {0}")]
    Rejected(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Parameters of one route fetch: the scenario month plus the virtual
/// minutes elapsed since the start and the resynchronization period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub year: i32,
    pub month: u32,
    pub elapsed_minutes: i64,
    pub minutes_per_tick: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// The start instant a new simulation is seeded for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoardRequest {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakdownSeverity {
    Minor,
    Major,
    Total,
}

/// An operator-reported breakdown, queued client-side and flushed with
/// the next route fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownRequest {
    pub id: Uuid,
    pub vehicle_id: String,
    pub severity: BreakdownSeverity,
}

impl BreakdownRequest {
    pub fn new(vehicle_id: impl Into<String>, severity: BreakdownSeverity) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id: vehicle_id.into(),
            severity,
        }
    }
}

/// Abstract contract with the external optimizer. The wire format is the
/// implementation's business; the engine only sees typed requests and
/// wire DTOs that go through ingestion.
#[async_trait]
pub trait OptimizerClient: Send + Sync {
    /// One-time simulation setup; must succeed before the clock may run.
    async fn initialize(&self, mode: SimulationMode) -> Result<(), OptimizerError>;

    /// Current vehicle routes as of the given elapsed virtual time. In
    /// collapse mode the payload also carries the order list.
    async fn fetch_routes(&self, request: &RouteRequest) -> Result<RouteFetchDto, OptimizerError>;

    /// Pending orders and blockages seeding a new simulation start.
    async fn fetch_board(&self, request: &BoardRequest) -> Result<BoardDto, OptimizerError>;

    async fn register_breakdown(&self, request: &BreakdownRequest) -> Result<(), OptimizerError>;

    /// Clear all server-side simulation state. Paired with a client-side
    /// restart.
    async fn reset(&self) -> Result<(), OptimizerError>;
}
