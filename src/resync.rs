// src/resync.rs - Periodic snapshot refresh from the optimizer
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::fleet::ingest::{IngestError, snapshot_from_fetch};
use crate::fleet::model::FleetSnapshot;
use crate::optimizer::{BreakdownRequest, OptimizerClient, OptimizerError, RouteRequest};

#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}

/// Fires a route fetch on every tick boundary aligned to the
/// resynchronization period, with a mandatory in-flight guard: ticks can
/// arrive faster than a round trip completes, and a second concurrent
/// fetch must never be issued while one is outstanding.
pub struct ResyncScheduler {
    client: Arc<dyn OptimizerClient>,
    minutes_per_tick: i64,
    in_flight: AtomicBool,
}

/// Releases the in-flight guard when dropped, on every exit path.
pub struct InFlightGuard {
    scheduler: Arc<ResyncScheduler>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.scheduler.in_flight.store(false, Ordering::Release);
    }
}

impl ResyncScheduler {
    pub fn new(client: Arc<dyn OptimizerClient>, minutes_per_tick: i64) -> Self {
        Self {
            client,
            minutes_per_tick,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether this virtual minute is a resynchronization boundary.
    pub fn is_due(&self, virtual_minute: i64) -> bool {
        virtual_minute % self.minutes_per_tick == 0
    }

    pub fn minutes_per_tick(&self) -> i64 {
        self.minutes_per_tick
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the boundary. Returns `None` while a fetch is outstanding.
    pub fn try_claim(self: &Arc<Self>) -> Option<InFlightGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(InFlightGuard {
                scheduler: self.clone(),
            })
        } else {
            None
        }
    }

    /// Flush queued breakdown reports, fetch routes, and build the
    /// replacement snapshot. Reports that fail to flush are handed back
    /// for the next boundary.
    pub async fn execute(
        &self,
        request: &RouteRequest,
        breakdowns: Vec<BreakdownRequest>,
        fetched_at_minute: i64,
    ) -> (Vec<BreakdownRequest>, Result<FleetSnapshot, ResyncError>) {
        let mut requeue = Vec::new();
        for report in breakdowns {
            if let Err(e) = self.client.register_breakdown(&report).await {
                tracing::warn!(
                    "Breakdown report for '{}' not accepted, requeueing: {}",
                    report.vehicle_id,
                    e
                );
                requeue.push(report);
            }
        }
        let result = match self.client.fetch_routes(request).await {
            Ok(fetch) => snapshot_from_fetch(&fetch, fetched_at_minute).map_err(ResyncError::from),
            Err(e) => Err(ResyncError::from(e)),
        };
        (requeue, result)
    }
}
