// src/session.rs - The owned simulation session
//
// One session object owns the clock, the playback state, the fleet
// snapshot, and both periodic loops. Everything runs single-threaded and
// cooperative on a tokio LocalSet; the only suspension point is the
// optimizer round trip.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, broadcast};
use uuid::Uuid;

use crate::clock::{SimTime, TickOutcome, VirtualClock};
use crate::collapse::{CollapseDetector, CollapseReport};
use crate::config::{Config, SimulationMode};
use crate::fleet::ingest::snapshot_from_board;
use crate::fleet::model::{FleetSnapshot, Point};
use crate::motion::MotionInterpolator;
use crate::optimizer::{
    BoardRequest, BreakdownRequest, BreakdownSeverity, OptimizerClient, RouteRequest,
};
use crate::playback::PlaybackController;
use crate::resync::ResyncScheduler;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Initialization failed: {0}")]
    Init(String),
    #[error("Session already finished; restart it first")]
    Finished,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompletionReason {
    /// The horizon was reached; a normal end for daily/weekly runs.
    Horizon,
    /// At least one order missed its deadline.
    Collapse(CollapseReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    Finished(CompletionReason),
}

/// Snapshot of the session for display consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub run_id: Uuid,
    pub mode: SimulationMode,
    pub time: SimTime,
    pub virtual_minute: i64,
    pub elapsed_minutes: i64,
    pub running: bool,
    pub finished: bool,
    pub speed: f64,
    pub pending_orders: usize,
    pub delivered_orders: usize,
}

/// Interpolated render state of one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: String,
    pub position: Point,
    pub heading: f64,
}

struct SessionShared {
    config: Config,
    client: Arc<dyn OptimizerClient>,
    scheduler: Arc<ResyncScheduler>,
    playback: RwLock<PlaybackController>,
    clock: RwLock<VirtualClock>,
    snapshot: RwLock<FleetSnapshot>,
    motion: RwLock<MotionInterpolator>,
    detector: RwLock<CollapseDetector>,
    delivered: RwLock<HashSet<String>>,
    breakdowns: Mutex<Vec<BreakdownRequest>>,
    events: broadcast::Sender<SessionEvent>,
    shutdown: broadcast::Sender<()>,
    run_id: RwLock<Uuid>,
}

impl SessionShared {
    fn route_request(&self, elapsed_minutes: i64) -> RouteRequest {
        let sim = &self.config.simulation;
        let end_date = match sim.mode {
            SimulationMode::Weekly => {
                chrono::NaiveDate::from_ymd_opt(sim.start_year, sim.start_month, sim.start_day)
                    .and_then(|d| d.checked_add_days(chrono::Days::new(7)))
            }
            SimulationMode::Daily | SimulationMode::Collapse => None,
        };
        RouteRequest {
            year: sim.start_year,
            month: sim.start_month,
            elapsed_minutes,
            minutes_per_tick: sim.minutes_per_tick,
            end_date,
        }
    }

    fn board_request(&self) -> BoardRequest {
        let sim = &self.config.simulation;
        BoardRequest {
            year: sim.start_year,
            month: sim.start_month,
            day: sim.start_day,
            hour: sim.start_hour,
            minute: sim.start_minute,
        }
    }

    fn halt_loops(&self) {
        let _ = self.shutdown.send(());
    }
}

/// The simulation session. Construct once per operator scenario, then
/// drive it with `start` / `stop` / `restart`. `start` must run inside a
/// tokio `LocalSet`; both periodic loops are spawned locally.
pub struct SimulationSession {
    shared: Arc<SessionShared>,
}

impl SimulationSession {
    pub fn new(config: Config, client: Arc<dyn OptimizerClient>) -> Self {
        let scheduler = Arc::new(ResyncScheduler::new(
            client.clone(),
            config.simulation.minutes_per_tick,
        ));
        let clock = VirtualClock::new(
            config.simulation.start_virtual_minute(),
            config.simulation.mode,
        );
        let playback = PlaybackController::new(&config.playback);
        let (events, _) = broadcast::channel(16);
        let (shutdown, _) = broadcast::channel(4);
        Self {
            shared: Arc::new(SessionShared {
                client,
                scheduler,
                playback: RwLock::new(playback),
                clock: RwLock::new(clock),
                snapshot: RwLock::new(FleetSnapshot::default()),
                motion: RwLock::new(MotionInterpolator::new()),
                detector: RwLock::new(CollapseDetector::new()),
                delivered: RwLock::new(HashSet::new()),
                breakdowns: Mutex::new(Vec::new()),
                events,
                shutdown,
                run_id: RwLock::new(Uuid::new_v4()),
                config,
            }),
        }
    }

    pub fn mode(&self) -> SimulationMode {
        self.shared.config.simulation.mode
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Sender handle for fan-out to additional consumers (e.g. SSE).
    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.shared.events.clone()
    }

    /// Start or resume the run. A no-op when already running. The first
    /// call initializes the simulation remotely and seeds the order
    /// board; a failure there leaves the session paused and retryable.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let playback = self.shared.playback.read().await;
            if playback.is_running() {
                return Ok(());
            }
        }
        if self.shared.clock.read().await.is_finished() {
            return Err(SessionError::Finished);
        }
        let shared = &self.shared;
        if !shared.playback.read().await.is_initialized() {
            let mode = shared.config.simulation.mode;
            shared
                .client
                .initialize(mode)
                .await
                .map_err(|e| SessionError::Init(e.to_string()))?;
            let board = shared
                .client
                .fetch_board(&shared.board_request())
                .await
                .map_err(|e| SessionError::Init(e.to_string()))?;
            let start_minute = shared.config.simulation.start_virtual_minute();
            let seeded = snapshot_from_board(&board, start_minute)
                .map_err(|e| SessionError::Init(e.to_string()))?;
            *shared.snapshot.write().await = seeded;
            shared.playback.write().await.mark_initialized();
            tracing::info!(
                "Simulation initialized: mode={}, start={}",
                mode.as_str(),
                SimTime::from_virtual_minute(start_minute)
            );
        }
        shared.playback.write().await.set_running(true);
        shared.clock.write().await.start();
        self.spawn_clock_loop();
        self.spawn_frame_loop();
        // Populate the fleet for the starting minute right away instead of
        // waiting for the first boundary.
        spawn_resync(shared.clone());
        tracing::info!("Simulation running");
        Ok(())
    }

    /// Pause the run, freezing the virtual minute and all animation in
    /// place. A no-op when not running.
    pub async fn stop(&self) {
        {
            let mut playback = self.shared.playback.write().await;
            if !playback.is_running() {
                return;
            }
            playback.set_running(false);
        }
        self.shared.clock.write().await.pause();
        self.shared.halt_loops();
        tracing::info!("Simulation paused");
    }

    /// Unconditionally halt, reset the speed to 1.0, re-arm the clock at
    /// the configured start, and let the caller reset its own derived
    /// displays. Fetched snapshots are deliberately left in place.
    pub async fn restart<F: FnOnce()>(&self, on_reset: F) {
        self.shared.halt_loops();
        {
            let mut playback = self.shared.playback.write().await;
            playback.set_running(false);
            playback.reset_speed();
        }
        {
            let mut clock = self.shared.clock.write().await;
            clock.rearm(
                self.shared.config.simulation.start_virtual_minute(),
                self.shared.config.simulation.mode,
            );
        }
        self.shared.detector.write().await.reset();
        *self.shared.run_id.write().await = Uuid::new_v4();
        on_reset();
        tracing::info!("Simulation restarted");
    }

    /// Full reset: clear server-side state, restart locally, and drop the
    /// stale snapshot. The next `start` re-initializes from scratch.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.shared
            .client
            .reset()
            .await
            .map_err(|e| SessionError::Init(e.to_string()))?;
        self.restart(|| {}).await;
        self.shared.playback.write().await.clear_initialized();
        *self.shared.snapshot.write().await = FleetSnapshot::default();
        self.shared.motion.write().await.clear();
        self.shared.delivered.write().await.clear();
        self.shared.breakdowns.lock().await.clear();
        Ok(())
    }

    /// Forwarded to the playback controller; out-of-range requests are
    /// silently rejected.
    pub async fn set_speed(&self, factor: f64) -> bool {
        self.shared.playback.write().await.set_speed(factor)
    }

    /// Queue a breakdown report; it is flushed with the next route fetch.
    pub async fn report_breakdown(&self, vehicle_id: impl Into<String>, severity: BreakdownSeverity) {
        let request = BreakdownRequest::new(vehicle_id, severity);
        tracing::info!(
            "Queued {:?} breakdown for '{}'",
            request.severity,
            request.vehicle_id
        );
        self.shared.breakdowns.lock().await.push(request);
    }

    pub async fn status(&self) -> SessionStatus {
        let clock = self.shared.clock.read().await;
        let playback = self.shared.playback.read().await;
        let snapshot = self.shared.snapshot.read().await;
        let delivered = self.shared.delivered.read().await;
        SessionStatus {
            run_id: *self.shared.run_id.read().await,
            mode: self.shared.config.simulation.mode,
            time: clock.display(),
            virtual_minute: clock.virtual_minute(),
            elapsed_minutes: clock.elapsed_minutes(),
            running: playback.is_running(),
            finished: clock.is_finished(),
            speed: playback.speed(),
            pending_orders: snapshot.orders.iter().filter(|o| !o.delivered).count(),
            delivered_orders: delivered.len(),
        }
    }

    /// Interpolated per-vehicle render state.
    pub async fn vehicles(&self) -> Vec<VehicleState> {
        let motion = self.shared.motion.read().await;
        let mut vehicles: Vec<VehicleState> = motion
            .vehicles()
            .map(|m| VehicleState {
                id: m.vehicle_id.clone(),
                position: m.position,
                heading: m.heading,
            })
            .collect();
        vehicles.sort_by(|a, b| a.id.cmp(&b.id));
        vehicles
    }

    /// Cancel both loops and leave the session inert. Terminal.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down simulation session");
        self.shared.playback.write().await.set_running(false);
        self.shared.halt_loops();
    }

    fn spawn_clock_loop(&self) {
        let shared = self.shared.clone();
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        tokio::task::spawn_local(async move {
            loop {
                let dt = shared.playback.read().await.tick_interval();
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Clock loop shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(dt) => {
                        let outcome = shared.clock.write().await.tick();
                        match outcome {
                            TickOutcome::Advanced(minute) => {
                                if shared.scheduler.is_due(minute) {
                                    spawn_resync(shared.clone());
                                }
                            }
                            TickOutcome::HorizonReached => {
                                shared.playback.write().await.set_running(false);
                                tracing::info!("Simulation horizon reached");
                                let _ = shared
                                    .events
                                    .send(SessionEvent::Finished(CompletionReason::Horizon));
                                shared.halt_loops();
                                break;
                            }
                            TickOutcome::Halted => {}
                        }
                    }
                }
            }
        });
    }

    fn spawn_frame_loop(&self) {
        let shared = self.shared.clone();
        let mut shutdown_rx = self.shared.shutdown.subscribe();
        let frame_dt = Duration::from_millis(self.shared.config.playback.frame_interval_ms);
        tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(frame_dt);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Frame loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let (running, segment_duration) = {
                            let playback = shared.playback.read().await;
                            (playback.is_running(), playback.segment_duration())
                        };
                        if !running {
                            continue;
                        }
                        let now_minute = shared.clock.read().await.virtual_minute();
                        let visits = shared
                            .motion
                            .write()
                            .await
                            .advance_frame(frame_dt, segment_duration, now_minute);
                        if visits.is_empty() {
                            continue;
                        }
                        // Lock order: snapshot before delivered, everywhere.
                        let mut snapshot = shared.snapshot.write().await;
                        let mut delivered = shared.delivered.write().await;
                        for visit in visits {
                            tracing::debug!(
                                "Order '{}' delivered by '{}' at minute {}",
                                visit.order_id,
                                visit.vehicle_id,
                                visit.at_minute
                            );
                            delivered.insert(visit.order_id.clone());
                            if let Some(order) = snapshot.order_mut(&visit.order_id) {
                                order.delivered = true;
                            }
                        }
                    }
                }
            }
        });
    }
}

/// Run one resynchronization boundary if none is outstanding. Failures
/// keep the previous snapshot in place and never reach the clock or the
/// frame handler.
fn spawn_resync(shared: Arc<SessionShared>) {
    let Some(guard) = shared.scheduler.try_claim() else {
        return;
    };
    tokio::task::spawn_local(async move {
        let _guard = guard;
        let run_id = *shared.run_id.read().await;
        let queued: Vec<BreakdownRequest> = shared.breakdowns.lock().await.drain(..).collect();
        let (elapsed, now_minute) = {
            let clock = shared.clock.read().await;
            (clock.elapsed_minutes(), clock.virtual_minute())
        };
        let request = shared.route_request(elapsed);
        let (requeue, result) = shared.scheduler.execute(&request, queued, now_minute).await;
        if !requeue.is_empty() {
            let mut pending = shared.breakdowns.lock().await;
            for report in requeue {
                pending.push(report);
            }
        }
        let mut snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    "Resynchronization at minute {} failed, keeping stale snapshot: {}",
                    now_minute,
                    e
                );
                return;
            }
        };
        if *shared.run_id.read().await != run_id {
            // The session was restarted while this fetch was in flight;
            // its payload belongs to the previous run.
            tracing::debug!("Dropping resynchronization result from a previous run");
            return;
        }
        // Deliveries already confirmed locally survive the replacement.
        {
            let delivered = shared.delivered.read().await;
            for order in &mut snapshot.orders {
                if delivered.contains(&order.id) {
                    order.delivered = true;
                }
            }
        }
        {
            let vehicles = snapshot.vehicles.clone();
            *shared.snapshot.write().await = snapshot;
            shared.motion.write().await.load_vehicles(&vehicles);
        }
        tracing::debug!("Resynchronized at virtual minute {}", now_minute);

        if shared.config.simulation.mode == SimulationMode::Collapse {
            let report = {
                let snapshot = shared.snapshot.read().await;
                let delivered = shared.delivered.read().await;
                shared
                    .detector
                    .write()
                    .await
                    .scan(&snapshot.orders, &delivered, now_minute)
            };
            if let Some(report) = report {
                shared.playback.write().await.set_running(false);
                shared.clock.write().await.finish();
                let _ = shared
                    .events
                    .send(SessionEvent::Finished(CompletionReason::Collapse(report)));
                shared.halt_loops();
            }
        }
    });
}
