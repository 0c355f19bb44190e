//! Simulation core for an LPG distribution fleet dashboard.
//!
//! The engine advances a virtual clock at an operator-controlled speed,
//! periodically resynchronizes vehicle routes from an external optimizer,
//! interpolates vehicle position and heading between waypoints, and
//! detects service-level collapse against order deadlines.

pub mod clock;
pub mod collapse;
pub mod config;
pub mod fleet;
pub mod motion;
pub mod optimizer;
pub mod playback;
pub mod resync;
pub mod session;
pub mod web;

pub use clock::{ClockPhase, SimTime, TickOutcome, VirtualClock};
pub use collapse::{CollapseDetector, CollapseReport};
pub use config::{Config, ConfigError, SimulationMode, load_config};
pub use fleet::{FleetSnapshot, Order, Point, Vehicle, Waypoint};
pub use motion::{MotionInterpolator, VisitEvent};
pub use optimizer::{
    BreakdownRequest, BreakdownSeverity, OptimizerClient, OptimizerError, RemoteOptimizer,
    RouteRequest, SyntheticOptimizer,
};
pub use playback::PlaybackController;
pub use resync::ResyncScheduler;
pub use session::{
    CompletionReason, SessionError, SessionEvent, SessionStatus, SimulationSession, VehicleState,
};
