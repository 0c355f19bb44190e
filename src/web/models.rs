//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

use crate::optimizer::BreakdownSeverity;
use crate::session::{SessionStatus, VehicleState};
use crate::web::session_channel::ControlAction;

/// Current status of the simulation session.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub run_id: String,
    pub mode: String,
    pub day: i64,
    pub hour: u8,
    pub minute: u8,
    pub virtual_minute: i64,
    pub elapsed_minutes: i64,
    pub running: bool,
    pub finished: bool,
    pub speed: f64,
    pub pending_orders: usize,
    pub delivered_orders: usize,
}

impl From<SessionStatus> for StatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            run_id: status.run_id.to_string(),
            mode: status.mode.as_str().to_string(),
            day: status.time.day,
            hour: status.time.hour,
            minute: status.time.minute,
            virtual_minute: status.virtual_minute,
            elapsed_minutes: status.elapsed_minutes,
            running: status.running,
            finished: status.finished,
            speed: status.speed,
            pending_orders: status.pending_orders,
            delivered_orders: status.delivered_orders,
        }
    }
}

/// Interpolated render state of one vehicle.
#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl From<VehicleState> for VehicleResponse {
    fn from(state: VehicleState) -> Self {
        Self {
            id: state.id,
            x: state.position.x,
            y: state.position.y,
            heading: state.heading,
        }
    }
}

/// A playback control request.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlRequest {
    Start,
    Stop,
    Restart,
    Reset,
    SetSpeed { factor: f64 },
}

impl From<ControlRequest> for ControlAction {
    fn from(request: ControlRequest) -> Self {
        match request {
            ControlRequest::Start => ControlAction::Start,
            ControlRequest::Stop => ControlAction::Stop,
            ControlRequest::Restart => ControlAction::Restart,
            ControlRequest::Reset => ControlAction::Reset,
            ControlRequest::SetSpeed { factor } => ControlAction::SetSpeed { factor },
        }
    }
}

/// An operator-reported vehicle breakdown.
#[derive(Debug, Deserialize)]
pub struct BreakdownRequestBody {
    pub vehicle_id: String,
    pub severity: BreakdownSeverity,
}
