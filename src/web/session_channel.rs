//! Defines the communication channel messages between the web server and
//! the session task.

use tokio::sync::{mpsc, oneshot};

use crate::optimizer::BreakdownSeverity;
use crate::session::{SessionStatus, SimulationSession, VehicleState};

/// An operator control action.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    Reset,
    SetSpeed { factor: f64 },
}

/// Represents a request sent from a web handler to the session task.
#[derive(Debug)]
pub enum SessionRequest {
    /// Current clock/playback status.
    GetStatus {
        respond_to: oneshot::Sender<SessionStatus>,
    },
    /// Interpolated per-vehicle render state.
    GetVehicles {
        respond_to: oneshot::Sender<Vec<VehicleState>>,
    },
    /// A playback control action; responds with the resulting status.
    Control {
        action: ControlAction,
        respond_to: oneshot::Sender<Result<SessionStatus, String>>,
    },
    /// Queue a breakdown report for the next resynchronization.
    ReportBreakdown {
        vehicle_id: String,
        severity: BreakdownSeverity,
        respond_to: oneshot::Sender<SessionStatus>,
    },
}

/// Drive the session from the request channel until every sender is gone.
/// Spawn this on the same LocalSet as the session loops.
pub async fn run_session_task(
    session: SimulationSession,
    mut requests: mpsc::Receiver<SessionRequest>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            SessionRequest::GetStatus { respond_to } => {
                let _ = respond_to.send(session.status().await);
            }
            SessionRequest::GetVehicles { respond_to } => {
                let _ = respond_to.send(session.vehicles().await);
            }
            SessionRequest::Control { action, respond_to } => {
                let result = match action {
                    ControlAction::Start => {
                        session.start().await.map_err(|e| e.to_string())
                    }
                    ControlAction::Stop => {
                        session.stop().await;
                        Ok(())
                    }
                    ControlAction::Restart => {
                        session.restart(|| {}).await;
                        Ok(())
                    }
                    ControlAction::Reset => session.reset().await.map_err(|e| e.to_string()),
                    ControlAction::SetSpeed { factor } => {
                        // A rejected speed change is a clamp, not an error.
                        session.set_speed(factor).await;
                        Ok(())
                    }
                };
                let response = match result {
                    Ok(()) => Ok(session.status().await),
                    Err(e) => Err(e),
                };
                let _ = respond_to.send(response);
            }
            SessionRequest::ReportBreakdown {
                vehicle_id,
                severity,
                respond_to,
            } => {
                session.report_breakdown(vehicle_id, severity).await;
                let _ = respond_to.send(session.status().await);
            }
        }
    }
    session.shutdown().await;
}
