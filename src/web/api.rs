//! Defines the Axum API routes and handlers.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures_util::Stream;
use tokio::sync::{broadcast, mpsc};

use crate::session::SessionEvent;
use crate::web::models::{BreakdownRequestBody, ControlRequest, StatusResponse, VehicleResponse};
use crate::web::session_channel::SessionRequest;

#[derive(Clone)]
pub struct AppState {
    pub session_tx: mpsc::Sender<SessionRequest>,
    pub events: broadcast::Sender<SessionEvent>,
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/vehicles", get(get_vehicles))
        .route("/api/v1/control", post(control))
        .route("/api/v1/breakdown", post(report_breakdown))
        .route("/api/v1/events", get(events))
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state
        .session_tx
        .send(SessionRequest::GetStatus {
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(status) => Ok(Json(status.into())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn get_vehicles(
    State(state): State<AppState>,
) -> Result<Json<Vec<VehicleResponse>>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state
        .session_tx
        .send(SessionRequest::GetVehicles {
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(vehicles) => Ok(Json(vehicles.into_iter().map(Into::into).collect())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn control(
    State(state): State<AppState>,
    Json(payload): Json<ControlRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state
        .session_tx
        .send(SessionRequest::Control {
            action: payload.into(),
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session task gone".to_string(),
        ));
    }
    match resp_rx.await {
        Ok(Ok(status)) => Ok(Json(status.into())),
        // Initialization failures are retryable operator errors.
        Ok(Err(message)) => Err((StatusCode::CONFLICT, message)),
        Err(_) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session task gone".to_string(),
        )),
    }
}

async fn report_breakdown(
    State(state): State<AppState>,
    Json(payload): Json<BreakdownRequestBody>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state
        .session_tx
        .send(SessionRequest::ReportBreakdown {
            vehicle_id: payload.vehicle_id,
            severity: payload.severity,
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(status) => Ok(Json(status.into())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Server-sent completion events: horizon reached or collapse detected.
async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().event("session").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
