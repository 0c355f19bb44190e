//! Integration tests for the web API surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt; // for .collect().await
use serde_json::json;
use tokio::task::LocalSet;
use tower::util::ServiceExt; // for `oneshot`

use fleetsim_rs::config::{Config, SimulationMode};
use fleetsim_rs::optimizer::SyntheticOptimizer;
use fleetsim_rs::session::SimulationSession;
use fleetsim_rs::web::api::{AppState, create_router};
use fleetsim_rs::web::session_channel::run_session_task;

fn test_router(local: &LocalSet) -> axum::Router {
    let mut config = Config::default();
    config.simulation.mode = SimulationMode::Daily;
    config.playback.base_tick_ms = 1;
    config.playback.frame_interval_ms = 1;
    config.validate().unwrap();
    let session = SimulationSession::new(config, Arc::new(SyntheticOptimizer::new(21, 3)));
    let events = session.event_sender();
    let (session_tx, session_rx) = tokio::sync::mpsc::channel(8);
    local.spawn_local(run_session_task(session, session_rx));
    create_router(AppState { session_tx, events })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_status_before_start() {
    let local = LocalSet::new();
    let app = test_router(&local);
    local
        .run_until(async {
            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/v1/status")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["running"], json!(false));
            assert_eq!(json["finished"], json!(false));
            assert_eq!(json["speed"], json!(1.0));
            assert_eq!(json["day"], json!(1));
            assert_eq!(json["mode"], json!("daily"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_control_start_and_speed() {
    let local = LocalSet::new();
    let app = test_router(&local);
    local
        .run_until(async {
            let response = app
                .clone()
                .oneshot(post_json("/api/v1/control", json!({"action": "start"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["running"], json!(true));

            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/v1/control",
                    json!({"action": "set_speed", "factor": 2.0}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["speed"], json!(2.0));

            // Doubling again would leave the range: clamped silently,
            // still a 200 with the unchanged speed.
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/v1/control",
                    json!({"action": "set_speed", "factor": 2.0}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["speed"], json!(2.0));

            let response = app
                .oneshot(post_json("/api/v1/control", json!({"action": "stop"})))
                .await
                .unwrap();
            let json = body_json(response).await;
            assert_eq!(json["running"], json!(false));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_vehicles_endpoint() {
    let local = LocalSet::new();
    let app = test_router(&local);
    local
        .run_until(async {
            let response = app
                .clone()
                .oneshot(post_json("/api/v1/control", json!({"action": "start"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/v1/vehicles")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            let vehicles = json.as_array().unwrap();
            assert_eq!(vehicles.len(), 3);
            assert!(vehicles[0]["id"].is_string());
            assert!(vehicles[0]["heading"].is_number());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_breakdown_endpoint() {
    let local = LocalSet::new();
    let app = test_router(&local);
    local
        .run_until(async {
            let response = app
                .oneshot(post_json(
                    "/api/v1/breakdown",
                    json!({"vehicle_id": "TA-02", "severity": "total"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_control_rejected() {
    let local = LocalSet::new();
    let app = test_router(&local);
    local
        .run_until(async {
            let response = app
                .oneshot(post_json("/api/v1/control", json!({"action": "warp"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        })
        .await;
}
