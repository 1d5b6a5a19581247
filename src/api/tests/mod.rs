use super::*;
use crate::types::{Phase, PipelineStatus};
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod control;

fn test_state() -> AppState {
    AppState::new(Arc::new(PipelineStatus::new(200)), CancellationToken::new())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_control_server_serves_and_shuts_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { serve_control(listener, test_state(), shutdown).await }
    });

    let response = reqwest::get(format!("http://{address}/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown is cancelled")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_router(test_state());

    let request = Request::builder()
        .uri("/pipelines")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_reflects_shared_progress() {
    let state = test_state();
    state.status.begin_iteration(2);
    state.status.set_phase(Phase::Dispatching);
    state.status.record_progress(40);
    let app = create_router(state);

    let request = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["message"], "OK");
    assert_eq!(json["status"]["iteration"], 2);
    assert_eq!(json["status"]["iteration_progress"], 40);
    assert_eq!(json["status"]["iteration_max_progress"], 200);
    assert_eq!(json["status"]["phase"], "dispatching");
}
