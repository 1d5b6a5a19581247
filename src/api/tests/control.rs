use super::*;

fn control_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/control")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_stop_action_cancels_token() {
    let state = test_state();
    let stop = state.stop.clone();
    let app = create_router(state);

    let response = app
        .oneshot(control_request(r#"{"action": "stop"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Successfully set stop-script flag");
    assert!(stop.is_cancelled());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let state = test_state();
    let stop = state.stop.clone();
    let app = create_router(state);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(control_request(r#"{"action": "stop"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(stop.is_cancelled());
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let state = test_state();
    let stop = state.stop.clone();
    let app = create_router(state);

    let response = app
        .oneshot(control_request(r#"{"action": "pause"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "invalid_action");
    assert_eq!(json["error"]["details"]["action"], "pause");
    assert!(!stop.is_cancelled());
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let state = test_state();
    let stop = state.stop.clone();
    let app = create_router(state);

    let response = app.oneshot(control_request("not json")).await.unwrap();

    assert!(response.status().is_client_error());
    assert!(!stop.is_cancelled());
}
