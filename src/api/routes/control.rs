//! Pipeline control and status handlers.

use crate::api::AppState;
use crate::error::{Error, Result};
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Body of `POST /control`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Requested action; only `"stop"` is supported
    pub action: String,
}

/// POST /control - Request the pipeline to stop after the current iteration
pub async fn control(
    State(state): State<AppState>,
    Json(request): Json<ControlRequest>,
) -> Result<impl IntoResponse> {
    match request.action.as_str() {
        "stop" => {
            tracing::info!("stop requested through control API");
            state.stop.cancel();
            Ok(Json(json!({
                "message": "Successfully set stop-script flag"
            })))
        }
        other => {
            tracing::debug!(action = %other, "rejected control action");
            Err(Error::InvalidAction(other.to_string()))
        }
    }
}

/// GET /status - Current iteration and progress
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "OK",
        "status": state.status.snapshot()
    }))
}
