use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use gala_core::WorkflowError;

#[derive(Debug)]
pub enum AppError {
    Authentication(String),
    Workflow(WorkflowError),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        AppError::Workflow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Workflow(err) => workflow_response(err),
        }
    }
}

fn workflow_response(err: WorkflowError) -> Response {
    match err {
        WorkflowError::Validation(_) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
        WorkflowError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() }))).into_response()
        }
        WorkflowError::Forbidden(_) => {
            (StatusCode::FORBIDDEN, Json(json!({ "error": err.to_string() }))).into_response()
        }
        // The caller gets the authoritative state so it can reconcile.
        WorkflowError::StateConflict { kind, ref current, .. } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": err.to_string(),
                "kind": kind,
                "current_state": current,
            })),
        )
            .into_response(),
        WorkflowError::Invariant(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        WorkflowError::Infrastructure(msg) => {
            tracing::error!("infrastructure failure: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
                .into_response()
        }
    }
}
