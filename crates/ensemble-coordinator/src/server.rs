use crate::coordinator::Coordinator;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ensemble_core::EnsembleError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// The coordinator's external HTTP boundary.
pub struct CoordinatorServer;

impl CoordinatorServer {
    /// Builds the router for the coordinator process.
    pub fn build(coordinator: Arc<Coordinator>) -> Router {
        Router::new()
            .route("/requests", post(request_handler))
            .route("/health", get(health_handler))
            .with_state(coordinator)
    }
}

/// Body of `POST /requests`.
#[derive(Debug, Deserialize)]
pub struct ExternalRequest {
    /// Free-form request text.
    pub message: String,
    /// Optional prior context for conversation continuity.
    pub context_id: Option<Uuid>,
    /// Arbitrary metadata forwarded to every subtask.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

async fn request_handler(
    State(coordinator): State<Arc<Coordinator>>,
    Json(request): Json<ExternalRequest>,
) -> impl IntoResponse {
    match coordinator
        .handle_request(&request.message, request.context_id, &request.metadata)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(serde_json::json!(result))),
        Err(EnsembleError::Coordinator(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": reason})),
        ),
        Err(e) => {
            error!(error = %e, "Request handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "ensemble-coordinator"}))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_external_request_deserializes_with_defaults() {
        let request: ExternalRequest =
            serde_json::from_str(r#"{"message": "find rust http clients"}"#).unwrap();
        assert_eq!(request.message, "find rust http clients");
        assert!(request.context_id.is_none());
        assert!(request.metadata.is_empty());
    }

    #[test]
    fn test_external_request_accepts_context_and_metadata() {
        let ctx = Uuid::new_v4();
        let body = serde_json::json!({
            "message": "continue",
            "context_id": ctx,
            "metadata": {"channel": "cli"},
        });
        let request: ExternalRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.context_id, Some(ctx));
        assert_eq!(request.metadata["channel"], "cli");
    }
}
