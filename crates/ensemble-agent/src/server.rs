use crate::handler::CapabilityHandler;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ensemble_core::{Capability, RegistryError, Task, TaskInput, TaskStatus};
use ensemble_registry::{TaskRegistry, TransitionOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default cap on how long a single status call may long-poll server-side.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(120);

/// Shared state for one agent endpoint process.
pub struct AgentState {
    /// This process's task registry.
    pub registry: Arc<TaskRegistry>,
    /// The provider executing accepted tasks.
    pub handler: Arc<dyn CapabilityHandler>,
    /// The capability this agent serves.
    pub capability: Capability,
    /// Server-side ceiling for `wait=true` status calls.
    pub max_wait: Duration,
}

impl AgentState {
    /// Creates state with the default wait ceiling.
    pub fn new(
        registry: Arc<TaskRegistry>,
        handler: Arc<dyn CapabilityHandler>,
        capability: Capability,
    ) -> Self {
        Self {
            registry,
            handler,
            capability,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// The agent endpoint server.
pub struct AgentServer;

impl AgentServer {
    /// Builds the router for an agent process.
    pub fn build(state: Arc<AgentState>) -> Router {
        Router::new()
            .route("/tasks", post(submit_handler))
            .route("/tasks/{task_id}", get(status_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// The task message text.
    pub message: String,
    /// Optional conversation/request correlation ID; generated when absent.
    pub context_id: Option<Uuid>,
    /// Arbitrary metadata passed through to the handler.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Response of `POST /tasks`: asynchronous acceptance.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// ID of the accepted task.
    pub task_id: Uuid,
    /// Always `pending` at acceptance time.
    pub status: TaskStatus,
}

/// Response of `GET /tasks/{task_id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// The queried task ID.
    pub task_id: Uuid,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Output payload, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ensemble_core::TaskOutput>,
    /// Failure description, present once failed or timed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Task> for TaskStatusResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            status: task.status,
            output: task.output,
            error: task.error,
        }
    }
}

/// Query parameters of `GET /tasks/{task_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// When true, long-poll until the task is terminal or the wait bound
    /// elapses.
    #[serde(default)]
    pub wait: bool,
    /// Requested wait bound in seconds; clamped to the server ceiling.
    pub timeout_secs: Option<u64>,
}

async fn submit_handler(
    State(state): State<Arc<AgentState>>,
    Json(request): Json<SubmitRequest>,
) -> impl IntoResponse {
    let context_id = request.context_id.unwrap_or_else(Uuid::new_v4);
    let input = TaskInput {
        message: request.message,
        metadata: request.metadata,
    };

    let task = state
        .registry
        .create(state.capability, input.clone(), context_id)
        .await;

    info!(
        task_id = %task.task_id,
        context_id = %context_id,
        capability = %state.capability,
        "Task accepted"
    );

    // Acceptance is non-blocking: execution continues after this response
    // is sent.
    tokio::spawn(run_task(Arc::clone(&state), task.task_id, input));

    (
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id: task.task_id,
            status: task.status,
        }),
    )
}

/// Drives one accepted task to a terminal state.
///
/// Every exit path lands a terminal transition: handler success becomes
/// `completed`, a handler error becomes `failed`, and a handler panic is
/// caught at the join boundary and also becomes `failed`. Bookkeeping
/// failures are logged, never propagated; there is no caller to propagate
/// to.
async fn run_task(state: Arc<AgentState>, task_id: Uuid, input: TaskInput) {
    if let Err(e) = state
        .registry
        .transition(task_id, TaskStatus::InProgress, TransitionOutcome::None)
        .await
    {
        error!(task_id = %task_id, error = %e, "Failed to mark task in progress");
        return;
    }

    let handler = Arc::clone(&state.handler);
    let result = tokio::spawn(async move { handler.execute(input).await }).await;

    let (status, outcome) = match result {
        Ok(Ok(output)) => (TaskStatus::Completed, TransitionOutcome::Output(output)),
        Ok(Err(e)) => {
            warn!(task_id = %task_id, error = %e, "Capability handler failed");
            (TaskStatus::Failed, TransitionOutcome::Error(e.to_string()))
        }
        Err(join_err) => {
            error!(task_id = %task_id, error = %join_err, "Capability handler panicked");
            (
                TaskStatus::Failed,
                TransitionOutcome::Error(format!("capability handler crashed: {join_err}")),
            )
        }
    };

    if let Err(e) = state.registry.transition(task_id, status, outcome).await {
        error!(task_id = %task_id, error = %e, "Failed to record task outcome");
    }
}

async fn status_handler(
    State(state): State<Arc<AgentState>>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<TaskStatusResponse>, (StatusCode, Json<serde_json::Value>)> {
    let result = if query.wait {
        let requested = query
            .timeout_secs
            .map_or(state.max_wait, Duration::from_secs);
        let bound = requested.min(state.max_wait);
        state.registry.wait_terminal(task_id, bound).await
    } else {
        state.registry.get(task_id).await
    };

    match result {
        Ok(task) => Ok(Json(task.into())),
        Err(RegistryError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("task not found: {task_id}")})),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )),
    }
}

async fn health_handler(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "capability": state.capability,
    }))
}
