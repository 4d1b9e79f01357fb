use crate::directory::AgentDirectory;
use ensemble_core::{Capability, EnsembleError, TaskInput, TaskOutput, TaskStatus};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal result of one delegation round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegationOutcome {
    /// The remote agent completed the task and returned its payload.
    Completed(TaskOutput),
    /// The task could not be delegated or the remote agent could not
    /// complete it. Carries a human-readable reason.
    Failed(String),
    /// The caller's time budget elapsed before the task reached a terminal
    /// state. The agent may still be executing; nobody is waiting.
    TimedOut,
}

impl DelegationOutcome {
    /// Whether this outcome carries a completed payload.
    pub fn is_completed(&self) -> bool {
        matches!(self, DelegationOutcome::Completed(_))
    }
}

#[derive(Deserialize)]
struct AcceptBody {
    task_id: Uuid,
}

#[derive(Deserialize)]
struct StatusBody {
    status: TaskStatus,
    #[serde(default)]
    output: Option<TaskOutput>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for submitting a task to a remote agent endpoint and retrieving
/// its result.
///
/// Every request carries an explicit network timeout no larger than the
/// remaining caller budget, so no remote failure mode can block the caller
/// past `timeout`. Retry policy belongs to the coordinator; this client
/// reports the first terminal answer it gets.
pub struct DelegationClient {
    http: reqwest::Client,
    directory: AgentDirectory,
}

impl DelegationClient {
    /// Creates a client over the given directory.
    pub fn new(directory: AgentDirectory) -> Self {
        Self {
            http: reqwest::Client::new(),
            directory,
        }
    }

    /// Delegates one task: resolve the endpoint, submit, then await the
    /// result until `timeout` elapses.
    pub async fn delegate(
        &self,
        capability: Capability,
        input: TaskInput,
        context_id: Uuid,
        timeout: Duration,
    ) -> DelegationOutcome {
        let base = match self.directory.resolve(capability) {
            Ok(base) => base.to_string(),
            Err(EnsembleError::Delegation(reason)) => {
                return DelegationOutcome::Failed(format!("delegation error: {reason}"));
            }
            Err(e) => return DelegationOutcome::Failed(format!("delegation error: {e}")),
        };

        let deadline = Instant::now() + timeout;

        let task_id = match self.submit(&base, capability, &input, context_id, deadline).await {
            Ok(task_id) => task_id,
            Err(outcome) => return outcome,
        };

        info!(
            capability = %capability,
            task_id = %task_id,
            context_id = %context_id,
            timeout_ms = timeout.as_millis() as u64,
            "Task delegated"
        );

        self.await_result(&base, capability, task_id, deadline).await
    }

    async fn submit(
        &self,
        base: &str,
        capability: Capability,
        input: &TaskInput,
        context_id: Uuid,
        deadline: Instant,
    ) -> Result<Uuid, DelegationOutcome> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DelegationOutcome::TimedOut);
        }

        let body = serde_json::json!({
            "message": input.message,
            "context_id": context_id,
            "metadata": input.metadata,
        });

        let response = self
            .http
            .post(format!("{base}/tasks"))
            .timeout(remaining)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(DelegationOutcome::TimedOut),
            Err(e) => {
                warn!(capability = %capability, error = %e, "Task submission failed");
                return Err(DelegationOutcome::Failed(format!("delegation error: {e}")));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DelegationOutcome::Failed(format!(
                "delegation error: agent returned HTTP {status}"
            )));
        }

        match response.json::<AcceptBody>().await {
            Ok(accepted) => Ok(accepted.task_id),
            Err(e) => Err(DelegationOutcome::Failed(format!(
                "delegation error: malformed acceptance response: {e}"
            ))),
        }
    }

    /// Long-polls the agent's status endpoint until a terminal state or the
    /// deadline. The server may clamp an individual wait below the remaining
    /// budget, so this loops; each round is still network-bounded by the
    /// budget left at that point.
    async fn await_result(
        &self,
        base: &str,
        capability: Capability,
        task_id: Uuid,
        deadline: Instant,
    ) -> DelegationOutcome {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(capability = %capability, task_id = %task_id, "Delegation budget exhausted");
                return DelegationOutcome::TimedOut;
            }

            let wait_secs = remaining.as_secs_f64().ceil() as u64;
            let response = self
                .http
                .get(format!("{base}/tasks/{task_id}?wait=true&timeout_secs={wait_secs}"))
                .timeout(remaining)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => return DelegationOutcome::TimedOut,
                Err(e) => {
                    return DelegationOutcome::Failed(format!("delegation error: {e}"));
                }
            };

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return DelegationOutcome::Failed("delegation error: task not found".to_string());
            }
            let status = response.status();
            if !status.is_success() {
                return DelegationOutcome::Failed(format!(
                    "delegation error: agent returned HTTP {status}"
                ));
            }

            let body = match response.json::<StatusBody>().await {
                Ok(body) => body,
                Err(e) => {
                    return DelegationOutcome::Failed(format!(
                        "delegation error: malformed status response: {e}"
                    ));
                }
            };

            match body.status {
                TaskStatus::Completed => {
                    return match body.output {
                        Some(output) => DelegationOutcome::Completed(output),
                        None => DelegationOutcome::Failed(
                            "delegation error: completed task carried no output".to_string(),
                        ),
                    };
                }
                TaskStatus::Failed => {
                    return DelegationOutcome::Failed(
                        body.error.unwrap_or_else(|| "task failed".to_string()),
                    );
                }
                TaskStatus::TimedOut => return DelegationOutcome::TimedOut,
                TaskStatus::Pending | TaskStatus::InProgress => {
                    // Not terminal yet; loop around with whatever budget is left.
                }
            }
        }
    }
}
