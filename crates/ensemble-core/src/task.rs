use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A named category of work mapped to one agent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Web research, documentation analysis, information gathering.
    Research,
    /// Code generation, debugging, explanation.
    Code,
    /// Data analysis, metrics calculation, insight extraction.
    Analytics,
}

impl Capability {
    /// All known capabilities, in canonical order.
    pub const ALL: [Capability; 3] = [Capability::Research, Capability::Code, Capability::Analytics];
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Research => write!(f, "research"),
            Capability::Code => write!(f, "code"),
            Capability::Analytics => write!(f, "analytics"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "research" => Ok(Capability::Research),
            "code" => Ok(Capability::Code),
            "analytics" => Ok(Capability::Analytics),
            other => Err(format!("unknown capability: {other}")),
        }
    }
}

/// Lifecycle status of a task.
///
/// Statuses only ever advance along `pending -> in_progress -> terminal`;
/// a terminal status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted but not yet started.
    Pending,
    /// The owning agent is executing the task.
    InProgress,
    /// Execution finished and produced an output payload.
    Completed,
    /// Execution finished with an error.
    Failed,
    /// The caller's time budget elapsed before a result arrived.
    TimedOut,
}

impl TaskStatus {
    /// Whether no further transitions can occur from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }

    /// Position in the monotonic lifecycle order.
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut => 2,
        }
    }

    /// Whether a transition from `self` to `next` advances the lifecycle.
    ///
    /// Skipping `in_progress` is allowed (a task may fail or time out before
    /// it starts); moving sideways between terminal states or backwards is
    /// not.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Input payload for a delegated task: the message text plus arbitrary
/// key-value metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    /// The task message text.
    pub message: String,
    /// Arbitrary metadata attached by the submitter.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TaskInput {
    /// Creates an input from message text with empty metadata.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attaches a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Output payload produced by a completed task.
///
/// The payload is opaque to the registry and delegation layers; the
/// aggregator reads well-known fields per capability when formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOutput(pub serde_json::Value);

impl TaskOutput {
    /// Wraps a JSON value as a task output.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Looks up a top-level field of the payload, if it is an object.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// The field as a string, if present.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

/// A unit of delegated work and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the owning registry. Immutable.
    pub task_id: Uuid,
    /// Which agent type should execute this task.
    pub capability: Capability,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// The submitted input payload.
    pub input: TaskInput,
    /// Output payload; present only when `status == completed`.
    pub output: Option<TaskOutput>,
    /// Failure description; present only when `status` is `failed` or
    /// `timed_out`.
    pub error: Option<String>,
    /// Groups tasks belonging to the same originating request/conversation.
    pub context_id: Uuid,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Advances on every status change.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new pending task.
    pub fn new(capability: Capability, input: TaskInput, context_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            capability,
            status: TaskStatus::Pending,
            input,
            output: None,
            error: None,
            context_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this task has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
