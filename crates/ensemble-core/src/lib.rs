//! Core types and error definitions for the Ensemble orchestration system.
//!
//! This crate provides the foundational types shared across all Ensemble
//! crates: the task lifecycle model, capability tags, delegation payloads,
//! and the unified error enum.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`Capability`] — A named category of work mapped to one agent type.
//! - [`Task`] — A unit of delegated work with its lifecycle state.
//! - [`TaskStatus`] — Monotonic task lifecycle (`pending` through terminal).
//! - [`TaskInput`] / [`TaskOutput`] — Opaque structured delegation payloads.

/// Task, capability, and payload types.
pub mod task;

pub use task::{Capability, Task, TaskInput, TaskOutput, TaskStatus};

// --- Error types ---

/// Top-level error type for the Ensemble system.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// An error from the task registry (invalid transition, unknown task).
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// An error raised inside an agent endpoint or capability handler.
    #[error("Agent error: {0}")]
    Agent(String),

    /// A failure to reach or use a remote agent endpoint.
    #[error("Delegation error: {0}")]
    Delegation(String),

    /// An error from the coordinator (e.g. an unplannable request).
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Errors produced by task registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The requested status change does not follow the allowed lifecycle
    /// order, or attaches output/error to the wrong status.
    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// The task whose transition was rejected.
        task_id: uuid::Uuid,
        /// The task's current status.
        from: TaskStatus,
        /// The rejected target status.
        to: TaskStatus,
    },

    /// No task with the given ID exists in this registry.
    #[error("task not found: {0}")]
    NotFound(uuid::Uuid),
}
