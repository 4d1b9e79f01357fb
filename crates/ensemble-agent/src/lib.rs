//! Agent endpoint service: the receiving side run by each capability agent.
//!
//! An agent process accepts tasks over HTTP, executes them through an opaque
//! [`CapabilityHandler`], and keeps the task registry's bookkeeping correct
//! around that execution: a task accepted by this endpoint always reaches a
//! terminal state, even when the handler fails or panics.
//!
//! # Main types
//!
//! - [`CapabilityHandler`] — The provider seam actually producing content.
//! - [`AgentServer`] — Builds the axum router for one agent process.
//! - [`AgentState`] — Injected state: registry, handler, capability, limits.

/// The capability provider seam.
pub mod handler;
/// Built-in deterministic providers for each capability.
pub mod providers;
/// The axum endpoint: task submission, status retrieval, health.
pub mod server;

pub use handler::CapabilityHandler;
pub use providers::{default_provider, AnalyticsProvider, CodeProvider, ResearchProvider};
pub use server::{AgentServer, AgentState};
