//! Task lifecycle registry shared by every Ensemble service process.
//!
//! Each agent process owns exactly one [`TaskRegistry`] instance, threaded
//! into its endpoint and execution callbacks by reference. The registry
//! stores task records in a sharded concurrent map so unrelated tasks never
//! serialize on one global lock, enforces the monotonic status lifecycle,
//! and wakes waiters exactly once when a task reaches a terminal state.
//!
//! # Main types
//!
//! - [`TaskRegistry`] — The sharded task store.
//! - [`TransitionOutcome`] — Output or error payload accompanying a status change.

/// The sharded task store and its operations.
pub mod registry;

pub use registry::{TaskRegistry, TransitionOutcome};
