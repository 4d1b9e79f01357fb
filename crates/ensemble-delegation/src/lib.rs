//! Delegation client: submits work to remote agent endpoints and awaits the
//! result under a strict time budget.
//!
//! The coordinator uses this crate for every fan-out round trip. A
//! delegation never blocks past its caller-supplied timeout: every HTTP
//! request carries an explicit network-level timeout bounded by the
//! remaining budget, so a hung connection or a stalled endpoint degrades
//! into a [`DelegationOutcome::TimedOut`] rather than a stuck coordinator.
//!
//! # Main types
//!
//! - [`DelegationClient`] — Submit-then-await round trips to one agent.
//! - [`DelegationOutcome`] — `Completed`, `Failed`, or `TimedOut`.
//! - [`AgentDirectory`] — Static capability → base URL resolution.

/// The delegation round-trip client.
pub mod client;
/// Capability to endpoint address resolution.
pub mod directory;

pub use client::{DelegationClient, DelegationOutcome};
pub use directory::AgentDirectory;
