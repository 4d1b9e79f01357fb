use async_trait::async_trait;
use ensemble_core::{EnsembleResult, TaskInput, TaskOutput};

/// The opaque provider boundary an agent endpoint executes tasks through.
///
/// Implementations do the actual work (model calls, tool invocations,
/// lookups) and return a structured payload. The endpoint owns all registry
/// bookkeeping around the call; a handler only ever sees the input and
/// produces an output or an error.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Executes one task and returns its output payload.
    async fn execute(&self, input: TaskInput) -> EnsembleResult<TaskOutput>;
}
