use crate::aggregate::{aggregate, AggregatedResult};
use crate::decompose::decompose;
use ensemble_core::{Capability, EnsembleResult};
use ensemble_delegation::{DelegationClient, DelegationOutcome};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Timeout configuration for dispatched subtasks.
///
/// Each capability draws its own budget, independent of its siblings (not a
/// shared pool), with a configurable default for capabilities that have no
/// explicit entry.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Budget applied when a capability has no explicit entry.
    pub default_timeout: Duration,
    /// Per-capability overrides.
    pub capability_timeouts: HashMap<Capability, Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            capability_timeouts: HashMap::new(),
        }
    }
}

impl CoordinatorConfig {
    /// The timeout budget for one capability.
    pub fn timeout_for(&self, capability: Capability) -> Duration {
        self.capability_timeouts
            .get(&capability)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Sets an explicit budget for a capability.
    pub fn with_timeout(mut self, capability: Capability, timeout: Duration) -> Self {
        self.capability_timeouts.insert(capability, timeout);
        self
    }
}

/// The coordinating engine for one deployment: decomposes requests,
/// fans subtasks out concurrently, waits for all of them, and aggregates.
pub struct Coordinator {
    client: Arc<DelegationClient>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Creates a coordinator over a delegation client.
    pub fn new(client: Arc<DelegationClient>, config: CoordinatorConfig) -> Self {
        Self { client, config }
    }

    /// Handles one external request end to end.
    ///
    /// Every subtask is dispatched concurrently with its own budget, and the
    /// coordinator waits for all of them to resolve, so total wall-clock time
    /// is bounded by the largest single budget, not their sum. Subtask
    /// failures and timeouts flow into the aggregated response; the only
    /// error this method returns is a request that cannot be planned.
    pub async fn handle_request(
        &self,
        message: &str,
        context_id: Option<Uuid>,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> EnsembleResult<AggregatedResult> {
        let context_id = context_id.unwrap_or_else(Uuid::new_v4);
        let start = Instant::now();

        let plan = decompose(message, metadata)?;
        info!(
            context_id = %context_id,
            subtasks = plan.subtasks.len(),
            capabilities = ?plan.capabilities(),
            "Request decomposed"
        );

        let dispatches = plan.subtasks.iter().map(|subtask| {
            let capability = subtask.capability;
            let input = subtask.input.clone();
            let timeout = self.config.timeout_for(capability);
            let client = Arc::clone(&self.client);
            async move {
                let outcome = client.delegate(capability, input, context_id, timeout).await;
                (capability, outcome)
            }
        });

        // Wait-for-all join: siblings keep running when one resolves early.
        let results: Vec<(Capability, DelegationOutcome)> = join_all(dispatches).await;

        let failed = results.iter().filter(|(_, o)| !o.is_completed()).count();
        if failed > 0 {
            warn!(
                context_id = %context_id,
                failed,
                total = results.len(),
                "Some subtasks did not complete"
            );
        }

        let result = aggregate(context_id, &results);
        info!(
            context_id = %context_id,
            success = result.success,
            duration_ms = start.elapsed().as_millis() as u64,
            "Request aggregated"
        );
        Ok(result)
    }
}
