use ensemble_core::{Capability, EnsembleError, EnsembleResult};
use std::collections::HashMap;

/// Static mapping from capability to the base URL of the agent serving it.
///
/// Discovery-based resolution can replace this behind the same interface;
/// the delegation client only ever calls [`AgentDirectory::resolve`].
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    endpoints: HashMap<Capability, String>,
}

impl AgentDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the endpoint serving a capability, replacing any previous
    /// entry. Trailing slashes are stripped so URL joining stays uniform.
    pub fn with_endpoint(mut self, capability: Capability, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.endpoints
            .insert(capability, base_url.trim_end_matches('/').to_string());
        self
    }

    /// Resolves the base URL for a capability.
    pub fn resolve(&self, capability: Capability) -> EnsembleResult<&str> {
        self.endpoints
            .get(&capability)
            .map(String::as_str)
            .ok_or_else(|| {
                EnsembleError::Delegation(format!("no endpoint registered for capability: {capability}"))
            })
    }

    /// The capabilities this directory can route to.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self.endpoints.keys().copied().collect();
        caps.sort_by_key(|c| c.to_string());
        caps
    }
}
