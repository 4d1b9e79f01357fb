use crate::handler::CapabilityHandler;
use async_trait::async_trait;
use ensemble_core::{Capability, EnsembleResult, TaskInput, TaskOutput};
use std::sync::Arc;

/// Provider for the research capability.
///
/// Produces the research payload shape (`findings`, `sources`,
/// `confidence`) without consulting any external search back-end; the real
/// retrieval stack plugs in behind [`CapabilityHandler`].
pub struct ResearchProvider;

#[async_trait]
impl CapabilityHandler for ResearchProvider {
    async fn execute(&self, input: TaskInput) -> EnsembleResult<TaskOutput> {
        let findings = format!(
            "# Research Results for: {}\n\n## Summary\nCollected the most relevant \
             material for this query and cross-referenced the overlapping claims.",
            input.message
        );
        Ok(TaskOutput::new(serde_json::json!({
            "findings": findings,
            "sources": ["https://docs.example.org/overview", "https://registry.example.org/latest"],
            "confidence": "medium",
        })))
    }
}

/// Provider for the code capability.
///
/// Produces the code payload shape (`code`, `explanation`, `language`).
pub struct CodeProvider;

#[async_trait]
impl CapabilityHandler for CodeProvider {
    async fn execute(&self, input: TaskInput) -> EnsembleResult<TaskOutput> {
        Ok(TaskOutput::new(serde_json::json!({
            "code": "fn solve(input: &str) -> String {\n    input.trim().to_string()\n}",
            "explanation": format!("A starting-point implementation for: {}", input.message),
            "language": "rust",
        })))
    }
}

/// Provider for the analytics capability.
///
/// Produces the analytics payload shape (`analysis`, `metrics`, `insights`).
pub struct AnalyticsProvider;

#[async_trait]
impl CapabilityHandler for AnalyticsProvider {
    async fn execute(&self, input: TaskInput) -> EnsembleResult<TaskOutput> {
        Ok(TaskOutput::new(serde_json::json!({
            "analysis": format!("Trend analysis for: {}", input.message),
            "metrics": { "samples": 0, "coverage": "partial" },
            "insights": ["insufficient data for a strong conclusion"],
        })))
    }
}

/// The built-in provider for a capability.
pub fn default_provider(capability: Capability) -> Arc<dyn CapabilityHandler> {
    match capability {
        Capability::Research => Arc::new(ResearchProvider),
        Capability::Code => Arc::new(CodeProvider),
        Capability::Analytics => Arc::new(AnalyticsProvider),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_research_provider_payload_shape() {
        let output = ResearchProvider
            .execute(TaskInput::new("quantum computing advances"))
            .await
            .unwrap();
        assert!(output.str_field("findings").unwrap().contains("quantum computing advances"));
        assert!(output.field("sources").unwrap().is_array());
        assert_eq!(output.str_field("confidence"), Some("medium"));
    }

    #[tokio::test]
    async fn test_code_provider_payload_shape() {
        let output = CodeProvider
            .execute(TaskInput::new("a fibonacci function"))
            .await
            .unwrap();
        assert!(output.str_field("code").is_some());
        assert_eq!(output.str_field("language"), Some("rust"));
        assert!(output.str_field("explanation").unwrap().contains("fibonacci"));
    }

    #[tokio::test]
    async fn test_analytics_provider_payload_shape() {
        let output = AnalyticsProvider
            .execute(TaskInput::new("adoption trends"))
            .await
            .unwrap();
        assert!(output.field("metrics").unwrap().is_object());
        assert!(output.field("insights").unwrap().is_array());
    }

    #[tokio::test]
    async fn test_default_provider_covers_all_capabilities() {
        for cap in Capability::ALL {
            let provider = default_provider(cap);
            let output = provider.execute(TaskInput::new("anything")).await;
            assert!(output.is_ok());
        }
    }
}
