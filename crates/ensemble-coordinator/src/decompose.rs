use ensemble_core::{Capability, EnsembleError, EnsembleResult, TaskInput};
use std::collections::HashMap;

/// One row of the routing table: the trigger phrases that pull a capability
/// into the plan, and the prefix framing its subtask message.
pub struct RoutingRule {
    /// The capability this rule routes to.
    pub capability: Capability,
    /// Case-insensitive phrases that activate the rule.
    pub triggers: &'static [&'static str],
    /// Prefix applied to the subtask message sent to the agent.
    pub prompt_prefix: &'static str,
}

/// The routing table. Rules are evaluated independently, so several may
/// match one request, and table order fixes the plan (and therefore section)
/// order.
pub const ROUTING_RULES: &[RoutingRule] = &[
    RoutingRule {
        capability: Capability::Research,
        triggers: &["research", "find", "search", "look up", "explore", "investigate"],
        prompt_prefix: "Research information about",
    },
    RoutingRule {
        capability: Capability::Code,
        triggers: &["code", "implement", "function", "debug", "program", "script"],
        prompt_prefix: "Generate code for",
    },
    RoutingRule {
        capability: Capability::Analytics,
        triggers: &["analyze", "data", "metrics", "statistics", "trends", "visualize"],
        prompt_prefix: "Analyze data for",
    },
];

/// One planned subtask.
#[derive(Debug, Clone)]
pub struct Subtask {
    /// Which agent type should execute it.
    pub capability: Capability,
    /// The input sent to that agent.
    pub input: TaskInput,
}

/// The subtasks derived from one external request, in dispatch order.
/// Purely transient; never persisted.
#[derive(Debug, Clone)]
pub struct DecompositionPlan {
    /// Planned subtasks, ordered by routing-table position.
    pub subtasks: Vec<Subtask>,
}

impl DecompositionPlan {
    /// The capabilities in this plan, in plan order.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.subtasks.iter().map(|s| s.capability).collect()
    }
}

/// Maps request text to a plan by evaluating every routing rule.
///
/// Pure: same message and metadata always produce the same plan. A request
/// matching no rule falls back to a single research subtask, so every
/// non-empty request yields at least one subtask. An empty message is the
/// one unplannable input and surfaces as a coordinator error.
pub fn decompose(
    message: &str,
    metadata: &HashMap<String, serde_json::Value>,
) -> EnsembleResult<DecompositionPlan> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(EnsembleError::Coordinator(
            "cannot plan an empty request".to_string(),
        ));
    }

    let lowered = trimmed.to_lowercase();
    let mut subtasks: Vec<Subtask> = ROUTING_RULES
        .iter()
        .filter(|rule| rule.triggers.iter().any(|t| lowered.contains(t)))
        .map(|rule| subtask_for(rule, trimmed, metadata))
        .collect();

    if subtasks.is_empty() {
        // Default to research rather than failing the request.
        let research = &ROUTING_RULES[0];
        debug_assert_eq!(research.capability, Capability::Research);
        subtasks.push(subtask_for(research, trimmed, metadata));
    }

    Ok(DecompositionPlan { subtasks })
}

fn subtask_for(
    rule: &RoutingRule,
    message: &str,
    metadata: &HashMap<String, serde_json::Value>,
) -> Subtask {
    Subtask {
        capability: rule.capability,
        input: TaskInput {
            message: format!("{}: {}", rule.prompt_prefix, message),
            metadata: metadata.clone(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn plan(message: &str) -> DecompositionPlan {
        decompose(message, &HashMap::new()).unwrap()
    }

    #[test]
    fn test_research_keywords_route_to_research() {
        let plan = plan("find the latest library for parsing yaml");
        assert_eq!(plan.capabilities(), vec![Capability::Research]);
        assert!(plan.subtasks[0]
            .input
            .message
            .starts_with("Research information about:"));
    }

    #[test]
    fn test_code_keywords_route_to_code() {
        let plan = plan("implement a retry wrapper");
        assert_eq!(plan.capabilities(), vec![Capability::Code]);
    }

    #[test]
    fn test_analytics_keywords_route_to_analytics() {
        let plan = plan("show me adoption metrics over five years");
        assert_eq!(plan.capabilities(), vec![Capability::Analytics]);
    }

    #[test]
    fn test_multiple_matches_yield_multiple_subtasks_in_table_order() {
        let plan = plan("research sorting algorithms and implement quicksort");
        assert_eq!(
            plan.capabilities(),
            vec![Capability::Research, Capability::Code]
        );
    }

    #[test]
    fn test_no_match_falls_back_to_research() {
        let plan = plan("hello there");
        assert_eq!(plan.capabilities(), vec![Capability::Research]);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let plan = plan("RESEARCH this topic");
        assert_eq!(plan.capabilities(), vec![Capability::Research]);
    }

    #[test]
    fn test_empty_request_is_rejected() {
        assert!(decompose("", &HashMap::new()).is_err());
        assert!(decompose("   \t\n", &HashMap::new()).is_err());
    }

    #[test]
    fn test_decompose_is_deterministic() {
        let message = "analyze the data and implement a report generator";
        let a = plan(message);
        let b = plan(message);
        assert_eq!(a.capabilities(), b.capabilities());
        for (x, y) in a.subtasks.iter().zip(b.subtasks.iter()) {
            assert_eq!(x.input.message, y.input.message);
        }
    }

    #[test]
    fn test_metadata_propagates_to_every_subtask() {
        let mut metadata = HashMap::new();
        metadata.insert("user".to_string(), serde_json::json!("tester"));
        let plan = decompose("research and code a parser", &metadata).unwrap();
        assert_eq!(plan.subtasks.len(), 2);
        for subtask in &plan.subtasks {
            assert_eq!(subtask.input.metadata["user"], "tester");
        }
    }
}
