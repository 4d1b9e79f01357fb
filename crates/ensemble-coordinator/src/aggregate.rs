use ensemble_core::{Capability, TaskOutput};
use ensemble_delegation::DelegationOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest failure reason quoted back to the end consumer.
const MAX_REASON_LEN: usize = 200;

/// One formatted per-capability section of the merged response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// The contributing capability.
    pub capability: Capability,
    /// Whether that capability's subtask completed.
    pub success: bool,
    /// Rendered section content, or the failure summary.
    pub content: String,
}

/// The merged response for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// True iff at least one subtask completed.
    pub success: bool,
    /// The request/conversation this result answers.
    pub context_id: Uuid,
    /// The full rendered response text. Never empty.
    pub response: String,
    /// Per-capability sections in plan order.
    pub sections: Vec<Section>,
}

/// Merges delegation outcomes into one response.
///
/// Successful sections render in the given (plan) order. Failures collapse
/// into a single consolidated block naming each failed capability with a
/// truncated reason. When nothing succeeded the result carries
/// `success = false` and a non-empty explanation, never a blank body.
/// Output depends only on the ordered input list.
pub fn aggregate(
    context_id: Uuid,
    results: &[(Capability, DelegationOutcome)],
) -> AggregatedResult {
    let mut sections = Vec::with_capacity(results.len());
    let mut failures: Vec<(Capability, String)> = Vec::new();

    for (capability, outcome) in results {
        match outcome {
            DelegationOutcome::Completed(output) => {
                sections.push(Section {
                    capability: *capability,
                    success: true,
                    content: format_section(*capability, output),
                });
            }
            DelegationOutcome::Failed(reason) => {
                failures.push((*capability, truncate_reason(reason)));
            }
            DelegationOutcome::TimedOut => {
                failures.push((*capability, "exceeded time budget".to_string()));
            }
        }
    }

    let success = !sections.is_empty();
    let response = if success {
        let mut parts: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
        if !failures.is_empty() {
            parts.push(failure_block(&failures));
        }
        parts.join("\n\n")
    } else {
        all_failed_message(&failures)
    };

    for (capability, reason) in &failures {
        sections.push(Section {
            capability: *capability,
            success: false,
            content: reason.clone(),
        });
    }

    AggregatedResult {
        success,
        context_id,
        response,
        sections,
    }
}

fn format_section(capability: Capability, output: &TaskOutput) -> String {
    match capability {
        Capability::Research => format_research(output),
        Capability::Code => format_code(output),
        Capability::Analytics => format_analytics(output),
    }
}

fn format_research(output: &TaskOutput) -> String {
    let mut parts = vec!["## Research Findings".to_string()];
    if let Some(findings) = output.str_field("findings") {
        parts.push(findings.to_string());
    }
    if let Some(sources) = output.field("sources").and_then(|v| v.as_array()) {
        if !sources.is_empty() {
            let mut block = String::from("**Sources:**");
            for source in sources.iter().take(5).filter_map(|s| s.as_str()) {
                block.push_str(&format!("\n- {source}"));
            }
            parts.push(block);
        }
    }
    if let Some(confidence) = output.str_field("confidence") {
        parts.push(format!("*Confidence level: {confidence}*"));
    }
    finish_section(parts, output)
}

fn format_code(output: &TaskOutput) -> String {
    let mut parts = vec!["## Code Solution".to_string()];
    if let Some(explanation) = output.str_field("explanation") {
        parts.push(explanation.to_string());
    }
    if let Some(code) = output.str_field("code") {
        let language = output.str_field("language").unwrap_or("text");
        parts.push(format!("```{language}\n{code}\n```"));
    }
    finish_section(parts, output)
}

fn format_analytics(output: &TaskOutput) -> String {
    let mut parts = vec!["## Data Analysis".to_string()];
    if let Some(analysis) = output.str_field("analysis") {
        parts.push(analysis.to_string());
    }
    if let Some(metrics) = output.field("metrics").and_then(|v| v.as_object()) {
        if !metrics.is_empty() {
            let mut block = String::from("**Key Metrics:**");
            for (key, value) in metrics {
                block.push_str(&format!("\n- {key}: {value}"));
            }
            parts.push(block);
        }
    }
    if let Some(insights) = output.field("insights").and_then(|v| v.as_array()) {
        if !insights.is_empty() {
            let mut block = String::from("**Insights:**");
            for insight in insights.iter().filter_map(|i| i.as_str()) {
                block.push_str(&format!("\n- {insight}"));
            }
            parts.push(block);
        }
    }
    finish_section(parts, output)
}

/// A payload with none of the capability's well-known fields still renders:
/// fall back to a generic `output`/`response` field, or the raw payload.
fn finish_section(mut parts: Vec<String>, output: &TaskOutput) -> String {
    if parts.len() == 1 {
        let fallback = output
            .str_field("output")
            .or_else(|| output.str_field("response"))
            .map_or_else(|| output.0.to_string(), ToString::to_string);
        parts.push(fallback);
    }
    parts.join("\n\n")
}

fn failure_block(failures: &[(Capability, String)]) -> String {
    let mut block = String::from("---\n*Some capabilities could not contribute:*");
    for (capability, reason) in failures {
        block.push_str(&format!("\n- {capability}: {reason}"));
    }
    block
}

fn all_failed_message(failures: &[(Capability, String)]) -> String {
    let mut message = String::from("I encountered issues while processing your request:\n");
    if failures.is_empty() {
        message.push_str("\n- unable to process the request due to an internal issue");
    }
    for (capability, reason) in failures {
        message.push_str(&format!("\n- {capability}: {reason}"));
    }
    message.push_str("\n\nPlease try again or rephrase your request.");
    message
}

fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_REASON_LEN {
        reason.to_string()
    } else {
        let truncated: String = reason.chars().take(MAX_REASON_LEN).collect();
        format!("{truncated}...")
    }
}
