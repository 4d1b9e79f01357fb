#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use ensemble_agent::{AgentServer, AgentState, CapabilityHandler};
use ensemble_coordinator::{Coordinator, CoordinatorConfig, CoordinatorServer};
use ensemble_core::{Capability, EnsembleError, EnsembleResult, TaskInput, TaskOutput};
use ensemble_delegation::{AgentDirectory, DelegationClient};
use ensemble_registry::TaskRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Handler returning a canned payload after an optional delay.
struct ScriptedHandler {
    delay: Duration,
    payload: serde_json::Value,
}

#[async_trait]
impl CapabilityHandler for ScriptedHandler {
    async fn execute(&self, _input: TaskInput) -> EnsembleResult<TaskOutput> {
        tokio::time::sleep(self.delay).await;
        Ok(TaskOutput::new(self.payload.clone()))
    }
}

/// Handler failing with a fixed error after an optional delay.
struct ScriptedFailure {
    delay: Duration,
    error: &'static str,
}

#[async_trait]
impl CapabilityHandler for ScriptedFailure {
    async fn execute(&self, _input: TaskInput) -> EnsembleResult<TaskOutput> {
        tokio::time::sleep(self.delay).await;
        Err(EnsembleError::Agent(self.error.to_string()))
    }
}

async fn start_agent(capability: Capability, handler: Arc<dyn CapabilityHandler>) -> String {
    let registry = Arc::new(TaskRegistry::new());
    let state = Arc::new(AgentState::new(registry, handler, capability));
    let app = AgentServer::build(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", addr.port())
}

fn research_payload() -> serde_json::Value {
    serde_json::json!({
        "findings": "Summary of the most relevant sources.",
        "sources": ["https://one.example", "https://two.example"],
        "confidence": "high",
    })
}

fn code_payload() -> serde_json::Value {
    serde_json::json!({
        "code": "fn fib(n: u64) -> u64 { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } }",
        "explanation": "A direct recursive implementation.",
        "language": "rust",
    })
}

fn coordinator_with(directory: AgentDirectory, config: CoordinatorConfig) -> Coordinator {
    Coordinator::new(Arc::new(DelegationClient::new(directory)), config)
}

#[tokio::test]
async fn test_mixed_request_merges_success_and_failure() {
    // Research answers quickly; code fails with a syntax error.
    let research = start_agent(
        Capability::Research,
        Arc::new(ScriptedHandler {
            delay: Duration::from_millis(50),
            payload: research_payload(),
        }),
    )
    .await;
    let code = start_agent(
        Capability::Code,
        Arc::new(ScriptedFailure {
            delay: Duration::from_millis(20),
            error: "syntax error near line 3",
        }),
    )
    .await;

    let coordinator = coordinator_with(
        AgentDirectory::new()
            .with_endpoint(Capability::Research, research)
            .with_endpoint(Capability::Code, code),
        CoordinatorConfig::default(),
    );

    let result = coordinator
        .handle_request(
            "research sorting networks and implement a comparator",
            None,
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert!(result.success);
    let successes: Vec<_> = result.sections.iter().filter(|s| s.success).collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].capability, Capability::Research);
    assert!(result.response.contains("Research Findings"));
    assert!(result.response.contains("- code: "));
    assert!(result.response.contains("syntax error"));
}

#[tokio::test]
async fn test_research_timeout_yields_overall_failure() {
    // The lone research subtask outlives its budget.
    let research = start_agent(
        Capability::Research,
        Arc::new(ScriptedHandler {
            delay: Duration::from_secs(30),
            payload: research_payload(),
        }),
    )
    .await;

    let coordinator = coordinator_with(
        AgentDirectory::new().with_endpoint(Capability::Research, research),
        CoordinatorConfig::default().with_timeout(Capability::Research, Duration::from_millis(400)),
    );

    let result = coordinator
        .handle_request("find the latest library for yaml parsing", None, &HashMap::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.sections.iter().all(|s| !s.success));
    assert!(result.response.contains("research"));
    assert!(result.response.contains("exceeded time budget"));
}

#[tokio::test]
async fn test_fanout_wall_clock_is_max_not_sum() {
    let delay = Duration::from_millis(300);
    let research = start_agent(
        Capability::Research,
        Arc::new(ScriptedHandler {
            delay,
            payload: research_payload(),
        }),
    )
    .await;
    let code = start_agent(
        Capability::Code,
        Arc::new(ScriptedHandler {
            delay,
            payload: code_payload(),
        }),
    )
    .await;

    let coordinator = coordinator_with(
        AgentDirectory::new()
            .with_endpoint(Capability::Research, research)
            .with_endpoint(Capability::Code, code),
        CoordinatorConfig::default(),
    );

    let start = Instant::now();
    let result = coordinator
        .handle_request("research parsers and implement one", None, &HashMap::new())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(result.success);
    assert_eq!(result.sections.iter().filter(|s| s.success).count(), 2);
    // Concurrent dispatch: both 300 ms tasks overlap, so the total stays
    // well under their 600 ms sum.
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "fan-out took {elapsed:?}, expected < {:?}", delay * 2);
}

#[tokio::test]
async fn test_sibling_survives_a_failed_subtask() {
    let research = start_agent(
        Capability::Research,
        Arc::new(ScriptedHandler {
            delay: Duration::from_millis(200),
            payload: research_payload(),
        }),
    )
    .await;
    // Code agent not running at all: delegation fails at submit.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = listener.local_addr().unwrap().port();
    drop(listener);

    let coordinator = coordinator_with(
        AgentDirectory::new()
            .with_endpoint(Capability::Research, research)
            .with_endpoint(Capability::Code, format!("http://127.0.0.1:{dead_port}")),
        CoordinatorConfig::default(),
    );

    let result = coordinator
        .handle_request("research regexes and implement a matcher", None, &HashMap::new())
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.response.contains("Research Findings"));
    assert!(result.response.contains("- code: delegation error"));
}

#[tokio::test]
async fn test_all_agents_unreachable_is_contained() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = listener.local_addr().unwrap().port();
    drop(listener);
    let dead = format!("http://127.0.0.1:{dead_port}");

    let coordinator = coordinator_with(
        AgentDirectory::new()
            .with_endpoint(Capability::Research, dead.clone())
            .with_endpoint(Capability::Code, dead),
        CoordinatorConfig::default(),
    );

    // Contained: a response object, not an error.
    let result = coordinator
        .handle_request("research compilers and implement a lexer", None, &HashMap::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(!result.response.trim().is_empty());
    assert!(result.response.contains("research"));
    assert!(result.response.contains("code"));
}

#[tokio::test]
async fn test_context_id_round_trips() {
    let research = start_agent(
        Capability::Research,
        Arc::new(ScriptedHandler {
            delay: Duration::from_millis(10),
            payload: research_payload(),
        }),
    )
    .await;

    let coordinator = coordinator_with(
        AgentDirectory::new().with_endpoint(Capability::Research, research),
        CoordinatorConfig::default(),
    );

    let ctx = uuid::Uuid::new_v4();
    let result = coordinator
        .handle_request("find something", Some(ctx), &HashMap::new())
        .await
        .unwrap();
    assert_eq!(result.context_id, ctx);
}

#[tokio::test]
async fn test_http_boundary_end_to_end() {
    let research = start_agent(
        Capability::Research,
        Arc::new(ScriptedHandler {
            delay: Duration::from_millis(20),
            payload: research_payload(),
        }),
    )
    .await;

    let coordinator = Arc::new(coordinator_with(
        AgentDirectory::new().with_endpoint(Capability::Research, research),
        CoordinatorConfig::default(),
    ));
    let app = CoordinatorServer::build(coordinator);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base = format!("http://127.0.0.1:{}", addr.port());

    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let resp = client
        .post(format!("{base}/requests"))
        .json(&serde_json::json!({"message": "find rust web frameworks"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["response"].as_str().unwrap().contains("Research Findings"));

    // An empty message is the coordinator's one hard failure: HTTP 400.
    let resp = client
        .post(format!("{base}/requests"))
        .json(&serde_json::json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
