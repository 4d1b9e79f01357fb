//! The `ensemble` binary: runs a capability agent endpoint or the
//! coordinator, configured from a TOML file with command-line overrides.

use clap::{Parser, Subcommand};
use ensemble_agent::{default_provider, AgentServer, AgentState};
use ensemble_coordinator::{Coordinator, CoordinatorConfig, CoordinatorServer};
use ensemble_core::Capability;
use ensemble_delegation::{AgentDirectory, DelegationClient};
use ensemble_registry::TaskRegistry;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensemble", about = "Ensemble — distributed capability-agent orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ensemble.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a capability agent endpoint
    Agent {
        /// Capability to serve (overrides config)
        #[arg(long)]
        capability: Option<Capability>,
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the coordinator
    Coordinator {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Deserialize, Default)]
struct EnsembleConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    agent: AgentConfig,
    #[serde(default)]
    coordinator: CoordinatorFileConfig,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize)]
struct AgentConfig {
    #[serde(default = "default_capability")]
    capability: String,
    #[serde(default = "default_max_wait_secs")]
    max_wait_secs: u64,
    #[serde(default = "default_task_ttl_secs")]
    task_ttl_secs: u64,
    #[serde(default = "default_eviction_interval_secs")]
    eviction_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            capability: default_capability(),
            max_wait_secs: default_max_wait_secs(),
            task_ttl_secs: default_task_ttl_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

#[derive(Deserialize)]
struct CoordinatorFileConfig {
    #[serde(default = "default_subtask_timeout_secs")]
    default_timeout_secs: u64,
    /// Per-capability timeout overrides, in seconds.
    #[serde(default)]
    capability_timeouts: HashMap<String, u64>,
    /// Capability name to agent base URL.
    #[serde(default)]
    agents: HashMap<String, String>,
}

impl Default for CoordinatorFileConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_subtask_timeout_secs(),
            capability_timeouts: HashMap::new(),
            agents: HashMap::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_capability() -> String {
    "research".to_string()
}
fn default_max_wait_secs() -> u64 {
    120
}
fn default_task_ttl_secs() -> u64 {
    900
}
fn default_eviction_interval_secs() -> u64 {
    60
}
fn default_subtask_timeout_secs() -> u64 {
    60
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config: EnsembleConfig = if cli.config.exists() {
        let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {e}", cli.config.display())
        })?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", cli.config.display()))?
    } else {
        info!(config = %cli.config.display(), "Config file not found, using defaults");
        EnsembleConfig::default()
    };

    match cli.command {
        Commands::Agent {
            capability,
            host,
            port,
        } => {
            let capability = match capability {
                Some(capability) => capability,
                None => config
                    .agent
                    .capability
                    .parse::<Capability>()
                    .map_err(|e| anyhow::anyhow!("Invalid agent.capability in config: {e}"))?,
            };
            serve_agent(&config, capability, host, port).await
        }
        Commands::Coordinator { host, port } => serve_coordinator(&config, host, port).await,
    }
}

async fn serve_agent(
    config: &EnsembleConfig,
    capability: Capability,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let registry = Arc::new(TaskRegistry::new());
    let _sweeper = Arc::clone(&registry).spawn_eviction_sweeper(
        Duration::from_secs(config.agent.eviction_interval_secs),
        Duration::from_secs(config.agent.task_ttl_secs),
    );

    let mut state = AgentState::new(
        Arc::clone(&registry),
        default_provider(capability),
        capability,
    );
    state.max_wait = Duration::from_secs(config.agent.max_wait_secs);

    let app = AgentServer::build(Arc::new(state));
    let addr = bind_addr(&config.server, host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(addr = %addr, capability = %capability, "Agent endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_coordinator(
    config: &EnsembleConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut directory = AgentDirectory::new();
    for (name, url) in &config.coordinator.agents {
        let capability = name
            .parse::<Capability>()
            .map_err(|e| anyhow::anyhow!("Invalid capability in coordinator.agents: {e}"))?;
        directory = directory.with_endpoint(capability, url.clone());
    }

    let mut coordinator_config = CoordinatorConfig {
        default_timeout: Duration::from_secs(config.coordinator.default_timeout_secs),
        ..Default::default()
    };
    for (name, secs) in &config.coordinator.capability_timeouts {
        let capability = name
            .parse::<Capability>()
            .map_err(|e| anyhow::anyhow!("Invalid capability in coordinator.capability_timeouts: {e}"))?;
        coordinator_config = coordinator_config.with_timeout(capability, Duration::from_secs(*secs));
    }

    let client = Arc::new(DelegationClient::new(directory));
    let coordinator = Arc::new(Coordinator::new(client, coordinator_config));

    let app = CoordinatorServer::build(coordinator);
    let addr = bind_addr(&config.server, host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(addr = %addr, "Coordinator listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn bind_addr(server: &ServerConfig, host: Option<String>, port: Option<u16>) -> String {
    let host = host.unwrap_or_else(|| server.host.clone());
    let port = port.unwrap_or(server.port);
    format!("{host}:{port}")
}
