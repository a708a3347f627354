//! Rudder - a minimal container orchestration control plane
//!
//! This is the CLI entry point. Each role runs as its own long-lived
//! process: the API server, the scheduler and one agent per node.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rudder::agent::NodeAgent;
use rudder::client::HttpClient;
use rudder::config::{
    local_hostname, AgentConfig, ApiServerConfig, SchedulerConfig, DEFAULT_APISERVER_URL,
    DEFAULT_LISTEN_ADDR, DEFAULT_SUBNET,
};
use rudder::daemon::ApiServer;
use rudder::network::BridgeNetwork;
use rudder::runtime::InMemoryRuntime;
use rudder::scheduler::Scheduler;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Rudder - minimal container orchestration
#[derive(Parser)]
#[command(name = "rudder")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "A minimal container orchestration control plane", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the object store over HTTP
    Apiserver {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: SocketAddr,
        /// Key prefix for stored objects
        #[arg(long, default_value = rudder::api::REGISTRY_PREFIX)]
        registry_prefix: String,
        /// Directory for a durable registry (in-memory when omitted)
        #[arg(long)]
        registry_dir: Option<PathBuf>,
    },

    /// Assign unscheduled pods to nodes
    Scheduler {
        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Converge the containers of pods assigned to this node
    Agent {
        #[command(flatten)]
        loop_args: LoopArgs,
        /// Node name (defaults to the host name)
        #[arg(long)]
        node_name: Option<String>,
        /// Subnet pod addresses are allocated from
        #[arg(long, default_value = DEFAULT_SUBNET)]
        subnet: String,
    },
}

#[derive(Args)]
struct LoopArgs {
    /// API server URL
    #[arg(long, default_value = DEFAULT_APISERVER_URL)]
    apiserver: String,
    /// Milliseconds between ticks
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

fn init_logging(debug: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.json);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    match cli.command {
        Commands::Apiserver {
            listen,
            registry_prefix,
            registry_dir,
        } => {
            let config = ApiServerConfig {
                listen_addr: listen,
                registry_prefix,
                registry_dir,
            };
            let server = ApiServer::new(config).context("Failed to open registry")?;
            server
                .run(cancel)
                .await
                .with_context(|| format!("API server on {} failed", listen))?;
        }

        Commands::Scheduler { loop_args } => {
            let config = SchedulerConfig {
                apiserver: loop_args.apiserver,
                interval: Duration::from_millis(loop_args.interval_ms),
            };
            config.validate()?;

            let client = HttpClient::new(&config.apiserver)?;
            info!(apiserver = %config.apiserver, "Starting scheduler");
            Scheduler::new(Arc::new(client), &config).run(cancel).await;
        }

        Commands::Agent {
            loop_args,
            node_name,
            subnet,
        } => {
            let config = AgentConfig {
                apiserver: loop_args.apiserver,
                node_name: node_name.unwrap_or_else(local_hostname),
                subnet,
                interval: Duration::from_millis(loop_args.interval_ms),
            };
            config.validate()?;

            let client = HttpClient::new(&config.apiserver)?;
            let network = BridgeNetwork::new(&config.subnet)
                .with_context(|| format!("Invalid pod subnet {}", config.subnet))?;

            info!(
                apiserver = %config.apiserver,
                node = %config.node_name,
                subnet = %config.subnet,
                "Starting node agent"
            );
            NodeAgent::new(
                Arc::new(client),
                Arc::new(InMemoryRuntime::new()),
                Arc::new(network),
                &config,
            )
            .run(cancel)
            .await;
        }
    }

    Ok(())
}
