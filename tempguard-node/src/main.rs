use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use tempguard_core::BackpressurePolicy;
use tempguard_node::{Node, NodeConfig};

/// Temperature anomaly reporting node.
#[derive(Parser)]
#[command(name = "tempguard-node", about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the listen address.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the collector endpoint (host:port).
    #[arg(long)]
    collector: Option<String>,

    /// Override the node id.
    #[arg(long)]
    node_id: Option<String>,

    /// Override the lower bound of the normal range.
    #[arg(long, allow_negative_numbers = true)]
    low: Option<i32>,

    /// Override the upper bound of the normal range.
    #[arg(long, allow_negative_numbers = true)]
    high: Option<i32>,

    /// Drop reports instead of waiting when the channel is full.
    #[arg(long)]
    reject_when_full: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
    /// Validate the configuration and exit.
    Check,
}

impl Cli {
    fn node_config(&self) -> Result<NodeConfig> {
        let mut cfg = match &self.config {
            Some(path) => NodeConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(listen) = self.listen {
            cfg.listen = listen.to_string();
        }
        if let Some(collector) = &self.collector {
            cfg.collector = collector.clone();
        }
        if let Some(node_id) = &self.node_id {
            cfg.node_id = node_id.clone();
        }
        if let Some(low) = self.low {
            cfg.low = low;
        }
        if let Some(high) = self.high {
            cfg.high = high;
        }
        if self.reject_when_full {
            cfg.backpressure = BackpressurePolicy::Reject;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("tempguard-node {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_target(true).init();

    let cfg = cli.node_config()?;
    cfg.validate().context("invalid configuration")?;

    if let Some(Command::Check) = &cli.command {
        cfg.log_warnings();
        println!("configuration ok");
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        core = tempguard_core::VERSION,
        "starting tempguard-node",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(run(cfg))
}

async fn run(cfg: NodeConfig) -> Result<()> {
    let node = Node::bind(&cfg).await?;
    let stats = node.run_until(shutdown_signal()).await?;

    tracing::info!(
        reports_sent = stats.reports_sent,
        lost = stats.lost_reports(),
        "tempguard-node stopped",
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot register SIGTERM handler");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
