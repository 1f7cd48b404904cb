use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use understudy_config::NodeConfig;
use understudy_core::context::InboundRequest;
use understudy_core::response::ResponseNode;
use understudy_engine::RequestOrchestrator;
use understudy_telemetry::EventLogger;

#[derive(Parser)]
#[command(name = "understudy", version, about)]
pub struct Cli {
    /// Configuration file. Defaults to config/understudy.yaml when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Seed for every random draw, overriding the configured one
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve requests over HTTP
    Serve(ServeArgs),
    /// Run one request through the node and print the response tree
    Invoke(InvokeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address, overriding the configured one
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,
}

#[derive(Args, Debug, Clone)]
pub struct InvokeArgs {
    /// Path, with optional query string, of the simulated request
    #[arg(short, long, default_value = "/")]
    pub path: String,
}

impl Cli {
    pub fn load_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load_from_path(path)?,
            None => NodeConfig::load()?,
        };

        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

pub async fn serve(mut config: NodeConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    init_logging(&config)?;

    let address = config.server.listen;
    let node = Arc::new(RequestOrchestrator::from_config(config)?);
    let listener = understudy_api::bind(address).await?;

    understudy_api::serve(listener, node, understudy_api::shutdown_signal()).await?;
    Ok(())
}

pub async fn invoke(config: NodeConfig, args: InvokeArgs) -> anyhow::Result<()> {
    init_logging(&config)?;

    let node = RequestOrchestrator::from_config(config)?;
    info!(path = %args.path, "Invoking node");
    let tree = node.handle(InboundRequest::get(&args.path)).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&tree).context("Failed to serialize response tree")?
    );
    expect_ok(&tree)
}

fn init_logging(config: &NodeConfig) -> anyhow::Result<()> {
    EventLogger::init(&config.telemetry)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn expect_ok(tree: &ResponseNode) -> anyhow::Result<()> {
    if tree.code != 200 {
        bail!("expected status 200, got status {}", tree.code);
    }
    Ok(())
}
