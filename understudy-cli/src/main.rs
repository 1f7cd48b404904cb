//! ## understudy-cli
//! **Entrypoint for a single understudy node**
//!
//! `serve` answers requests over HTTP until interrupted. `invoke` pushes a
//! single request through the node and prints the resulting tree, failing
//! when the root did not answer 200.

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Commands::Serve(args) => commands::serve(config, args).await,
        Commands::Invoke(args) => commands::invoke(config, args).await,
    }
}
