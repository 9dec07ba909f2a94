//! Driver binary: parses CLI flags and an optional config file, builds an
//! in-process Kademlia-style network, and hands control to the
//! interactive shell.

mod cli;
mod config_file;
mod driver;
mod logging;
mod shell;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::Cli;
use config_file::DriverConfig;
use driver::Network;
use shell::Shell;

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = logging::initialize_logging() {
        eprintln!("{e:#}");
        return 1;
    }

    match run_inner(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            1
        }
    }
}

async fn run_inner(cli: Cli) -> Result<i32> {
    let file_config = match &cli.config_file {
        Some(path) => Some(DriverConfig::load(path)?),
        None => None,
    };
    let params = config_file::resolve(&cli, file_config)?;

    info!(
        bits = params.config.b,
        k = params.config.k,
        alpha = params.config.alpha,
        nodes = params.nodes,
        "starting simulator"
    );

    let network = Network::build(&params).await;
    let shell = Shell::new(network);
    Ok(shell.run().await)
}
