use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use pureroot_server::config::ServerConfig;
use pureroot_server::{CompositionRoot, logging, server};

#[derive(Parser, Debug)]
#[command(name = "pureroot-server", version, about = "Serve the pureroot hello API")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding config and environment
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    logging::init(&config.logging)?;
    info!("Starting pureroot-server on {}", config.summary());

    let root = Arc::new(CompositionRoot::new(&config));
    server::run(&config, root, server::shutdown_signal()).await?;

    info!("Shut down cleanly");
    Ok(())
}
