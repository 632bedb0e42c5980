//! HTTP service binary for tickstats
//!
//! Starts the windowed statistics engine behind the REST API.

use anyhow::Context;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tickstats::service::{shutdown_signal, StatsService};
use tickstats::Config;
use tracing::info;

#[derive(Parser)]
#[command(name = "tickstats-service")]
#[command(about = "Windowed statistics service for per-symbol sample streams", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    host: Option<IpAddr>,

    /// HTTP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum tracked symbols (overrides config)
    #[arg(long)]
    max_symbols: Option<usize>,

    /// Samples retained per symbol (overrides config)
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Config::default(),
        };
        let mut config = config.apply_env()?;

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max) = self.max_symbols {
            config.engine.max_symbols = max;
        }
        if let Some(cap) = self.buffer_capacity {
            config.engine.buffer_capacity = cap;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup logging; RUST_LOG wins over the flag-derived default
    let default_level = if args.debug { "debug" } else { "info" };
    if args.json {
        tickstats::init_tracing_with(default_level);
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tickstats::env_filter(default_level))
            .init();
    }

    info!("Starting tickstats service v{}", tickstats::VERSION);

    let config = args.load_config()?;
    info!(
        max_symbols = config.engine.max_symbols,
        buffer_capacity = config.engine.buffer_capacity,
        max_batch_size = config.engine.max_batch_size,
        "Engine configured"
    );

    let engine = Arc::new(config.engine_builder().build());
    let service = StatsService::from_config(engine, &config);
    let addr = config.bind_addr();

    info!("  HTTP: http://{}/health", addr);
    info!("Press Ctrl+C to shutdown");

    let shutdown = shutdown_signal(tokio::signal::ctrl_c());

    service
        .serve(addr, shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    info!("Service stopped");
    Ok(())
}
