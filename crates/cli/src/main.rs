//! Gateway entrypoint: argument parsing, logging setup, and server bootstrap.

mod config;
#[cfg(test)]
mod test_support;

use clap::Parser;
use config::Config;
use gateway::GatewayServer;
use providers::AdapterRegistry;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Command-line arguments for the streamgate gateway.
#[derive(Parser)]
#[command(name = "streamgate")]
#[command(about = "Streaming completion gateway", version = "0.1.0")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let registry = AdapterRegistry::new(config.provider_settings());
    let server = GatewayServer::new(
        config.server.port,
        config.server.auth_token.clone(),
        config.server.cors_origins.clone(),
        registry,
        config.session_limits(),
    );

    info!(port = config.server.port, "starting streamgate");
    server.run().await?;
    Ok(())
}
