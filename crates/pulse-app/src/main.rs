//! Pulse - headless live-state client - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Mirrors live dashboard feeds and logs the state.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PULSE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the server base URL from the config file
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Determine config path: CLI arg > PULSE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PULSE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let mut config = pulse_app::AppConfig::from_file(&config_path)?;
    if let Some(base_url) = args.base_url {
        config.server.base_url = base_url;
    }

    pulse_telemetry::init_logging(config.telemetry.log_filter.as_deref())?;

    info!("Starting pulse v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, base_url = %config.server.base_url, "Configuration loaded");

    let app = pulse_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
