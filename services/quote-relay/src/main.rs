use clap::Parser;
use quote_relay::config::RelayConfig;
use quote_relay::service::RelayService;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quote-relay", version, about = "Live quote relay over WebSocket")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let config = RelayConfig::from_file(&args.config)?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %args.config.display(), "Starting quote relay");

    let service = RelayService::bootstrap(config).await?;
    service.serve(shutdown_signal()).await?;

    tracing::info!("Quote relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
