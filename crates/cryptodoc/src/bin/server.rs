//! Document server binary
//!
//! Run with: cargo run -p cryptodoc --bin cryptodoc-server -- --config cryptodoc.toml

use clap::Parser;
use cryptodoc::{config::AppConfig, server::DocServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cryptodoc-server", version, about = "Document registry server")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CRYPTODOC_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptodoc=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.storage.data_dir.display());
    tracing::info!("  - Object store: {}", config.object_store.root_dir.display());
    tracing::info!(
        "  - Ledger: {}",
        if config.ledger.enabled {
            config.ledger.journal_path.display().to_string()
        } else {
            "disabled".to_string()
        }
    );
    tracing::info!("  - LLM model: {} at {}", config.llm.model, config.llm.base_url);
    tracing::info!(
        "  - Rate limit: 1 AI call per {}s",
        config.pipeline.rate_limit_period().as_secs()
    );

    let server = DocServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/documents/upload - Upload a document");
    println!("  GET  /api/documents        - List documents");
    println!("  POST /api/documents/:id/chat - Ask about a document");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
