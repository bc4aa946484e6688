//! credo-gw - Credit dispute gateway service
//!
//! Orchestrates AI-assisted credit report processing: a synchronous internal
//! pipeline, an asynchronous external handoff with callback reconciliation,
//! and read/event surfaces over the persisted state.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use credo_common::config::GatewayConfig;
use credo_common::events::EventBus;
use credo_gw::AppState;

#[derive(Parser, Debug)]
#[command(name = "credo-gw", version, about = "Credit dispute gateway service")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, env = "CREDO_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path (overrides configuration)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    info!("Starting credo-gw (credit dispute gateway)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());

    if config.callback_token.is_none() {
        warn!("No callback token configured; callback endpoints accept unauthenticated requests");
    }
    if config.public_base_url.is_none() {
        warn!("No public base URL configured; external handoff jobs will fail at delivery");
    }

    let db_pool = credo_gw::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);

    let port = config.port;
    let state = AppState::new(db_pool, event_bus, config);
    let app = credo_gw::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
