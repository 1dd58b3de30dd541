use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use realty_import::{
    config::Config,
    database::Database,
    ingestor::ImportPipeline,
    repositories::{OperationStore, RosterStore},
    services::ImportRateLimiter,
    web::{AppState, StaticTokenVerifier, WebServer},
};

#[derive(Parser)]
#[command(name = "realty-import")]
#[command(version)]
#[command(about = "Bulk import service for real-estate operations")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("realty_import={},tower_http=trace", cli.log_level)
    } else {
        format!("realty_import={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting realty import service v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database, &config.import).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let roster_store: Arc<dyn RosterStore> = Arc::new(database.clone());
    let operation_store: Arc<dyn OperationStore> = Arc::new(database);

    let pipeline = ImportPipeline::new(
        &config.import,
        roster_store.clone(),
        operation_store.clone(),
    )?;

    if config.auth.tokens.is_empty() {
        tracing::warn!("No bearer tokens configured; every import will be rejected");
    }

    let state = AppState {
        pipeline,
        roster_store,
        operation_store,
        verifier: Arc::new(StaticTokenVerifier::new(&config.auth)),
        rate_limiter: ImportRateLimiter::per_hour(config.import.max_imports_per_hour),
        max_request_size: config.max_request_size(),
    };

    let web_server = WebServer::new(&config, state)?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
