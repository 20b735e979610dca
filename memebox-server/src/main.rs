//! memebox-server - meme catalog service
//!
//! Serves the persisted meme catalog, fills in missing AI descriptions on
//! listing, and offers substring search over the catalog's text fields.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use memebox_common::config::{self, ConfigOverrides, LoggingConfig, ServerConfig, TomlConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use memebox_server::collaborators::{DescriptionGenerator, OpenAiDescriptionGenerator};
use memebox_server::service::CatalogService;
use memebox_server::store::{CatalogStore, JsonCatalogStore};
use memebox_server::{build_router, AppState};

/// Command-line arguments for memebox-server
#[derive(Parser, Debug)]
#[command(name = "memebox-server")]
#[command(about = "Meme catalog service with lazy AI enrichment")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = config::CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT and the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind_address: Option<String>,

    /// Catalog JSON file
    #[arg(short, long)]
    data_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start on the default level and switch to the
    // configured one once the config file has been read
    let env_filter = EnvFilter::try_from_default_env();
    let filter_from_env = env_filter.is_ok();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|_| LoggingConfig::default().level.as_str().into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting memebox-server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = config::locate_config_file(args.config.as_deref());
    let toml = match &config_path {
        Some(path) => config::load_toml_config(path)?,
        None => {
            info!("No config file found, using defaults");
            TomlConfig::default()
        }
    };
    let overrides = ConfigOverrides {
        data_file: args.data_file,
        bind_address: args.bind_address,
        port: args.port,
    };
    let config = ServerConfig::resolve(overrides, toml)?;

    if !filter_from_env {
        filter_handle
            .reload(EnvFilter::new(&config.log_level))
            .context("Failed to apply configured log level")?;
    }

    info!(
        data_file = %config.data_file.display(),
        log_level = %config.log_level,
        has_openai_key = config.openai.api_key.is_some(),
        has_vision_key = config.vision.api_key.is_some(),
        "Configuration resolved"
    );

    let store = Arc::new(JsonCatalogStore::new(config.data_file.clone()));

    // Create the catalog file up front; request handling retries on failure
    match store.load().await {
        Ok(catalog) => info!("Catalog ready with {} memes", catalog.len()),
        Err(e) => error!("Catalog initialization failed: {}", e),
    }

    let generator = OpenAiDescriptionGenerator::new(
        config.openai.clone(),
        Duration::from_secs(config.enrichment.timeout_secs),
    )
    .context("Failed to create description generator")?;
    if !generator.is_available() {
        warn!("OPENAI_API_KEY not set: memes will be served without generated descriptions");
    }

    let service = CatalogService::new(store, Arc::new(generator), config.enrichment.clone());
    let app = build_router(AppState::new(service));

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("memebox-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
