//! meelo-matcher - External metadata matcher for the Meelo catalog
//!
//! `serve` runs the task runner and the status HTTP surface, `match` runs a
//! single match from the command line, `init-config` writes a default
//! configuration file.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use meelo_common::config::write_toml_config;
use meelo_common::models::{EntityId, EntityType};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meelo_matcher::bootstrap::{build_providers, register_providers};
use meelo_matcher::bridge::WikidataClient;
use meelo_matcher::catalog::{ApiCatalog, Catalog};
use meelo_matcher::config::MatcherSettings;
use meelo_matcher::matching::{MatchCoordinator, MatchEngine, MatchTask};
use meelo_matcher::tasks::{MemoryQueue, TaskRunner, TaskSource};
use meelo_matcher::AppState;

/// Command-line arguments for meelo-matcher
#[derive(Parser, Debug)]
#[command(name = "meelo-matcher")]
#[command(about = "External metadata matcher for the Meelo catalog")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "MEELO_MATCHER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the task runner and the HTTP surface
    Serve,

    /// Match one entity and exit
    Match {
        /// artist, album or song
        entity_type: EntityType,
        entity_id: EntityId,
        entity_name: String,
        /// Refresh from the sources the catalog already stores
        #[arg(long)]
        reuse: bool,
    },

    /// Write a configuration file holding the defaults
    InitConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings =
        MatcherSettings::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&settings)?;

    match args.command {
        Command::Serve => serve(settings).await,
        Command::Match {
            entity_type,
            entity_id,
            entity_name,
            reuse,
        } => {
            let mut task = MatchTask::new(entity_type, entity_id, entity_name);
            task.reuse_known_sources = reuse;
            match_once(settings, task).await
        }
        Command::InitConfig { path } => init_config(&path),
    }
}

fn init_tracing(settings: &MatcherSettings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| settings.logging.level.as_str().into());

    let file_layer = match &settings.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Catalog client, providers and coordinator shared by `serve` and `match`
async fn build_coordinator(
    settings: MatcherSettings,
    tasks: Arc<dyn TaskSource>,
) -> Result<Arc<MatchCoordinator>> {
    settings.validate().context("Invalid configuration")?;
    let api_url = settings
        .api_url
        .as_deref()
        .ok_or_else(|| anyhow!("Catalog API URL not configured"))?;
    let api_key = settings
        .api_key
        .as_deref()
        .ok_or_else(|| anyhow!("Catalog API key not configured"))?;

    let catalog: Arc<dyn Catalog> = Arc::new(
        ApiCatalog::new(api_url, api_key, settings.http_timeout())
            .context("Failed to create catalog client")?,
    );
    info!(api_url = %api_url, "Catalog client ready");

    let providers = build_providers(&settings).context("Failed to build providers")?;
    let providers = register_providers(
        catalog.as_ref(),
        providers,
        settings.provider_icons_dir.as_deref(),
    )
    .await
    .context("Failed to register providers")?;
    info!(count = providers.len(), "Providers ready");

    let bridge = Arc::new(
        WikidataClient::new(settings.http_timeout()).context("Failed to create Wikidata client")?,
    );
    let engine = MatchEngine::new(catalog, providers, bridge, settings);
    Ok(Arc::new(MatchCoordinator::new(engine, tasks)))
}

async fn serve(settings: MatcherSettings) -> Result<()> {
    info!(
        "Starting meelo-matcher {} on port {}",
        env!("CARGO_PKG_VERSION"),
        settings.port
    );
    let port = settings.port;
    let prefetch = settings.prefetch;

    let queue = Arc::new(MemoryQueue::new());
    let coordinator = build_coordinator(settings, queue.clone()).await?;

    let runner = TaskRunner::new(queue.clone(), Arc::clone(&coordinator), prefetch);
    let runner = tokio::spawn(runner.run());

    let app = meelo_matcher::build_router(AppState::new(coordinator, queue.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    queue.close();
    if let Err(e) = runner.await {
        error!(error = %e, "Task runner ended abnormally");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn match_once(settings: MatcherSettings, task: MatchTask) -> Result<()> {
    let queue = Arc::new(MemoryQueue::new());
    let coordinator = build_coordinator(settings, queue).await?;
    coordinator
        .match_entity(&task)
        .await
        .with_context(|| format!("Matching {} {} failed", task.entity_type, task.entity_id))
}

fn init_config(path: &Path) -> Result<()> {
    write_toml_config(&MatcherSettings::default(), path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Default configuration written");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
