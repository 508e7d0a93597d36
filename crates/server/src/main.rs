use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use morphflux_core::{
    load_config, validate_config, FsImageStore, ImageStore, JobStore, LogFormat, ModelManager,
    ProcessorRegistry, SqliteJobStore, TransformationOrchestrator,
};
use morphflux_server::api::create_router;
use morphflux_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("MORPHFLUX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let fmt_layer = match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    info!("Loaded configuration from {:?}", config_path);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Starting MorphFlux transformation service"
    );
    info!("Database path: {:?}", config.database.path);

    // Job state store
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Image source/sink
    let image_store: Arc<dyn ImageStore> = Arc::new(
        FsImageStore::new(
            config.storage.input_dir.clone(),
            config.storage.output_dir.clone(),
        )
        .context("Failed to create image store")?,
    );
    info!("Writing outputs to {:?}", config.storage.output_dir);

    // Processors and readiness
    let disabled = config
        .models
        .disabled_types()
        .context("Invalid disabled processor list")?;
    let registry = ProcessorRegistry::with_defaults(&disabled);
    info!("Registered processors: {:?}", registry.names());

    let models = Arc::new(ModelManager::new(
        registry,
        Arc::clone(&image_store),
        &config.models,
    ));
    models.initialize().await;
    info!(
        "Models initialized ({} ready, device: {})",
        models.ready_count(),
        models.device_hint()
    );

    // Orchestrator
    let orchestrator = Arc::new(TransformationOrchestrator::new(
        config.orchestrator.clone(),
        job_store,
        Arc::clone(&models),
        image_store,
    ));
    match orchestrator.recover_interrupted() {
        Ok(0) => {}
        Ok(n) => warn!("Marked {} interrupted transformations as failed", n),
        Err(e) => error!("Failed to recover interrupted transformations: {}", e),
    }

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped, draining transformations...");
    let interrupted = orchestrator
        .shutdown(config.orchestrator.shutdown_grace())
        .await;
    if interrupted > 0 {
        warn!("{} transformations interrupted by shutdown", interrupted);
    }
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
