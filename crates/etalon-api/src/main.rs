//! etalon-api - HTTP API server and queue worker for etalon

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etalon_api::{build_router, AppState, ServerConfig};
use etalon_db::{Database, DatabaseConfig, PoolConfig};
use etalon_engine::{
    dump_json, seed_from_file, EngineConfig, Lexicon, Pipeline, RuleBasedNormalizer,
};
use etalon_jobs::{AnalysisHandler, WorkerBuilder, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "etalon_api=debug,etalon_engine=info,etalon_jobs=info,etalon_db=info,tower_http=debug"
            .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("etalon-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        subsystem = "api",
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Configuration
    let db_config = DatabaseConfig::from_env();
    let engine_config = EngineConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let server_config = ServerConfig::from_env();

    info!(
        subsystem = "api",
        max_series = engine_config.max_series,
        similarity_border = engine_config.similarity_border,
        order_workers = engine_config.order_workers,
        worker_enabled = worker_config.enabled,
        "Configuration loaded"
    );

    // Connect to database
    info!(subsystem = "api", url = %db_config.redacted_url(), "Connecting to database...");
    let db = Database::connect_with_config(&db_config.url(), PoolConfig::from_env())
        .await?
        .with_queue_max_retries(worker_config.max_retries)
        .with_queue_lease_secs(worker_config.lease_secs);
    info!(subsystem = "api", "Database connected");

    // Run pending database migrations on startup
    info!(subsystem = "api", "Running database migrations...");
    db.migrate().await?;
    info!(subsystem = "api", "Database migrations complete");

    // Linguistic normalizer
    // Entries from LEXICON_PATH take precedence over the bundled seed lexicon.
    let mut lexicon = match engine_config.lexicon_path.as_ref() {
        Some(path) => Lexicon::load(path)?,
        None => {
            tracing::warn!(
                subsystem = "api",
                "LEXICON_PATH not set, lemmatizing with the bundled seed lexicon only"
            );
            Lexicon::new()
        }
    };
    lexicon.extend(&Lexicon::bundled()?);
    let normalizer = RuleBasedNormalizer::with_lexicon(lexicon);

    let store = Arc::new(db.references.clone());
    let queue = Arc::new(db.queue.clone());

    if let Some(path) = engine_config.corpus_seed_path.as_ref() {
        let changed = seed_from_file(store.as_ref(), path).await?;
        info!(subsystem = "api", path = %path.display(), changed, "Corpus seed applied");
    }
    let dump_path = engine_config.corpus_dump_path.clone();
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(normalizer),
        store,
        engine_config,
    ));

    // Queue worker
    let worker = WorkerBuilder::new(queue.clone(), Arc::new(AnalysisHandler::new(pipeline.clone())))
        .with_config(worker_config)
        .build()
        .start();

    let state = AppState::new(pipeline.clone(), queue);
    let app = build_router(state, &server_config);

    // Start server
    let addr = server_config.bind_addr();
    info!(subsystem = "api", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(subsystem = "api", "Server stopped, shutting down worker");
    if let Err(e) = worker.shutdown().await {
        tracing::warn!(subsystem = "api", error = %e, "Worker already stopped");
    }

    if let Some(path) = dump_path {
        let written = dump_json(pipeline.store().as_ref(), None, &path).await?;
        info!(subsystem = "api", path = %path.display(), written, "Corpus dumped");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(subsystem = "api", error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(subsystem = "api", "Shutdown signal received");
}
