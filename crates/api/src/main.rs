use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use sketchbook_api::config::ServerConfig;
use sketchbook_api::router::build_app_router;
use sketchbook_api::state::AppState;
use sketchbook_converter::{ConversionApi, ConverterConfig};
use sketchbook_core::config::env_required;
use sketchbook_pipeline::{ConversionInvoker, PipelineConfig, RetrySupervisor};
use sketchbook_storage::StorageConfig;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = env_required("DATABASE_URL")?;

    let pool = sketchbook_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    sketchbook_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    sketchbook_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Conversion function client ---
    let converter_config = ConverterConfig::from_env().context("Invalid converter configuration")?;
    let client = converter_config
        .build_client()
        .context("Failed to build HTTP client")?;
    let api = ConversionApi::with_client(client.clone(), &converter_config);

    // --- Storage gateway ---
    let storage_config = StorageConfig::from_env().context("Invalid storage configuration")?;
    let storage = Arc::new(
        storage_config
            .build_gateway(client)
            .await
            .context("Failed to build storage gateway")?,
    );
    tracing::info!(backends = ?storage.backend_names(), "Storage gateway ready");

    // --- Pipeline ---
    let pipeline_config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let invoker = Arc::new(ConversionInvoker::new(
        pool.clone(),
        api,
        Arc::clone(&storage),
        pipeline_config.lease_ttl,
    ));
    let supervisor = Arc::new(RetrySupervisor::start(
        Arc::clone(&invoker),
        pipeline_config.retry,
    ));

    // --- App state ---
    let attempts = TaskTracker::new();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        invoker,
        supervisor: Arc::clone(&supervisor),
        storage: Arc::clone(&storage),
        attempts: attempts.clone(),
    };

    // --- Router ---
    let app = build_app_router(state, &config).context("Failed to build router")?;

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse::<IpAddr>().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Attempts may schedule retries and retries may write artifacts, so
    // each stage drains before the next.
    attempts.close();
    if tokio::time::timeout(config.shutdown_timeout, attempts.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = attempts.len(),
            "Conversion attempts did not finish before shutdown timeout"
        );
    }
    supervisor.shutdown(config.shutdown_timeout).await;
    storage.shutdown(config.shutdown_timeout).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sketchbook_api=debug,sketchbook_pipeline=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
