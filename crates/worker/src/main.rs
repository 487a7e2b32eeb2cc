use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use sketchbook_worker::{
    BatchDispatcher, DispatchOptions, DispatchOutcome, JobStorePending, SqsQueue, WorkerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Publish a batch-conversion message when the pending backlog is large enough.
#[derive(Debug, Parser)]
#[command(name = "sketchbook-batch-trigger", version, about)]
struct Args {
    /// Jobs the consumer should drain, oldest first across both kinds.
    #[arg(long, default_value_t = 20)]
    batch_size: u32,

    /// Minimum pending jobs before a message is published.
    #[arg(long, default_value_t = 100)]
    threshold: i64,

    /// Publish regardless of the pending count.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let options = DispatchOptions {
        batch_size: args.batch_size,
        threshold: args.threshold,
        force: args.force,
    };

    match run(&options).await {
        Ok(DispatchOutcome::Skipped { pending, threshold }) => {
            tracing::info!(pending, threshold, "Nothing to do");
            ExitCode::SUCCESS
        }
        Ok(DispatchOutcome::Published { pending, message_id }) => {
            tracing::info!(pending, message_id = %message_id, "Batch triggered");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Batch trigger failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(options: &DispatchOptions) -> anyhow::Result<DispatchOutcome> {
    let config = WorkerConfig::from_env().context("Invalid configuration")?;

    let pool = sketchbook_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    sketchbook_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    let queue = SqsQueue::from_env(&config.queue_url).await;
    let dispatcher = BatchDispatcher::new(JobStorePending::new(pool), queue);

    dispatcher
        .dispatch(options)
        .await
        .context("Batch dispatch failed")
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sketchbook_worker=info,sketchbook_batch_trigger=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
