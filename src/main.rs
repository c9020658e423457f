use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::queue::JobQueue;
use crate::infrastructure::queue::redis_stream::RedisStreamQueue;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::ObjectStore;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::upload::pipeline::UploadPipeline;
use crate::modules::upload::service::UploadProducer;
use crate::modules::upload::staging::StagingArea;
use crate::state::AppState;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

#[derive(Parser)]
#[command(name = "upload-relay", version, about = "Deferred object storage uploads over Redis Streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API that stages files and enqueues upload jobs
    Serve,
    /// Run the upload consumers
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::new().context("failed to load configuration")?;
    init_tracing(&config);

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("failed to connect to Redis")?;
    let queue: Arc<dyn JobQueue> = Arc::new(RedisStreamQueue::new(redis));
    let store: Arc<dyn ObjectStore> =
        Arc::new(StorageService::new(&config.storage).context("failed to configure object store")?);

    match cli.command {
        Command::Serve => serve(config, queue, store).await,
        Command::Worker => work(config, queue, store).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn serve(
    config: AppConfig,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
) -> anyhow::Result<()> {
    info!("Starting server...");

    let staging = StagingArea::new(config.staging_dir.clone());
    info!(staging = %staging.dir().display(), stream = %config.queue.stream, "Staging uploads");
    let producer = UploadProducer::new(queue, store, staging, config.queue.stream.clone());
    let port = config.server_port;
    let app = app::create_app(AppState::new(config, producer)).await;

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn work(
    config: AppConfig,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ObjectStore>,
) -> anyhow::Result<()> {
    let host_marker = config.storage.host_marker.clone();
    let uploader = Arc::new(UploadPipeline::new(store));

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    workers::uploader::start_upload_workers(
        queue,
        uploader,
        config.queue,
        config.worker,
        host_marker,
        cancel,
    )
    .await?;

    info!("All workers stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
    cancel.cancel();
}
