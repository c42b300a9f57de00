//! Render worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{check_ffmpeg, check_ffprobe, ComposeConfig};
use reel_queue::JobStore;
use reel_storage::StorageConfig;
use reel_worker::{metrics, JobExecutor, JobHandler, RenderPipeline, WebhookConfig, WebhookNotifier, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting reel-worker");

    match check_ffmpeg().and_then(|ffmpeg| check_ffprobe().map(|ffprobe| (ffmpeg, ffprobe))) {
        Ok((ffmpeg, ffprobe)) => info!("Using {} and {}", ffmpeg.display(), ffprobe.display()),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    let config = WorkerConfig::from_env();
    let compose = ComposeConfig::from_env();
    info!("Worker config: {:?}", config);
    info!("Compose config: {:?}", compose);

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    if metrics_enabled {
        let addr: SocketAddr = std::env::var("WORKER_METRICS_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 9100)));
        match metrics::install_exporter(addr) {
            Ok(()) => info!("Prometheus metrics at http://{}/metrics", addr),
            Err(e) => warn!("Metrics exporter disabled: {}", e),
        }
    }

    let store = match StorageConfig::from_env() {
        Ok(storage) => match storage.connect().await {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to create storage backend: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Invalid storage configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Publishing to {} storage", store.backend_name());

    let encode_permits = Arc::new(Semaphore::new(config.max_concurrent_encodes));
    let pipeline = match RenderPipeline::new(config.clone(), compose, store, encode_permits) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create render pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let webhooks = match WebhookNotifier::new(&WebhookConfig::from_env()) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create webhook client: {}", e);
            std::process::exit(1);
        }
    };

    let handler = JobHandler::new(JobStore::from_env(), Arc::new(pipeline), webhooks);
    let executor = Arc::new(JobExecutor::new(config, handler));

    // Setup signal handler
    let signal_target = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current job");
            signal_target.shutdown();
        }
    });

    executor.run().await;

    info!("Worker shutdown complete");
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reel=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
