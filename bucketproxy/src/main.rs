//! bucketproxy - HTTP front end for a single object-storage bucket
//!
//! Request paths become object keys under a fixed prefix. GET downloads,
//! HEAD checks existence and POST or PUT uploads.

mod config;
mod metrics;
mod router;

use anyhow::Context;
use bucketproxy_objects::storage::{EphemeralStorage, FileSystemStorage, S3Storage};
use bucketproxy_objects::{ObjectBackend, ProxyState};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Overrides, StorageConfig};
use crate::metrics::{telemetry_router, ProxyMetrics};

#[derive(Parser, Debug)]
#[command(name = "bucketproxy")]
#[command(about = "HTTP proxy for an object-storage bucket", long_about = None)]
struct Args {
    /// Configuration file (TOML, extension optional)
    #[arg(long, default_value = "bucketproxy", env = "BUCKETPROXY_CONFIG")]
    config: String,

    /// Port to serve the proxy on
    #[arg(short, long)]
    port: Option<u16>,

    /// Port to serve Prometheus metrics on
    #[arg(long)]
    telemetry_port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Bucket to proxy
    #[arg(long)]
    bucket: Option<String>,

    /// Prefix prepended to every object key
    #[arg(long)]
    prefix: Option<String>,

    /// Storage backend: memory, filesystem or s3
    #[arg(long)]
    backend: Option<String>,

    /// Root directory for the filesystem backend
    #[arg(long)]
    data_dir: Option<String>,

    /// Custom endpoint for the s3 backend
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Region for the s3 backend
    #[arg(long)]
    region: Option<String>,

    /// Use path-style addressing with the s3 backend
    #[arg(long)]
    path_style: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "BUCKETPROXY_LOG_LEVEL")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            server_port: self.port,
            telemetry_port: self.telemetry_port,
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            backend: self.backend.clone(),
            data_dir: self.data_dir.clone(),
            endpoint_url: self.endpoint_url.clone(),
            region: self.region.clone(),
            path_style: self.path_style.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "bucketproxy={0},bucketproxy_objects={0},tower_http=debug",
                    args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&args.config, args.overrides())?;

    info!("Starting bucketproxy...");
    info!("  Bucket: {}", config.bucket);
    info!("  Prefix: {:?}", config.prefix);

    let storage = connect_storage(config.storage()).await;
    info!("  Backend: {}", storage.name());

    storage
        .probe()
        .await
        .with_context(|| format!("bucket {} is not reachable", config.bucket))?;

    let metrics = Arc::new(ProxyMetrics::new().context("failed to register metrics")?);
    let state = Arc::new(ProxyState::new(storage, config.prefix.clone()));
    let app = router::create_router(state, metrics.clone());

    // Telemetry listener
    let telemetry_addr: SocketAddr =
        format!("{}:{}", config.host, config.telemetry_port).parse()?;
    let telemetry_listener = tokio::net::TcpListener::bind(telemetry_addr).await?;
    info!("Metrics on http://{}/metrics", telemetry_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(telemetry_listener, telemetry_router(metrics)).await {
            error!(error = %e, "telemetry server failed");
        }
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.server_port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn connect_storage(config: StorageConfig) -> Arc<dyn ObjectBackend> {
    match config {
        StorageConfig::Ephemeral => Arc::new(EphemeralStorage::new()),
        StorageConfig::FileSystem { path } => {
            info!("  Data directory: {}", path.display());
            Arc::new(FileSystemStorage::new(path))
        }
        StorageConfig::S3 { bucket, options } => {
            if let Some(endpoint) = &options.endpoint_url {
                info!("  Endpoint: {}", endpoint);
            }
            Arc::new(S3Storage::connect(bucket, &options).await)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
