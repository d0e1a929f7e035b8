//! Worker process binary: starts the axum server exposing the six
//! endpoints from SPEC_FULL.md §6 for a single worker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mr_cluster::http::client::HttpClient;
use mr_cluster::http::server::{router, AppState};
use mr_cluster::mr::worker::Worker;
use mr_cluster::registry::Registries;

/// Starts a single map-reduce worker node.
#[derive(Parser, Debug)]
#[command(name = "mrworker")]
struct Args {
    /// Unique identifier for this worker, reported in /health and results.
    #[arg(long)]
    id: String,

    /// Host to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long)]
    port: u16,

    /// Timeout applied to this worker's own outbound shuffle deliveries.
    #[arg(long, default_value_t = 30)]
    shuffle_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let worker = Arc::new(Worker::new(args.id.clone(), Arc::new(Registries::builtin())));
    let state = AppState {
        worker: worker.clone(),
        peer: Arc::new(HttpClient::new()),
        shuffle_timeout: Duration::from_secs(args.shuffle_timeout_secs),
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    tracing::info!(worker_id = %args.id, %addr, "starting worker");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
