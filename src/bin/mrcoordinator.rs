//! Coordinator binary: runs one map-reduce job against a configured
//! cluster and prints the reconciled result (SPEC_FULL.md §4.3).

use std::path::PathBuf;

use clap::Parser;
use mr_cluster::config::EngineConfig;
use mr_cluster::http::client::HttpClient;
use mr_cluster::mr::coordinator::Coordinator;
use mr_cluster::mr::reconcile::ReconcileMode;
use mr_cluster::record::Pair;

/// Runs a map-reduce job against a cluster described by a YAML config.
#[derive(Parser, Debug)]
#[command(name = "mrcoordinator")]
struct Args {
    /// Path to the cluster config (workers + timeouts), see
    /// `config.example.yaml`.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to a JSON file containing the input as a `[[key, value], ...]`
    /// array.
    #[arg(long)]
    input: PathBuf,

    /// Registered mapper id.
    #[arg(long)]
    mapper: String,

    /// Registered reducer id.
    #[arg(long)]
    reducer: String,

    /// Registered partitioner id.
    #[arg(long, default_value = "hash")]
    partitioner: String,

    /// Tolerate cross-worker key collisions instead of failing the job
    /// (SPEC_FULL.md §9 compatibility mode).
    #[arg(long)]
    tolerate_broken_shuffle: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = EngineConfig::from_file(&args.config)?;
    let input_json = std::fs::read_to_string(&args.input)?;
    let input: Vec<Pair> = serde_json::from_str(&input_json)?;

    tracing::info!(
        workers = config.cluster.workers.len(),
        records = input.len(),
        "starting map-reduce job"
    );

    let mode = if args.tolerate_broken_shuffle {
        ReconcileMode::TolerateBrokenShuffle
    } else {
        ReconcileMode::RejectCollisions
    };

    let coordinator = Coordinator::new(HttpClient::new(), config.worker_urls(), config.execution.timeouts)
        .with_reconcile_mode(mode);

    let report = coordinator
        .run_job(input, &args.mapper, &args.reducer, &args.partitioner)
        .await?;

    tracing::info!(
        map_ms = report.map_elapsed.as_millis(),
        reduce_ms = report.reduce_elapsed.as_millis(),
        output_records = report.results.len(),
        "job finished"
    );

    println!("{}", serde_json::to_string_pretty(&report.results)?);

    Ok(())
}
