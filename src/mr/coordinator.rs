//! The coordinator's job-lifecycle algorithm (SPEC_FULL.md §4.3).
//!
//! Transport-free, same as `worker.rs`: the coordinator only knows about
//! the `WorkerRpc` trait, never about `reqwest` directly. `http::client`
//! provides the real implementation; tests can substitute an in-process
//! one that talks to axum routers via `tower::ServiceExt::oneshot`.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::config::Timeouts;
use crate::error::{EngineError, Result};
use crate::http::dto::{ExecuteMapRequest, ExecuteReduceRequest};
use crate::mr::reconcile::{reconcile, ReconcileMode};
use crate::mr::worker::WorkerState;
use crate::record::Pair;

#[async_trait]
pub trait WorkerRpc: Send + Sync {
    async fn health(&self, worker: &str, timeout: Duration) -> Result<(String, WorkerState)>;
    async fn reset(&self, worker: &str, timeout: Duration) -> Result<()>;
    async fn execute_map(
        &self,
        worker: &str,
        req: ExecuteMapRequest,
        timeout: Duration,
    ) -> Result<usize>;
    async fn execute_reduce(
        &self,
        worker: &str,
        req: ExecuteReduceRequest,
        timeout: Duration,
    ) -> Result<Vec<Pair>>;
    async fn get_results(&self, worker: &str, timeout: Duration) -> Result<Vec<Pair>>;
}

pub struct JobReport {
    pub results: Vec<Pair>,
    pub map_elapsed: Duration,
    pub reduce_elapsed: Duration,
}

pub struct Coordinator<R: WorkerRpc> {
    rpc: R,
    workers: Vec<String>,
    timeouts: Timeouts,
    reconcile_mode: ReconcileMode,
}

impl<R: WorkerRpc> Coordinator<R> {
    pub fn new(rpc: R, workers: Vec<String>, timeouts: Timeouts) -> Self {
        Self {
            rpc,
            workers,
            timeouts,
            reconcile_mode: ReconcileMode::default(),
        }
    }

    pub fn with_reconcile_mode(mut self, mode: ReconcileMode) -> Self {
        self.reconcile_mode = mode;
        self
    }

    /// Runs the full seven-step job algorithm and returns the reconciled
    /// result list plus phase timings.
    pub async fn run_job(
        &self,
        input: Vec<Pair>,
        mapper_id: &str,
        reducer_id: &str,
        partitioner_id: &str,
    ) -> Result<JobReport> {
        self.health_probe().await?;
        self.reset_all().await?;

        let partitions = partition_input(input, self.workers.len());

        let map_start = std::time::Instant::now();
        self.dispatch_map(partitions, mapper_id, partitioner_id).await?;
        let map_elapsed = map_start.elapsed();

        let reduce_start = std::time::Instant::now();
        self.dispatch_reduce(reducer_id).await?;
        let reduce_elapsed = reduce_start.elapsed();

        let collected = self.collect_results().await?;
        let results = reconcile(collected, self.reconcile_mode)?;

        Ok(JobReport {
            results,
            map_elapsed,
            reduce_elapsed,
        })
    }

    async fn health_probe(&self) -> Result<()> {
        let checks = self.workers.iter().map(|w| async move {
            self.rpc
                .health(w, self.timeouts.health())
                .await
                .map_err(|_| EngineError::JobFatal {
                    phase: "health",
                    worker: w.clone(),
                    reason: "worker did not respond to health check".into(),
                })
        });
        for result in join_all(checks).await {
            result?;
        }
        Ok(())
    }

    async fn reset_all(&self) -> Result<()> {
        let resets = self.workers.iter().map(|w| async move {
            self.rpc
                .reset(w, self.timeouts.health())
                .await
                .map_err(|e| EngineError::JobFatal {
                    phase: "reset",
                    worker: w.clone(),
                    reason: e.to_string(),
                })
        });
        for result in join_all(resets).await {
            result?;
        }
        Ok(())
    }

    async fn dispatch_map(
        &self,
        partitions: Vec<Vec<Pair>>,
        mapper_id: &str,
        partitioner_id: &str,
    ) -> Result<()> {
        let peers = self.workers.clone();
        let calls = self.workers.iter().enumerate().map(|(i, w)| {
            let req = ExecuteMapRequest {
                mapper_id: mapper_id.to_string(),
                partitioner_id: partitioner_id.to_string(),
                input_data: partitions[i].clone(),
                peers: peers.clone(),
                self_index: i,
            };
            async move {
                self.rpc
                    .execute_map(w, req, self.timeouts.map())
                    .await
                    .map_err(|e| EngineError::JobFatal {
                        phase: "map",
                        worker: w.clone(),
                        reason: e.to_string(),
                    })
            }
        });
        for result in join_all(calls).await {
            result?;
        }
        Ok(())
    }

    async fn dispatch_reduce(&self, reducer_id: &str) -> Result<()> {
        let calls = self.workers.iter().map(|w| {
            let req = ExecuteReduceRequest {
                reducer_id: reducer_id.to_string(),
            };
            async move {
                self.rpc
                    .execute_reduce(w, req, self.timeouts.reduce())
                    .await
                    .map_err(|e| EngineError::JobFatal {
                        phase: "reduce",
                        worker: w.clone(),
                        reason: e.to_string(),
                    })
            }
        });
        for result in join_all(calls).await {
            result?;
        }
        Ok(())
    }

    async fn collect_results(&self) -> Result<Vec<(String, Vec<Pair>)>> {
        let calls = self.workers.iter().map(|w| async move {
            let results = self
                .rpc
                .get_results(w, self.timeouts.health())
                .await
                .map_err(|e| EngineError::JobFatal {
                    phase: "collect",
                    worker: w.clone(),
                    reason: e.to_string(),
                })?;
            Ok::<_, EngineError>((w.clone(), results))
        });
        let mut out = Vec::with_capacity(self.workers.len());
        for result in join_all(calls).await {
            out.push(result?);
        }
        Ok(out)
    }
}

/// Splits `input` into `n` contiguous slices; sizes differ by at most one,
/// the last slice absorbing the remainder (SPEC_FULL.md §4.3 step 3). If
/// `input` is shorter than `n`, the trailing slices are empty.
pub fn partition_input(input: Vec<Pair>, n: usize) -> Vec<Vec<Pair>> {
    assert!(n > 0, "worker count must be positive");
    let total = input.len();
    let chunk = total / n;
    let mut out = Vec::with_capacity(n);
    let mut rest = input;
    for i in 0..n {
        let take = if i == n - 1 { rest.len() } else { chunk.min(rest.len()) };
        let tail = rest.split_off(take);
        out.push(rest);
        rest = tail;
    }
    out
}
