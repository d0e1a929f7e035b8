//! reqwest-backed implementations of the two transport seams the engine
//! core depends on: `ShufflePeer` (worker-to-worker) and `WorkerRpc`
//! (coordinator-to-worker).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::http::dto::{
    ExecuteMapRequest, ExecuteMapResponse, ExecuteReduceRequest, ExecuteReduceResponse,
    GetResultsResponse, HealthResponse, ResetResponse, ShuffleRequest, ShuffleResponse,
};
use crate::mr::coordinator::WorkerRpc;
use crate::mr::worker::{ShufflePeer, WorkerState};
use crate::record::Pair;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn timed<T>(
    worker: &str,
    phase: &'static str,
    timeout: Duration,
    fut: impl std::future::Future<Output = std::result::Result<T, reqwest::Error>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(EngineError::WorkerUnreachable {
            worker: worker.to_string(),
            source,
        }),
        Err(_) => Err(EngineError::Timeout {
            phase,
            worker: worker.to_string(),
            elapsed_ms: timeout.as_millis(),
        }),
    }
}

#[async_trait]
impl ShufflePeer for HttpClient {
    async fn send_shuffle(
        &self,
        peer_url: &str,
        source_worker: &str,
        pairs: Vec<Pair>,
        timeout: Duration,
    ) -> Result<()> {
        let body = ShuffleRequest {
            source_worker: source_worker.to_string(),
            data: pairs,
        };
        let url = format!("{peer_url}/shuffle");
        let _: ShuffleResponse = timed(peer_url, "shuffle", timeout, async {
            self.client.post(&url).json(&body).send().await?.json().await
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WorkerRpc for HttpClient {
    async fn health(&self, worker: &str, timeout: Duration) -> Result<(String, WorkerState)> {
        let url = format!("{worker}/health");
        let resp: HealthResponse = timed(worker, "health", timeout, async {
            self.client.get(&url).send().await?.json().await
        })
        .await?;
        Ok((resp.worker_id, resp.state))
    }

    async fn reset(&self, worker: &str, timeout: Duration) -> Result<()> {
        let url = format!("{worker}/reset");
        let _: ResetResponse = timed(worker, "reset", timeout, async {
            self.client.post(&url).send().await?.json().await
        })
        .await?;
        Ok(())
    }

    async fn execute_map(
        &self,
        worker: &str,
        req: ExecuteMapRequest,
        timeout: Duration,
    ) -> Result<usize> {
        let url = format!("{worker}/execute_map");
        let resp: ExecuteMapResponse = timed(worker, "map", timeout, async {
            self.client.post(&url).json(&req).send().await?.json().await
        })
        .await?;
        Ok(resp.intermediate_count)
    }

    async fn execute_reduce(
        &self,
        worker: &str,
        req: ExecuteReduceRequest,
        timeout: Duration,
    ) -> Result<Vec<Pair>> {
        let url = format!("{worker}/execute_reduce");
        let resp: ExecuteReduceResponse = timed(worker, "reduce", timeout, async {
            self.client.post(&url).json(&req).send().await?.json().await
        })
        .await?;
        Ok(resp.results)
    }

    async fn get_results(&self, worker: &str, timeout: Duration) -> Result<Vec<Pair>> {
        let url = format!("{worker}/get_results");
        let resp: GetResultsResponse = timed(worker, "collect", timeout, async {
            self.client.get(&url).send().await?.json().await
        })
        .await?;
        Ok(resp.results)
    }
}
