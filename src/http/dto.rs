//! Wire DTOs for the six endpoints in SPEC_FULL.md §6. Shared by the axum
//! server handlers and the reqwest client so the two sides of the wire
//! agree on shape by construction.

use serde::{Deserialize, Serialize};

use crate::mr::worker::WorkerState;
use crate::record::Pair;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub worker_id: String,
    pub state: WorkerState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub worker_id: String,
    pub ack: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteMapRequest {
    pub mapper_id: String,
    pub partitioner_id: String,
    pub input_data: Vec<Pair>,
    pub peers: Vec<String>,
    /// Index of the receiving worker within `peers`, so it knows which
    /// partitioned bucket is its own self-delivery.
    pub self_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteMapResponse {
    pub worker_id: String,
    pub intermediate_count: usize,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShuffleRequest {
    pub source_worker: String,
    pub data: Vec<Pair>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShuffleResponse {
    pub worker_id: String,
    pub received: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteReduceRequest {
    pub reducer_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteReduceResponse {
    pub worker_id: String,
    pub input_pairs: usize,
    pub unique_keys: usize,
    pub output_count: usize,
    pub elapsed_ms: u128,
    pub results: Vec<Pair>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetResultsResponse {
    pub worker_id: String,
    pub results: Vec<Pair>,
}
