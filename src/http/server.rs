//! axum router exposing the six worker endpoints from SPEC_FULL.md §6.
//!
//! Grounded in the pack's only REST-serving example
//! (`adamtc007-ob-poc/src/api/entity_routes.rs`): a `Clone` state struct
//! carrying an `Arc`-wrapped core, plumbed through `State` extractors, with
//! a router-building function the binary composes with `tower-http`
//! layers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::http::dto::{
    ExecuteMapRequest, ExecuteMapResponse, ExecuteReduceRequest, ExecuteReduceResponse,
    GetResultsResponse, HealthResponse, ResetResponse, ShuffleRequest, ShuffleResponse,
};
use crate::mr::worker::{ShufflePeer, Worker};

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
    pub peer: Arc<dyn ShufflePeer>,
    pub shuffle_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reset", post(reset))
        .route("/execute_map", post(execute_map))
        .route("/shuffle", post(shuffle))
        .route("/execute_reduce", post(execute_reduce))
        .route("/get_results", get(get_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        worker_id: state.worker.id.clone(),
        state: state.worker.state().await,
    })
}

async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    state.worker.reset().await;
    Json(ResetResponse {
        worker_id: state.worker.id.clone(),
        ack: true,
    })
}

async fn execute_map(
    State(state): State<AppState>,
    Json(req): Json<ExecuteMapRequest>,
) -> Result<Json<ExecuteMapResponse>> {
    let outcome = state
        .worker
        .execute_map(
            &req.mapper_id,
            &req.partitioner_id,
            req.input_data,
            &req.peers,
            req.self_index,
            state.peer.as_ref(),
            state.shuffle_timeout,
        )
        .await?;
    Ok(Json(ExecuteMapResponse {
        worker_id: state.worker.id.clone(),
        intermediate_count: outcome.intermediate_count,
        elapsed_ms: outcome.elapsed.as_millis(),
    }))
}

async fn shuffle(
    State(state): State<AppState>,
    Json(req): Json<ShuffleRequest>,
) -> Result<Json<ShuffleResponse>> {
    let received = state.worker.shuffle_deliver(req.data).await?;
    tracing::debug!(source = %req.source_worker, received, "accepted shuffle delivery");
    Ok(Json(ShuffleResponse {
        worker_id: state.worker.id.clone(),
        received,
    }))
}

async fn execute_reduce(
    State(state): State<AppState>,
    Json(req): Json<ExecuteReduceRequest>,
) -> Result<Json<ExecuteReduceResponse>> {
    let outcome = state.worker.execute_reduce(&req.reducer_id).await?;
    Ok(Json(ExecuteReduceResponse {
        worker_id: state.worker.id.clone(),
        input_pairs: outcome.input_pairs,
        unique_keys: outcome.unique_keys,
        output_count: outcome.output_count,
        elapsed_ms: outcome.elapsed.as_millis(),
        results: outcome.results,
    }))
}

async fn get_results(State(state): State<AppState>) -> Json<GetResultsResponse> {
    Json(GetResultsResponse {
        worker_id: state.worker.id.clone(),
        results: state.worker.get_results().await,
    })
}
