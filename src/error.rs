//! Error taxonomy for the engine (see SPEC_FULL.md §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("worker {worker} is unreachable: {source}")]
    WorkerUnreachable {
        worker: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{phase} timed out after {elapsed_ms}ms talking to {worker}")]
    Timeout {
        phase: &'static str,
        worker: String,
        elapsed_ms: u128,
    },

    #[error("user code raised an error during {phase} on worker {worker}: {message}")]
    UserCode {
        phase: &'static str,
        worker: String,
        message: String,
    },

    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    #[error("unknown mapper id: {0}")]
    UnknownMapper(String),

    #[error("unknown reducer id: {0}")]
    UnknownReducer(String),

    #[error("unknown partitioner id: {0}")]
    UnknownPartitioner(String),

    #[error("key {key:?} was produced by more than one worker after shuffle: {workers:?}")]
    KeyCollision {
        key: serde_json::Value,
        workers: Vec<String>,
    },

    #[error("worker {worker} reported failure for job {phase}: {reason}")]
    JobFatal {
        phase: &'static str,
        worker: String,
        reason: String,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl EngineError {
    fn kind(&self) -> &'static str {
        match self {
            EngineError::WorkerUnreachable { .. } => "worker_unreachable",
            EngineError::Timeout { .. } => "timeout",
            EngineError::UserCode { .. } => "user_code",
            EngineError::Protocol { .. } => "protocol",
            EngineError::UnknownMapper(_) => "unknown_mapper",
            EngineError::UnknownReducer(_) => "unknown_reducer",
            EngineError::UnknownPartitioner(_) => "unknown_partitioner",
            EngineError::KeyCollision { .. } => "key_collision",
            EngineError::JobFatal { .. } => "job_fatal",
        }
    }
}

/// Lets worker request handlers return `Result<Json<_>, EngineError>` directly;
/// the coordinator never serializes an `EngineError`, it only surfaces the
/// ones a worker sent back to it.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::UnknownMapper(_)
            | EngineError::UnknownReducer(_)
            | EngineError::UnknownPartitioner(_)
            | EngineError::Protocol { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
