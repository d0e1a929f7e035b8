//! Worker-side state machine and map/shuffle/reduce execution
//! (SPEC_FULL.md §4.2). Transport-free: this module knows nothing about
//! HTTP. The `http::server` module wraps a `Worker` behind axum handlers,
//! and passes it anything implementing `ShufflePeer` so it can deliver
//! partitioned map output to its siblings.
//!
//! Concurrency matches §5: the `phase` lock is held for the full duration
//! of a map or reduce request (one task at a time per worker), while the
//! `reduce_input` multimap has its own lock so that inbound `shuffle`
//! deliveries — including a worker's own self-delivery during map — never
//! block on a concurrent phase's network I/O.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{EngineError, Result};
use crate::record::{canonical_key, Pair};
use crate::registry::Registries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum WorkerState {
    Idle,
    Mapping,
    Shuffling,
    Reducing,
    Error(String),
}

/// Sends a worker's partitioned map output to a peer worker over the
/// wire. Implemented by `http::client::WorkerClient`; a fake
/// implementation backs the in-process integration tests.
#[async_trait]
pub trait ShufflePeer: Send + Sync {
    async fn send_shuffle(
        &self,
        peer_url: &str,
        source_worker: &str,
        pairs: Vec<Pair>,
        timeout: Duration,
    ) -> Result<()>;
}

struct ReduceEntry {
    key: Value,
    values: Vec<Value>,
}

struct PhaseState {
    state: WorkerState,
    reduce_output: Vec<Pair>,
}

pub struct MapOutcome {
    pub intermediate_count: usize,
    pub elapsed: Duration,
}

pub struct ReduceOutcome {
    pub input_pairs: usize,
    pub unique_keys: usize,
    pub output_count: usize,
    pub elapsed: Duration,
    pub results: Vec<Pair>,
}

pub struct Worker {
    pub id: String,
    registries: Arc<Registries>,
    phase: AsyncMutex<PhaseState>,
    reduce_input: std::sync::Mutex<HashMap<String, ReduceEntry>>,
}

impl Worker {
    pub fn new(id: impl Into<String>, registries: Arc<Registries>) -> Self {
        Self {
            id: id.into(),
            registries,
            phase: AsyncMutex::new(PhaseState {
                state: WorkerState::Idle,
                reduce_output: Vec::new(),
            }),
            reduce_input: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn state(&self) -> WorkerState {
        self.phase.lock().await.state.clone()
    }

    /// Always succeeds; the only recovery path out of `Error` (§4.2).
    pub async fn reset(&self) {
        let mut phase = self.phase.lock().await;
        phase.state = WorkerState::Idle;
        phase.reduce_output.clear();
        drop(phase);
        self.reduce_input.lock().unwrap().clear();
    }

    /// Runs the mapper over `input` in order, partitions the emitted pairs
    /// by destination worker, delivers the worker's own slice directly into
    /// `reduce_input`, and ships every other slice to its owning peer via
    /// `peer`. Returns only once every delivery has completed (§4.2).
    pub async fn execute_map(
        &self,
        mapper_id: &str,
        partitioner_id: &str,
        input: Vec<Pair>,
        peers: &[String],
        self_index: usize,
        peer: &dyn ShufflePeer,
        shuffle_timeout: Duration,
    ) -> Result<MapOutcome> {
        let start = Instant::now();
        {
            let mut phase = self.phase.lock().await;
            self.require_idle(&phase.state)?;
            phase.state = WorkerState::Mapping;
        }

        let mapper = match self.registries.mappers.resolve(mapper_id) {
            Ok(m) => m,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };
        let partitioner = match self.registries.partitioners.resolve(partitioner_id) {
            Ok(p) => p,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };

        // CPU-bound map application is fanned out with rayon; `par_iter`
        // over an indexed source preserves per-record order in the
        // collected `Vec`, so emission order (§5 ordering guarantee 1)
        // survives the parallel step.
        let mapper_ref = &mapper;
        let per_record: std::result::Result<Vec<Vec<Pair>>, String> = input
            .par_iter()
            .map(|pair| {
                std::panic::catch_unwind(AssertUnwindSafe(|| mapper_ref(&pair.key, &pair.value)))
                    .map_err(|_| format!("mapper panicked on key {:?}", pair.key))
            })
            .collect();

        let per_record = match per_record {
            Ok(v) => v,
            Err(message) => {
                let err = EngineError::UserCode {
                    phase: "map",
                    worker: self.id.clone(),
                    message,
                };
                self.fail(&err).await;
                return Err(err);
            }
        };

        let n = peers.len();
        let mut buckets: Vec<Vec<Pair>> = vec![Vec::new(); n];
        let mut intermediate_count = 0usize;
        for emitted in per_record {
            for pair in emitted {
                let dest = partitioner.partition(&pair.key, n);
                intermediate_count += 1;
                buckets[dest].push(pair);
            }
        }

        {
            let mut phase = self.phase.lock().await;
            phase.state = WorkerState::Shuffling;
        }

        for (dest, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            if dest == self_index {
                self.deliver_local(bucket);
                continue;
            }
            if let Err(e) = peer
                .send_shuffle(&peers[dest], &self.id, bucket, shuffle_timeout)
                .await
            {
                self.fail(&e).await;
                return Err(e);
            }
        }

        let mut phase = self.phase.lock().await;
        phase.state = WorkerState::Idle;
        Ok(MapOutcome {
            intermediate_count,
            elapsed: start.elapsed(),
        })
    }

    /// Appends `pairs` into `reduce_input` under the multimap's own lock.
    /// This is the worker's own map-to-self branch; the inbound HTTP
    /// `/shuffle` handler calls the same routine for peer deliveries, so
    /// both paths serialize against each other exactly as §5 requires.
    pub fn deliver_local(&self, pairs: Vec<Pair>) {
        let mut map = self.reduce_input.lock().unwrap();
        for pair in pairs {
            let k = canonical_key(&pair.key);
            map.entry(k)
                .or_insert_with(|| ReduceEntry {
                    key: pair.key.clone(),
                    values: Vec::new(),
                })
                .values
                .push(pair.value);
        }
    }

    /// Inbound shuffle delivery from a peer. Rejected only if this worker
    /// has already entered the error state; otherwise accepted regardless
    /// of the current phase (§4.2).
    pub async fn shuffle_deliver(&self, pairs: Vec<Pair>) -> Result<usize> {
        if let WorkerState::Error(reason) = self.state().await {
            return Err(EngineError::Protocol {
                reason: format!("worker {} is in error state: {reason}", self.id),
            });
        }
        let count = pairs.len();
        self.deliver_local(pairs);
        Ok(count)
    }

    pub async fn execute_reduce(&self, reducer_id: &str) -> Result<ReduceOutcome> {
        let start = Instant::now();
        {
            let mut phase = self.phase.lock().await;
            self.require_idle(&phase.state)?;
            phase.state = WorkerState::Reducing;
        }

        let reducer = match self.registries.reducers.resolve(reducer_id) {
            Ok(r) => r,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };

        let entries: Vec<(Value, Vec<Value>)> = {
            let map = self.reduce_input.lock().unwrap();
            map.values().map(|e| (e.key.clone(), e.values.clone())).collect()
        };
        let input_pairs: usize = entries.iter().map(|(_, v)| v.len()).sum();
        let unique_keys = entries.len();

        let reducer_ref = &reducer;
        let produced: std::result::Result<Vec<Vec<Pair>>, String> = entries
            .par_iter()
            .map(|(key, values)| {
                std::panic::catch_unwind(AssertUnwindSafe(|| reducer_ref(key, values)))
                    .map_err(|_| format!("reducer panicked on key {key:?}"))
            })
            .collect();

        let produced = match produced {
            Ok(v) => v,
            Err(message) => {
                let err = EngineError::UserCode {
                    phase: "reduce",
                    worker: self.id.clone(),
                    message,
                };
                self.fail(&err).await;
                return Err(err);
            }
        };

        let results: Vec<Pair> = produced.into_iter().flatten().collect();
        let output_count = results.len();

        let mut phase = self.phase.lock().await;
        phase.reduce_output = results.clone();
        phase.state = WorkerState::Idle;

        Ok(ReduceOutcome {
            input_pairs,
            unique_keys,
            output_count,
            elapsed: start.elapsed(),
            results,
        })
    }

    /// Idempotent; returns whatever the last `execute_reduce` produced.
    pub async fn get_results(&self) -> Vec<Pair> {
        self.phase.lock().await.reduce_output.clone()
    }

    fn require_idle(&self, state: &WorkerState) -> Result<()> {
        match state {
            WorkerState::Idle => Ok(()),
            WorkerState::Error(reason) => Err(EngineError::Protocol {
                reason: format!("worker {} is in error state: {reason}", self.id),
            }),
            other => Err(EngineError::Protocol {
                reason: format!("worker {} is busy ({other:?})", self.id),
            }),
        }
    }

    async fn fail(&self, err: &EngineError) {
        let mut phase = self.phase.lock().await;
        phase.state = WorkerState::Error(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct RecordingPeer {
        sent: StdMutex<Vec<(String, String, Vec<Pair>)>>,
    }

    impl RecordingPeer {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ShufflePeer for RecordingPeer {
        async fn send_shuffle(
            &self,
            peer_url: &str,
            source_worker: &str,
            pairs: Vec<Pair>,
            _timeout: Duration,
        ) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((peer_url.to_string(), source_worker.to_string(), pairs));
            Ok(())
        }
    }

    #[tokio::test]
    async fn map_self_delivery_does_not_use_shuffle_peer() {
        let worker = Worker::new("w0", Arc::new(Registries::builtin()));
        let peer = RecordingPeer::new();
        let input = vec![Pair::new(json!(0), json!("a a b"))];
        let outcome = worker
            .execute_map("wordcount", "hash", input, &["http://self".into()], 0, &peer, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.intermediate_count, 3);
        assert!(peer.sent.lock().unwrap().is_empty());
        assert_eq!(worker.state().await, WorkerState::Idle);
    }

    #[tokio::test]
    async fn reduce_covers_every_key_present_in_input() {
        let worker = Worker::new("w0", Arc::new(Registries::builtin()));
        worker.deliver_local(vec![
            Pair::new(json!("a"), json!(1)),
            Pair::new(json!("a"), json!(1)),
            Pair::new(json!("b"), json!(1)),
        ]);
        let outcome = worker.execute_reduce("sum").await.unwrap();
        assert_eq!(outcome.unique_keys, 2);
        assert_eq!(outcome.output_count, 2);
        let results = worker.get_results().await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn busy_worker_rejects_a_second_map_request() {
        let worker = Worker::new("w0", Arc::new(Registries::builtin()));
        {
            let mut phase = worker.phase.lock().await;
            phase.state = WorkerState::Mapping;
        }
        let peer = RecordingPeer::new();
        let err = worker
            .execute_map("wordcount", "hash", vec![], &["http://self".into()], 0, &peer, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Protocol { .. }));
    }

    #[tokio::test]
    async fn reset_clears_state_and_is_idempotent() {
        let worker = Worker::new("w0", Arc::new(Registries::builtin()));
        worker.deliver_local(vec![Pair::new(json!("a"), json!(1))]);
        worker.execute_reduce("sum").await.unwrap();
        worker.reset().await;
        let after_first = worker.get_results().await;
        worker.reset().await;
        let after_second = worker.get_results().await;
        assert_eq!(after_first, after_second);
        assert!(after_first.is_empty());
        assert_eq!(worker.state().await, WorkerState::Idle);
    }

    #[tokio::test]
    async fn shuffle_delivery_is_rejected_once_in_error_state() {
        let worker = Worker::new("w0", Arc::new(Registries::builtin()));
        {
            let mut phase = worker.phase.lock().await;
            phase.state = WorkerState::Error("boom".into());
        }
        let err = worker.shuffle_deliver(vec![Pair::new(json!("a"), json!(1))]).await;
        assert!(err.is_err());
    }
}
