//! Cluster topology and phase-timeout configuration.
//!
//! The original source loaded a single `config.yaml` with `cluster.workers`
//! and `execution.task_timeout` sections, plus a `dataset` section for
//! loading parquet files — out of scope here (§1). Only the cluster
//! topology and timeout sections are ambient-stack concerns the engine
//! needs to start its binaries; `serde_yaml` is the same crate
//! `adamtc007-ob-poc` reaches for to parse its own YAML configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEndpoint {
    pub host: String,
    pub port: u16,
}

impl WorkerEndpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub workers: Vec<WorkerEndpoint>,
}

fn default_health_secs() -> u64 {
    5
}

fn default_phase_secs() -> u64 {
    60
}

fn default_shuffle_secs() -> u64 {
    30
}

/// Per-phase RPC timeouts (SPEC_FULL.md §4.3 "Error conditions and signals").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_health_secs")]
    pub health_secs: u64,
    #[serde(default = "default_phase_secs")]
    pub map_secs: u64,
    #[serde(default = "default_phase_secs")]
    pub reduce_secs: u64,
    #[serde(default = "default_shuffle_secs")]
    pub shuffle_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            health_secs: default_health_secs(),
            map_secs: default_phase_secs(),
            reduce_secs: default_phase_secs(),
            shuffle_secs: default_shuffle_secs(),
        }
    }
}

impl Timeouts {
    pub fn health(&self) -> Duration {
        Duration::from_secs(self.health_secs)
    }

    pub fn map(&self) -> Duration {
        Duration::from_secs(self.map_secs)
    }

    pub fn reduce(&self) -> Duration {
        Duration::from_secs(self.reduce_secs)
    }

    pub fn shuffle(&self) -> Duration {
        Duration::from_secs(self.shuffle_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(flatten)]
    pub timeouts: Timeouts,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl EngineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| EngineError::Protocol {
            reason: format!("invalid cluster config: {e}"),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| EngineError::Protocol {
            reason: format!("could not read config file {}: {e}", path.as_ref().display()),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn worker_urls(&self) -> Vec<String> {
        self.cluster.workers.iter().map(WorkerEndpoint::base_url).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_cluster_yaml() {
        let yaml = r#"
cluster:
  workers:
    - host: 127.0.0.1
      port: 5001
    - host: 127.0.0.1
      port: 5002
"#;
        let cfg = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.cluster.workers.len(), 2);
        assert_eq!(cfg.execution.timeouts.health_secs, 5);
        assert_eq!(cfg.worker_urls(), vec!["http://127.0.0.1:5001", "http://127.0.0.1:5002"]);
    }

    #[test]
    fn timeouts_can_be_overridden() {
        let yaml = r#"
cluster:
  workers:
    - host: localhost
      port: 5001
execution:
  health_secs: 1
  map_secs: 10
  reduce_secs: 10
  shuffle_secs: 2
"#;
        let cfg = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.execution.timeouts.map_secs, 10);
    }
}
