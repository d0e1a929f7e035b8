//! The HTTP/JSON transport (SPEC_FULL.md §6). Kept separate from `mr` so
//! the protocol core stays transport-agnostic: `mr::worker` and
//! `mr::coordinator` only depend on the `ShufflePeer`/`WorkerRpc` traits
//! defined there, not on axum or reqwest directly.

pub mod client;
pub mod dto;
pub mod server;
