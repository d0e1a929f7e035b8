//! The engine core: worker state machine, coordinator algorithm, and
//! cross-worker reconciliation (SPEC_FULL.md §4).

pub mod coordinator;
pub mod reconcile;
pub mod worker;
