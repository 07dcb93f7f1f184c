//! Cache/remote reconciliation for sealed notebooks.
//!
//! The engine treats both sides as dumb byte stores and reconciles them at
//! entry granularity: manifests are decrypted, merged last-writer-wins, and
//! the blob transfers implied by the merge are carried out one at a time.
//! Callers observe a run through [`SyncPhase`] progress events and get a
//! [`SyncReport`] back; per-entry failures are recorded in the report rather
//! than aborting the run.

pub mod engine;
pub mod plan;
pub mod progress;
pub mod report;

pub use engine::SyncEngine;
pub use plan::{compare, SyncPlan};
pub use progress::{ProgressFn, SyncPhase};
pub use report::SyncReport;
