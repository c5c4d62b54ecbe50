//! # obsdb Ingest
//!
//! High-throughput write paths that bypass per-item API overhead:
//!
//! - `bulk`: compact array-encoded observation batches, decoded and
//!   validated up front, committed all-or-nothing through the store's bulk
//!   append
//! - `sync`: offline-batch reconciliation for mobile clients under
//!   at-least-once delivery — per-item outcomes, duplicate detection, and
//!   a partial-success contract (the batch always commits for the
//!   succeeding subset)
//!
//! The two paths have deliberately opposite failure contracts: bulk aborts
//! the whole batch on any row error; sync never aborts the batch on an
//! item error.

pub mod bulk;
pub mod error;
pub mod sync;

pub use bulk::{BulkIngestPipeline, BulkRequest, CreatedObservations};
pub use error::{IngestError, Result, RowError};
pub use sync::{SyncItemError, SyncObservation, SyncReconciler, SyncReport, SyncRequest};
