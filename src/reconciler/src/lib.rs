//! Maintenance procedures for the envelope upload store.
//!
//! The upload pipeline writes file chunks to `envelopes.chunks` keyed by
//! `(files_id, n)`. That key is meant to be unique, but without an index
//! enforcing it, retried uploads can leave exact duplicates behind. This
//! crate detects the duplicated chunk groups, cascade-deletes the affected
//! envelopes across their dependent collections, and recreates the unique
//! compound index so the invariant holds going forward.

pub mod model;
pub mod reconcile;
pub mod store;

pub use model::{DuplicateGroup, DuplicateKey, FileRecord};
pub use reconcile::{DeletedCounts, ReconcileOutcome, Reconciler, ScanReport};
pub use store::{MaintenanceStore, StoreError, mongo::MongoStore};
