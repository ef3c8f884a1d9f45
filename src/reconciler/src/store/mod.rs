use async_trait::async_trait;
use mongodb::bson::Bson;

use crate::model::{DuplicateGroup, FileRecord};

pub mod memory;
pub mod mongo;

/// Collection names are the wire contract with the upload pipeline.
pub const COLLECTION_CHUNKS: &str = "envelopes.chunks";
pub const COLLECTION_FILES: &str = "envelopes.files";
pub const COLLECTION_READ_MODEL: &str = "envelopes-read-model";
pub const COLLECTION_EVENTS: &str = "events";
pub const COLLECTION_INPROGRESS: &str = "inprogress-files";

/// Name of the unique compound index recreated on the chunk collection.
pub const CHUNK_INDEX_NAME: &str = "files_id_1_n_1";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("datastore operation failed: {0}")]
    Backend(#[from] mongodb::error::Error),
    #[error("document in '{collection}' is missing required field '{field}'")]
    MissingField {
        collection: &'static str,
        field: &'static str,
    },
    #[error("document in '{collection}' could not be decoded: {source}")]
    MalformedDocument {
        collection: &'static str,
        #[source]
        source: mongodb::bson::de::Error,
    },
    #[error("unique index violation on ({files_id}, {n})")]
    DuplicateKey { files_id: Bson, n: i64 },
}

/// Storage primitives the reconcile procedure is built from.
///
/// The production implementation is [`mongo::MongoStore`];
/// [`memory::InMemoryStore`] mirrors the same semantics for tests. Every
/// delete takes a set of identifiers and is idempotent, which is what makes
/// re-running the whole procedure the recovery strategy after a mid-run
/// failure.
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Group all chunks by `(files_id, n)` and return the groups holding
    /// more than one record.
    async fn find_duplicate_chunks(&self) -> Result<Vec<DuplicateGroup>, StoreError>;

    /// Fetch the file records whose `_id` is in `file_ids`, validated on
    /// read.
    async fn find_files(&self, file_ids: &[Bson]) -> Result<Vec<FileRecord>, StoreError>;

    /// Delete envelope read-model records by `_id`. Returns the number of
    /// records removed.
    async fn delete_read_models(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError>;

    /// Delete file records by `_id`.
    async fn delete_files(&self, file_ids: &[Bson]) -> Result<u64, StoreError>;

    /// Delete event log entries by `streamId`.
    async fn delete_events(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError>;

    /// Delete in-progress upload markers by `envelopeId`.
    async fn delete_inprogress_markers(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError>;

    /// Delete chunk records by `files_id`.
    async fn delete_chunks(&self, file_ids: &[Bson]) -> Result<u64, StoreError>;

    /// Create (or confirm) the unique compound index on
    /// `(files_id, n)` over the chunk collection. Returns the index name.
    /// Fails if duplicates are still present.
    async fn ensure_chunk_index(&self) -> Result<String, StoreError>;
}
