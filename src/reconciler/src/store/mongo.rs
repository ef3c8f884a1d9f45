use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, Document, doc, from_document},
    options::IndexOptions,
};

use common::config::DatabaseConfig;

use super::{
    CHUNK_INDEX_NAME, COLLECTION_CHUNKS, COLLECTION_EVENTS, COLLECTION_FILES,
    COLLECTION_INPROGRESS, COLLECTION_READ_MODEL, MaintenanceStore, StoreError,
};
use crate::model::{DuplicateGroup, FileRecord};

/// MongoDB-backed implementation of [`MaintenanceStore`].
///
/// Holds an explicit handle to the logical database instead of relying on
/// shell-style global session state. All operations run against the
/// collections the upload pipeline writes to.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect to the store and ping it once, so connectivity problems
    /// surface before any maintenance work starts.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(&config.dsn).await?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 }).await?;

        log::info!(
            "Connected to MongoDB database '{}' at {}",
            config.database,
            config.dsn
        );
        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        ids: &[Bson],
    ) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .delete_many(doc! { field: { "$in": ids.to_vec() } })
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl MaintenanceStore for MongoStore {
    async fn find_duplicate_chunks(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let pipeline = vec![
            doc! { "$group": {
                "_id": { "files_id": "$files_id", "n": "$n" },
                "count": { "$sum": 1 },
            }},
            doc! { "$match": {
                "count": { "$gt": 1 },
            }},
        ];

        let mut cursor = self.collection(COLLECTION_CHUNKS).aggregate(pipeline).await?;
        let mut groups = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let group =
                from_document::<DuplicateGroup>(doc).map_err(|source| StoreError::MalformedDocument {
                    collection: COLLECTION_CHUNKS,
                    source,
                })?;
            groups.push(group);
        }
        Ok(groups)
    }

    async fn find_files(&self, file_ids: &[Bson]) -> Result<Vec<FileRecord>, StoreError> {
        let mut cursor = self
            .collection(COLLECTION_FILES)
            .find(doc! { "_id": { "$in": file_ids.to_vec() } })
            .await?;

        let mut files = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            files.push(FileRecord::try_from(doc)?);
        }
        Ok(files)
    }

    async fn delete_read_models(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError> {
        self.delete_by_field(COLLECTION_READ_MODEL, "_id", envelope_ids)
            .await
    }

    async fn delete_files(&self, file_ids: &[Bson]) -> Result<u64, StoreError> {
        self.delete_by_field(COLLECTION_FILES, "_id", file_ids).await
    }

    async fn delete_events(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError> {
        self.delete_by_field(COLLECTION_EVENTS, "streamId", envelope_ids)
            .await
    }

    async fn delete_inprogress_markers(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError> {
        self.delete_by_field(COLLECTION_INPROGRESS, "envelopeId", envelope_ids)
            .await
    }

    async fn delete_chunks(&self, file_ids: &[Bson]) -> Result<u64, StoreError> {
        self.delete_by_field(COLLECTION_CHUNKS, "files_id", file_ids)
            .await
    }

    async fn ensure_chunk_index(&self) -> Result<String, StoreError> {
        // Index creation is create-if-absent, so re-running the procedure
        // against an already-clean store is a no-op. Modern MongoDB builds
        // indexes without blocking reads or writes.
        let index = IndexModel::builder()
            .keys(doc! { "files_id": 1, "n": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name(CHUNK_INDEX_NAME.to_string())
                    .build(),
            )
            .build();

        let result = self.collection(COLLECTION_CHUNKS).create_index(index).await?;
        Ok(result.index_name)
    }
}
