use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use tokio::sync::Mutex;

use super::{CHUNK_INDEX_NAME, MaintenanceStore, StoreError};
use crate::model::{DuplicateGroup, DuplicateKey, FileRecord};

/// A chunk as held by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub files_id: Bson,
    pub n: i64,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct State {
    chunks: Vec<ChunkRecord>,
    files: Vec<Document>,
    read_models: Vec<Document>,
    events: Vec<Document>,
    markers: Vec<Document>,
    unique_index: bool,
}

/// In-memory implementation of [`MaintenanceStore`] for tests.
///
/// Mirrors the grouping and set-membership deletion semantics of the
/// MongoDB implementation, and emulates the unique compound index: once
/// [`MaintenanceStore::ensure_chunk_index`] has run, inserting a chunk with
/// an already-present `(files_id, n)` key fails.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_chunk(
        &self,
        files_id: impl Into<Bson>,
        n: i64,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), StoreError> {
        let files_id = files_id.into();
        let mut state = self.state.lock().await;
        if state.unique_index
            && state
                .chunks
                .iter()
                .any(|c| c.files_id == files_id && c.n == n)
        {
            return Err(StoreError::DuplicateKey { files_id, n });
        }
        state.chunks.push(ChunkRecord {
            files_id,
            n,
            payload: payload.into(),
        });
        Ok(())
    }

    pub async fn insert_file(&self, doc: Document) {
        self.state.lock().await.files.push(doc);
    }

    pub async fn insert_read_model(&self, doc: Document) {
        self.state.lock().await.read_models.push(doc);
    }

    pub async fn insert_event(&self, doc: Document) {
        self.state.lock().await.events.push(doc);
    }

    pub async fn insert_marker(&self, doc: Document) {
        self.state.lock().await.markers.push(doc);
    }

    pub async fn chunks(&self) -> Vec<ChunkRecord> {
        self.state.lock().await.chunks.clone()
    }

    pub async fn files(&self) -> Vec<Document> {
        self.state.lock().await.files.clone()
    }

    pub async fn read_models(&self) -> Vec<Document> {
        self.state.lock().await.read_models.clone()
    }

    pub async fn events(&self) -> Vec<Document> {
        self.state.lock().await.events.clone()
    }

    pub async fn markers(&self) -> Vec<Document> {
        self.state.lock().await.markers.clone()
    }

    pub async fn has_unique_index(&self) -> bool {
        self.state.lock().await.unique_index
    }
}

fn field_in(doc: &Document, field: &str, ids: &[Bson]) -> bool {
    doc.get(field).is_some_and(|value| ids.contains(value))
}

fn delete_where(docs: &mut Vec<Document>, field: &str, ids: &[Bson]) -> u64 {
    let before = docs.len();
    docs.retain(|doc| !field_in(doc, field, ids));
    (before - docs.len()) as u64
}

#[async_trait]
impl MaintenanceStore for InMemoryStore {
    async fn find_duplicate_chunks(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let state = self.state.lock().await;
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for chunk in &state.chunks {
            match groups
                .iter_mut()
                .find(|g| g.key.files_id == chunk.files_id && g.key.n == chunk.n)
            {
                Some(group) => group.count += 1,
                None => groups.push(DuplicateGroup {
                    key: DuplicateKey {
                        files_id: chunk.files_id.clone(),
                        n: chunk.n,
                    },
                    count: 1,
                }),
            }
        }
        groups.retain(|g| g.count > 1);
        Ok(groups)
    }

    async fn find_files(&self, file_ids: &[Bson]) -> Result<Vec<FileRecord>, StoreError> {
        let state = self.state.lock().await;
        state
            .files
            .iter()
            .filter(|doc| field_in(doc, "_id", file_ids))
            .map(|doc| FileRecord::try_from(doc.clone()))
            .collect()
    }

    async fn delete_read_models(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(delete_where(&mut state.read_models, "_id", envelope_ids))
    }

    async fn delete_files(&self, file_ids: &[Bson]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(delete_where(&mut state.files, "_id", file_ids))
    }

    async fn delete_events(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(delete_where(&mut state.events, "streamId", envelope_ids))
    }

    async fn delete_inprogress_markers(&self, envelope_ids: &[Bson]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        Ok(delete_where(&mut state.markers, "envelopeId", envelope_ids))
    }

    async fn delete_chunks(&self, file_ids: &[Bson]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.chunks.len();
        state.chunks.retain(|c| !file_ids.contains(&c.files_id));
        Ok((before - state.chunks.len()) as u64)
    }

    async fn ensure_chunk_index(&self) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        // A unique index build fails while duplicates remain, like the
        // real server's would.
        for (i, chunk) in state.chunks.iter().enumerate() {
            if state.chunks[..i]
                .iter()
                .any(|c| c.files_id == chunk.files_id && c.n == chunk.n)
            {
                return Err(StoreError::DuplicateKey {
                    files_id: chunk.files_id.clone(),
                    n: chunk.n,
                });
            }
        }
        state.unique_index = true;
        Ok(CHUNK_INDEX_NAME.to_string())
    }
}
