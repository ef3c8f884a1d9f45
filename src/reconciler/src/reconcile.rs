use mongodb::bson::Bson;
use serde::Serialize;

use crate::model::{DuplicateGroup, FileRecord};
use crate::store::{MaintenanceStore, StoreError};

/// Read-only result of the detection phase, dumped for operator audit
/// before anything is deleted.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// `(files_id, n)` groups holding more than one chunk record
    pub duplicates: Vec<DuplicateGroup>,
    /// File records the duplicated groups belong to
    pub files: Vec<FileRecord>,
    /// Envelope ids of those files, in file order. Intentionally not
    /// deduplicated: repeats inside a set-membership delete filter are a
    /// no-op.
    pub envelope_ids: Vec<Bson>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty()
    }

    /// Distinct parent-file ids of the duplicated groups, in first-seen
    /// order. The cascade deletes files and chunks by these ids, so a file
    /// whose record has already vanished still gets its chunks removed.
    pub fn file_ids(&self) -> Vec<Bson> {
        distinct_file_ids(&self.duplicates)
    }
}

/// Per-collection record counts removed by the cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletedCounts {
    pub read_models: u64,
    pub files: u64,
    pub events: u64,
    pub inprogress_markers: u64,
    pub chunks: u64,
}

/// Summary of a completed maintenance run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub scan: ScanReport,
    pub deleted: DeletedCounts,
    pub index_name: String,
}

/// Drives the duplicate-chunk maintenance procedure against a store.
///
/// The run is sequential and not transactional: a failure mid-cascade
/// leaves already-deleted records gone. Every step is idempotent (deletes
/// are set-membership filters, the index build is create-if-absent), so
/// the recovery strategy after a partial run is simply to run the
/// procedure again.
pub struct Reconciler<'a, S: MaintenanceStore> {
    store: &'a S,
}

impl<'a, S: MaintenanceStore> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Operations 1-3: detect duplicate chunk groups, resolve their parent
    /// files, and map those to envelope ids. Read-only.
    pub async fn scan(&self) -> Result<ScanReport, StoreError> {
        let duplicates = self.store.find_duplicate_chunks().await?;
        log::info!(
            "Found {} duplicated (files_id, n) chunk group(s)",
            duplicates.len()
        );

        let file_ids = distinct_file_ids(&duplicates);
        let files = self.store.find_files(&file_ids).await?;
        log::info!(
            "Resolved {} file record(s) for {} affected file id(s)",
            files.len(),
            file_ids.len()
        );
        if files.len() < file_ids.len() {
            log::warn!(
                "{} affected file id(s) have no file record; their chunks will still be removed",
                file_ids.len() - files.len()
            );
        }

        let envelope_ids = files.iter().map(|f| f.envelope_id.clone()).collect();

        Ok(ScanReport {
            duplicates,
            files,
            envelope_ids,
        })
    }

    /// Operations 4-5: cascade-delete the records named by `scan`, then
    /// recreate the unique chunk index.
    ///
    /// Deletion order is fixed: derived and parent records go before the
    /// raw chunk data that produced them.
    pub async fn apply(&self, scan: ScanReport) -> Result<ReconcileOutcome, StoreError> {
        let file_ids = scan.file_ids();
        let envelope_ids = &scan.envelope_ids;

        let read_models = self.store.delete_read_models(envelope_ids).await?;
        log::info!("Deleted {read_models} envelope read-model record(s)");

        let files = self.store.delete_files(&file_ids).await?;
        log::info!("Deleted {files} file record(s)");

        let events = self.store.delete_events(envelope_ids).await?;
        log::info!("Deleted {events} event(s)");

        let inprogress_markers = self.store.delete_inprogress_markers(envelope_ids).await?;
        log::info!("Deleted {inprogress_markers} in-progress upload marker(s)");

        let chunks = self.store.delete_chunks(&file_ids).await?;
        log::info!("Deleted {chunks} chunk record(s)");

        let deleted = DeletedCounts {
            read_models,
            files,
            events,
            inprogress_markers,
            chunks,
        };

        let index_name = self.store.ensure_chunk_index().await?;
        log::info!("Unique chunk index in place: {index_name}");

        Ok(ReconcileOutcome {
            scan,
            deleted,
            index_name,
        })
    }

    /// The full procedure: scan, cascade, rebuild the index.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, StoreError> {
        let scan = self.scan().await?;
        self.apply(scan).await
    }
}

/// Order-preserving dedup. `Bson` has no `Hash`/`Ord`, and the duplicate
/// set is operator-review sized, so linear containment is fine.
fn distinct_file_ids(groups: &[DuplicateGroup]) -> Vec<Bson> {
    let mut ids: Vec<Bson> = Vec::new();
    for group in groups {
        if !ids.contains(&group.key.files_id) {
            ids.push(group.key.files_id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DuplicateKey;

    fn group(files_id: &str, n: i64, count: i64) -> DuplicateGroup {
        DuplicateGroup {
            key: DuplicateKey {
                files_id: Bson::String(files_id.to_string()),
                n,
            },
            count,
        }
    }

    #[test]
    fn test_distinct_file_ids_preserves_first_seen_order() {
        let groups = vec![
            group("F2", 0, 2),
            group("F1", 3, 2),
            group("F2", 1, 4),
            group("F1", 0, 2),
        ];

        let ids = distinct_file_ids(&groups);
        assert_eq!(
            ids,
            vec![
                Bson::String("F2".to_string()),
                Bson::String("F1".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_scan_report_is_clean() {
        let report = ScanReport {
            duplicates: vec![],
            files: vec![],
            envelope_ids: vec![],
        };
        assert!(report.is_clean());
        assert!(report.file_ids().is_empty());
    }
}
