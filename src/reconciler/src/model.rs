use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::store::{COLLECTION_FILES, StoreError};

/// Composite key a chunk is addressed by within its parent file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateKey {
    /// Parent file identifier (`files_id` on the chunk document)
    pub files_id: Bson,
    /// 0-based sequence position within the file
    pub n: i64,
}

/// One `(files_id, n)` group holding more than one chunk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    #[serde(rename = "_id")]
    pub key: DuplicateKey,
    /// Number of chunk records sharing the key (always > 1)
    pub count: i64,
}

/// Typed projection of an `envelopes.files` document.
///
/// Only the fields the maintenance procedure consumes are carried. The
/// conversion from the raw document fails fast with a named error when a
/// required field is absent or BSON `null`, so a malformed file record
/// aborts the run instead of feeding `null` into the downstream delete
/// filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: Bson,
    /// `metadata.envelopeId`, the upload transaction this file belongs to
    pub envelope_id: Bson,
}

impl TryFrom<Document> for FileRecord {
    type Error = StoreError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let id = required_field(&doc, "_id")?;
        let metadata = match doc.get("metadata") {
            Some(Bson::Document(metadata)) => metadata,
            _ => {
                return Err(StoreError::MissingField {
                    collection: COLLECTION_FILES,
                    field: "metadata",
                });
            }
        };
        let envelope_id = required_field(metadata, "metadata.envelopeId")?;

        Ok(Self { id, envelope_id })
    }
}

fn required_field(doc: &Document, field: &'static str) -> Result<Bson, StoreError> {
    // `field` may be a dotted path for error reporting; only the last
    // segment is looked up on the given document.
    let key = field.rsplit('.').next().unwrap_or(field);
    match doc.get(key) {
        None | Some(Bson::Null) => Err(StoreError::MissingField {
            collection: COLLECTION_FILES,
            field,
        }),
        Some(value) => Ok(value.clone()),
    }
}
