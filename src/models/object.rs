//! Represents an object (blob) stored in a bucket.

use serde::{Deserialize, Serialize};

/// The metadata record persisted as `<root>/<bucket>/<id>.json`.
///
/// The payload size is deliberately absent: it is always derived from the
/// payload file's length on disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Server-generated identifier, unique within the bucket.
    pub id: String,

    /// Name of the owning bucket.
    pub bucket: String,

    /// Client-supplied display name. Never used for lookup.
    pub name: String,

    /// Content type of the payload.
    pub mime_type: String,
}

/// Metadata together with the payload's on-disk length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizedMetadata {
    pub metadata: ObjectMetadata,
    pub size: u64,
}

/// A complete object: metadata plus the full payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub metadata: ObjectMetadata,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
