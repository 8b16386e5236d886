//! ObjectStore: durable create/read/list/delete of objects on local disk.
//!
//! Layout: one directory per bucket under `root`, and for each object two
//! files keyed by the same id:
//!
//! - `<root>/<bucket>/<id>.json`   metadata record
//! - `<root>/<bucket>/<id>.bktobj` raw payload bytes
//!
//! There is no cache. Every call re-reads the filesystem and releases its
//! file handles before returning. All calls block; async callers must move
//! them off the runtime workers.

use crate::{
    models::object::{ObjectMetadata, SizedMetadata, StoredObject},
    services::{
        id_generator::{IdGenerator, UuidGenerator},
        sanitizer,
    },
};
use std::{
    fs::{self, File},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const METADATA_SUFFIX: &str = ".json";
const PAYLOAD_SUFFIX: &str = ".bktobj";
const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad bucket name, object id or mime type. Never touches the disk.
    #[error("{0}")]
    InvalidName(String),
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{id}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, id: String },
    /// Exactly one of the metadata/payload pair exists, or the metadata
    /// record is unreadable. Never repaired automatically.
    #[error("integrity fault for object `{id}` in bucket `{bucket}`: {detail}")]
    IntegrityError {
        bucket: String,
        id: String,
        detail: String,
    },
    #[error(transparent)]
    StorageIoError(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File-backed object store rooted at a single directory.
///
/// Cheap to clone; clones share the id generator and address the same root.
#[derive(Clone)]
pub struct ObjectStore {
    root: PathBuf,
    ids: Arc<dyn IdGenerator>,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_id_generator(root, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(root: impl Into<PathBuf>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            root: root.into(),
            ids,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn metadata_path(&self, bucket: &str, id: &str) -> PathBuf {
        self.bucket_dir(bucket).join(format!("{id}{METADATA_SUFFIX}"))
    }

    fn payload_path(&self, bucket: &str, id: &str) -> PathBuf {
        self.bucket_dir(bucket).join(format!("{id}{PAYLOAD_SUFFIX}"))
    }

    /// Names of all buckets, sorted. A missing root simply has no buckets.
    pub fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut buckets = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                buckets.push(name.to_string());
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    /// Ids of all objects in `bucket`, sorted.
    ///
    /// Ids are taken from payload files, so in-flight temp files and
    /// metadata records are never listed.
    pub fn list_objects(&self, bucket: &str) -> StoreResult<Vec<String>> {
        sanitizer::ensure_bucket_name(bucket)?;

        let entries = match fs::read_dir(self.bucket_dir(bucket)) {
            Ok(entries) => entries,
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Err(StoreError::BucketNotFound(bucket.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            if let Some(id) = name.strip_suffix(PAYLOAD_SUFFIX) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Metadata plus the payload's on-disk length, or `None` if the object
    /// does not exist. The payload itself is not read.
    pub fn get_metadata(&self, bucket: &str, id: &str) -> StoreResult<Option<SizedMetadata>> {
        sanitizer::ensure_bucket_name(bucket)?;
        sanitizer::ensure_object_id(id)?;

        let raw = match fs::read(self.metadata_path(bucket, id)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let size = match fs::metadata(self.payload_path(bucket, id)) {
            Ok(stat) => stat.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(integrity(bucket, id, "metadata exists but payload does not"));
            }
            Err(err) => return Err(err.into()),
        };

        let metadata: ObjectMetadata = serde_json::from_slice(&raw)
            .map_err(|err| integrity(bucket, id, format!("unreadable metadata record: {err}")))?;

        Ok(Some(SizedMetadata { metadata, size }))
    }

    /// Metadata and the full payload, or `None` if the object does not exist.
    pub fn get_object(&self, bucket: &str, id: &str) -> StoreResult<Option<StoredObject>> {
        let Some(SizedMetadata { metadata, .. }) = self.get_metadata(bucket, id)? else {
            return Ok(None);
        };

        let data = match fs::read(self.payload_path(bucket, id)) {
            Ok(data) => data,
            // Lost a race against delete_object between the two reads.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(integrity(bucket, id, "payload vanished while reading"));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Some(StoredObject { metadata, data }))
    }

    /// Store a new object and return its freshly generated id.
    ///
    /// The payload is written before the metadata record, each through a
    /// temp file and a rename, so a metadata record never exists without its
    /// payload.
    pub fn create_object(
        &self,
        bucket: &str,
        name: &str,
        mime_type: &str,
        data: &[u8],
    ) -> StoreResult<String> {
        sanitizer::ensure_bucket_name(bucket)?;
        sanitizer::ensure_not_blank("mime type", mime_type)?;

        let id = self.unused_id(bucket)?;
        let record = ObjectMetadata {
            id: id.clone(),
            bucket: bucket.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
        };
        let encoded = serde_json::to_vec(&record).map_err(io::Error::other)?;

        let payload_path = self.payload_path(bucket, &id);
        let metadata_path = self.metadata_path(bucket, &id);
        self.write_in_bucket(bucket, |dir| {
            write_atomic(dir, &payload_path, data)?;
            if let Err(err) = write_atomic(dir, &metadata_path, &encoded) {
                let _ = fs::remove_file(&payload_path);
                return Err(err);
            }
            Ok(())
        })?;

        debug!(bucket, id = %id, size = data.len(), "created object");
        Ok(id)
    }

    /// Remove an object, then the bucket directory if it is now empty.
    pub fn delete_object(&self, bucket: &str, id: &str) -> StoreResult<()> {
        if self.get_metadata(bucket, id)?.is_none() {
            return Err(StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                id: id.to_string(),
            });
        }

        match fs::remove_file(self.payload_path(bucket, id)) {
            Ok(()) => {}
            // A concurrent delete got there first.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    id: id.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }
        match fs::remove_file(self.metadata_path(bucket, id)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        debug!(bucket, id, "deleted object");

        self.prune_bucket(bucket);
        Ok(())
    }

    /// Pick an id with neither a metadata nor a payload file on disk.
    fn unused_id(&self, bucket: &str) -> StoreResult<String> {
        loop {
            let id = self.ids.generate(bucket);
            if sanitizer::ensure_object_id(&id).is_err() {
                debug!(bucket, id = %id, "discarding unusable generated id");
                continue;
            }
            if !self.metadata_path(bucket, &id).try_exists()?
                && !self.payload_path(bucket, &id).try_exists()?
            {
                return Ok(id);
            }
            debug!(bucket, id = %id, "generated id already in use, retrying");
        }
    }

    /// Create the bucket directory and run `write` inside it.
    ///
    /// On failure the directory is pruned again if it is left empty, so a
    /// failed create never leaves a bucket without objects behind.
    fn write_in_bucket<F>(&self, bucket: &str, write: F) -> StoreResult<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = self.bucket_dir(bucket);
        fs::create_dir_all(&dir)?;
        write(&dir).map_err(|err| {
            self.prune_bucket(bucket);
            StoreError::from(err)
        })
    }

    /// Remove the bucket directory if it is empty.
    ///
    /// Best effort: `remove_dir` only succeeds on an empty directory, so a
    /// concurrent create simply keeps the bucket alive.
    fn prune_bucket(&self, bucket: &str) {
        let dir = self.bucket_dir(bucket);
        match fs::remove_dir(&dir) {
            Ok(()) => debug!(bucket, "removed empty bucket"),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty
                ) => {}
            Err(err) => debug!("failed to prune bucket directory {}: {}", dir.display(), err),
        }
    }
}

fn integrity(bucket: &str, id: &str, detail: impl Into<String>) -> StoreError {
    StoreError::IntegrityError {
        bucket: bucket.to_string(),
        id: id.to_string(),
        detail: detail.into(),
    }
}

/// Write `data` to a temp file in `dir`, fsync it and rename it to `target`.
///
/// If `dir` disappeared (an empty bucket pruned by a concurrent delete) it is
/// recreated once.
fn write_atomic(dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let tmp_path = dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
    let mut file = match File::create(&tmp_path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir)?;
            File::create(&tmp_path)?
        }
        Err(err) => return Err(err),
    };

    let written = file.write_all(data).and_then(|()| file.sync_all());
    drop(file);
    let written = written.and_then(|()| fs::rename(&tmp_path, target));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}
