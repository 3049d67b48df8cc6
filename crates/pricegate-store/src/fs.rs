use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::storage_traits::{validate_prefix, ObjectKey, ObjectStore, StorageResult};

/// Filesystem-backed object store.
///
/// Layout: `<root>/<bucket>/<key>`, one file per object. Writes go to a temp
/// file in the destination directory and are renamed into place, so readers
/// never observe a half-written artifact or pointer.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    bucket: String,
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    /// Create a store for `bucket` under `root`. Creates `root/bucket/` if needed.
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> StorageResult<Self> {
        ObjectKey::new(bucket).and_then(|key| {
            if key.segments().count() == 1 {
                Ok(())
            } else {
                Err(StorageError::InvalidKey {
                    key: bucket.to_string(),
                    reason: "bucket name must be a single segment".to_string(),
                })
            }
        })?;

        let bucket_dir = root.as_ref().join(bucket);
        std::fs::create_dir_all(&bucket_dir)?;
        Ok(Self {
            bucket: bucket.to_string(),
            bucket_dir,
        })
    }

    /// Directory holding this bucket's objects.
    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    fn object_path(&self, key: &ObjectKey) -> PathBuf {
        key.segments()
            .fold(self.bucket_dir.clone(), |path, segment| path.join(segment))
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> StorageResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::Backend(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn uri(&self, key: &ObjectKey) -> String {
        format!("file://{}", self.object_path(key).display())
    }

    async fn put(&self, key: &ObjectKey, data: &[u8]) -> StorageResult<()> {
        let path = self.object_path(key);
        tracing::debug!(key = %key, bytes = data.len(), "fs put");
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || write_atomically(&path, &data))
            .await
            .map_err(|e| StorageError::Backend(format!("write task failed: {e}")))?
    }

    async fn get(&self, key: &ObjectKey) -> StorageResult<Vec<u8>> {
        let path = self.object_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, key: &ObjectKey) -> StorageResult<bool> {
        let path = self.object_path(key);
        Ok(tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    async fn list_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        let dir = prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.bucket_dir.clone(), |path, segment| path.join(segment));

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() && holds_objects(entry.path()).await? {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Whether any file exists below `dir`. Empty directory trees hold no keys.
async fn holds_objects(dir: PathBuf) -> StorageResult<bool> {
    let mut pending = vec![dir];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_file() {
                return Ok(true);
            }
            if file_type.is_dir() {
                pending.push(entry.path());
            }
        }
    }
    Ok(false)
}
