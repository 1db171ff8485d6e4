use std::path::{Path, PathBuf};

use ossemu_common::error::{OssError, Result};
use ossemu_common::types::{DEFAULT_CONTENT_TYPE, DEFAULT_STORAGE_CLASS, ObjectMetadata};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::chunk::ReadTarget;
use crate::config::StoreConfig;
use crate::headers::RequestHeaders;
use crate::ingest::IngestOutcome;
use crate::layout::{OBJECT_CONTENT, OBJECT_METADATA, StoreLayout, part_number_of};
use crate::meta;
use crate::validate::{validate_bucket_name, validate_object_key};

/// Handle over a store root. Holds configuration only; every operation goes
/// to the filesystem, so clones can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct OssStore {
    config: StoreConfig,
    layout: StoreLayout,
}

impl OssStore {
    pub async fn new(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.root).await?;
        info!(root = %config.root.display(), "store opened");
        let layout = StoreLayout::new(config.root.clone());
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub(crate) async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        if validate_bucket_name(bucket).is_err() {
            return Ok(false);
        }
        meta::exists(&self.layout.bucket_metadata(bucket)).await
    }

    pub(crate) async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if !self.bucket_exists(bucket).await? {
            return Err(OssError::NoSuchBucket(bucket.to_string()));
        }
        Ok(())
    }

    pub(crate) async fn read_object_metadata(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        if validate_object_key(key).is_err() {
            return Ok(None);
        }
        meta::read_record(&self.layout.object_metadata(bucket, key)).await
    }

    pub(crate) async fn load_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        self.ensure_bucket(bucket).await?;
        self.read_object_metadata(bucket, key)
            .await?
            .ok_or_else(|| no_such_key(bucket, key))
    }

    /// Like [`Self::load_object`], but an absent `a` also checks the
    /// directory marker `a/`. Returns the key that matched.
    pub(crate) async fn resolve_object(&self, bucket: &str, key: &str) -> Result<(String, ObjectMetadata)> {
        self.ensure_bucket(bucket).await?;
        if let Some(found) = self.read_object_metadata(bucket, key).await? {
            return Ok((key.to_string(), found));
        }
        if !key.ends_with('/') {
            let marker = format!("{key}/");
            if let Some(found) = self.read_object_metadata(bucket, &marker).await? {
                debug!(bucket, key, "resolved directory marker");
                return Ok((marker, found));
            }
        }
        Err(no_such_key(bucket, key))
    }

    /// Single `content` file when present, otherwise the numbered
    /// `content-<n>` files of the object directory.
    pub(crate) async fn content_target(&self, bucket: &str, key: &str) -> Result<ReadTarget> {
        let content = self.layout.object_content(bucket, key);
        if meta::exists(&content).await? {
            Ok(ReadTarget::File(content))
        } else {
            Ok(ReadTarget::Parts(self.layout.object_dir(bucket, key)))
        }
    }

    /// Removes the object's metadata and content files, leaving nested keys
    /// and in-flight uploads untouched.
    pub(crate) async fn clear_object_files(&self, bucket: &str, key: &str) -> Result<()> {
        let dir = self.layout.object_dir(bucket, key);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let owned =
                name == OBJECT_METADATA || name == OBJECT_CONTENT || part_number_of(&name).is_some();
            if owned && entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Removes empty directories from `start` upwards, stopping at the bucket.
    pub(crate) async fn prune_empty_dirs(&self, bucket: &str, start: &Path) {
        let bucket_dir = self.layout.bucket_dir(bucket);
        let mut current: PathBuf = start.to_path_buf();
        while current != bucket_dir && current.starts_with(&bucket_dir) {
            match fs::remove_dir(&current).await {
                Ok(()) => debug!(path = %current.display(), "pruned empty directory"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    // non-empty directories end the walk
                    if err.kind() != std::io::ErrorKind::DirectoryNotEmpty {
                        warn!(path = %current.display(), error = %err, "failed to prune directory");
                    }
                    return;
                }
            }
            let Some(parent) = current.parent() else {
                return;
            };
            current = parent.to_path_buf();
        }
    }
}

pub(crate) fn no_such_key(bucket: &str, key: &str) -> OssError {
    OssError::NoSuchKey {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

/// Fresh object record built from request headers and the written content.
pub(crate) fn object_metadata_from_request(
    bucket: &str,
    key: &str,
    headers: &RequestHeaders,
    content: &IngestOutcome,
) -> ObjectMetadata {
    let now = ossemu_common::time::now();
    ObjectMetadata {
        bucket: bucket.to_string(),
        key: key.to_string(),
        size: content.size,
        part_size: 0,
        md5: content.md5.clone(),
        crc64: content.crc64,
        content_type: headers
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
        content_encoding: headers.content_encoding().map(str::to_string),
        content_disposition: headers.content_disposition().map(str::to_string),
        custom_metadata: headers.custom_metadata(),
        creation_date: now,
        modified_date: now,
        appendable: false,
        acl: headers.object_acl().map(str::to_string),
        symlink: false,
        symlink_target: None,
        restore: false,
        restore_date: None,
        storage_class: DEFAULT_STORAGE_CLASS.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_creates_root_and_unknown_buckets_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = OssStore::new(StoreConfig::new(&root)).await.unwrap();
        assert!(root.is_dir());
        assert!(!store.bucket_exists("missing").await.unwrap());
        assert!(!store.bucket_exists("../etc").await.unwrap());
        let err = store.ensure_bucket("missing").await.unwrap_err();
        assert_eq!(err.error_code(), "NoSuchBucket");
    }

    #[tokio::test]
    async fn clear_keeps_nested_keys_and_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = OssStore::new(StoreConfig::new(dir.path())).await.unwrap();
        let layout = store.layout().clone();
        let obj = layout.object_dir("b", "a");
        fs::create_dir_all(obj.join("nested")).await.unwrap();
        fs::create_dir_all(layout.upload_dir("b", "a", "u1")).await.unwrap();
        for name in ["metadata", "content", "content-1", "content-2"] {
            fs::write(obj.join(name), b"x").await.unwrap();
        }

        store.clear_object_files("b", "a").await.unwrap();
        let mut left = Vec::new();
        let mut entries = fs::read_dir(&obj).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            left.push(entry.file_name().to_string_lossy().into_owned());
        }
        left.sort();
        assert_eq!(left, vec![".multipart", "nested"]);
    }

    #[tokio::test]
    async fn prune_stops_at_first_non_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = OssStore::new(StoreConfig::new(dir.path())).await.unwrap();
        let layout = store.layout().clone();
        fs::create_dir_all(layout.object_dir("b", "x/y/z")).await.unwrap();
        fs::write(layout.object_dir("b", "x").join("keep"), b"").await.unwrap();

        store.prune_empty_dirs("b", &layout.object_dir("b", "x/y/z")).await;
        assert!(!layout.object_dir("b", "x/y").exists());
        assert!(layout.object_dir("b", "x").exists());
        assert!(layout.bucket_dir("b").exists());
    }
}
