//! On-disk naming convention of the store.
//!
//! ```text
//! <root>/<bucket>/.bucket_metadata
//! <root>/<bucket>/<key>/metadata
//! <root>/<bucket>/<key>/content
//! <root>/<bucket>/<key>/content-<n>                       (multi-file objects)
//! <root>/<bucket>/<key>/.multipart/<upload-id>/metadata
//! <root>/<bucket>/<key>/.multipart/<upload-id>/content-<n>
//! ```
//!
//! Every other module asks [`StoreLayout`] for paths instead of joining them.

use std::path::{Path, PathBuf};

pub const BUCKET_METADATA: &str = ".bucket_metadata";
pub const OBJECT_METADATA: &str = "metadata";
pub const OBJECT_CONTENT: &str = "content";
pub const PART_PREFIX: &str = "content-";
pub const MULTIPART_UPLOAD_DIR: &str = ".multipart";
pub const UPLOAD_METADATA: &str = OBJECT_METADATA;

#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    pub fn bucket_metadata(&self, bucket: &str) -> PathBuf {
        self.bucket_dir(bucket).join(BUCKET_METADATA)
    }

    pub fn object_dir(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_dir(bucket).join(key)
    }

    pub fn object_metadata(&self, bucket: &str, key: &str) -> PathBuf {
        self.object_dir(bucket, key).join(OBJECT_METADATA)
    }

    pub fn object_content(&self, bucket: &str, key: &str) -> PathBuf {
        self.object_dir(bucket, key).join(OBJECT_CONTENT)
    }

    pub fn uploads_root(&self, bucket: &str, key: &str) -> PathBuf {
        self.object_dir(bucket, key).join(MULTIPART_UPLOAD_DIR)
    }

    pub fn upload_dir(&self, bucket: &str, key: &str, upload_id: &str) -> PathBuf {
        self.uploads_root(bucket, key).join(upload_id)
    }

    pub fn upload_metadata(&self, bucket: &str, key: &str, upload_id: &str) -> PathBuf {
        self.upload_dir(bucket, key, upload_id).join(UPLOAD_METADATA)
    }

    pub fn part_file(&self, bucket: &str, key: &str, upload_id: &str, part_number: u32) -> PathBuf {
        self.upload_dir(bucket, key, upload_id)
            .join(part_file_name(part_number))
    }

    /// Key of the object owning `object_dir`, with `/` separators.
    pub fn key_of(&self, bucket: &str, object_dir: &Path) -> Option<String> {
        let rel = object_dir.strip_prefix(self.bucket_dir(bucket)).ok()?;
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if segments.is_empty() {
            return None;
        }
        Some(segments.join("/"))
    }
}

pub fn part_file_name(part_number: u32) -> String {
    format!("{PART_PREFIX}{part_number}")
}

/// Numeric suffix of a part file name such as `content-12`.
pub fn part_number_of(file_name: &str) -> Option<u32> {
    file_name.strip_prefix(PART_PREFIX)?.parse().ok()
}

/// Names a key path segment may not take because the layout owns them.
pub fn is_reserved_segment(segment: &str) -> bool {
    matches!(
        segment,
        "." | ".." | BUCKET_METADATA | OBJECT_METADATA | OBJECT_CONTENT | MULTIPART_UPLOAD_DIR
    ) || part_number_of(segment).is_some()
}
