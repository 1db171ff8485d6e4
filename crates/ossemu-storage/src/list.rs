//! Bucket listings: objects (v1 marker and v2 continuation token) and
//! in-flight multipart uploads.
//!
//! Listings walk the bucket once, sort the collected records and then page
//! through them. Objects and common prefixes share the page budget, and a
//! cursor naming a common prefix skips the whole group on the next page.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ossemu_common::error::{OssError, Result};
use ossemu_common::types::{ObjectMetadata, UploadMetadata};
use tokio::fs;
use tracing::debug;

use crate::layout::{MULTIPART_UPLOAD_DIR, OBJECT_METADATA, UPLOAD_METADATA};
use crate::meta;
use crate::store::OssStore;

pub const MAX_LIST_KEYS: usize = 1000;
pub const MAX_LIST_UPLOADS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordKind {
    Object,
    Upload,
}

/// Every object and upload metadata file below `bucket_dir`.
pub(crate) async fn walk_records(bucket_dir: &Path) -> Result<Vec<(RecordKind, PathBuf)>> {
    let mut records = Vec::new();
    let mut dirs = vec![bucket_dir.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                if entry.file_name() == MULTIPART_UPLOAD_DIR {
                    collect_uploads(&path, &mut records).await?;
                } else {
                    dirs.push(path);
                }
            } else if file_type.is_file() && entry.file_name() == OBJECT_METADATA && dir != bucket_dir {
                records.push((RecordKind::Object, path));
            }
        }
    }
    Ok(records)
}

async fn collect_uploads(uploads_root: &Path, records: &mut Vec<(RecordKind, PathBuf)>) -> Result<()> {
    let mut entries = fs::read_dir(uploads_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path().join(UPLOAD_METADATA);
        if meta::exists(&path).await? {
            records.push((RecordKind::Upload, path));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entry<T> {
    Item(T),
    Prefix(String),
}

pub(crate) struct Page<T> {
    pub entries: Vec<Entry<T>>,
    pub is_truncated: bool,
}

/// Segment of `key` up to and including the first delimiter after `prefix`.
pub(crate) fn common_prefix_of(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    if delimiter.is_empty() {
        return None;
    }
    let rest = key.get(prefix.len()..)?;
    let idx = rest.find(delimiter)?;
    Some(format!("{prefix}{}", &rest[..idx + delimiter.len()]))
}

/// Pages through `items`, already sorted by key. `skip` sees each item with
/// its collapsed prefix and decides whether the cursor has passed it.
pub(crate) fn paginate<T, K, S>(
    items: impl IntoIterator<Item = T>,
    key_of: K,
    prefix: &str,
    delimiter: &str,
    max: usize,
    skip: S,
) -> Page<T>
where
    K: Fn(&T) -> &str,
    S: Fn(&T, Option<&str>) -> bool,
{
    let mut entries = Vec::new();
    let mut is_truncated = false;
    if max == 0 {
        return Page { entries, is_truncated };
    }

    let mut last_prefix: Option<String> = None;
    for item in items {
        let key = key_of(&item);
        if !key.starts_with(prefix) {
            continue;
        }
        let collapsed = common_prefix_of(key, prefix, delimiter);
        if skip(&item, collapsed.as_deref()) {
            continue;
        }
        // sorted input keeps every member of a group contiguous
        if collapsed.is_some() && collapsed == last_prefix {
            continue;
        }
        if entries.len() >= max {
            is_truncated = true;
            break;
        }
        match collapsed {
            Some(common) => {
                last_prefix = Some(common.clone());
                entries.push(Entry::Prefix(common));
            }
            None => entries.push(Entry::Item(item)),
        }
    }
    Page { entries, is_truncated }
}

fn split_entries<T>(entries: Vec<Entry<T>>) -> (Vec<T>, Vec<String>) {
    let mut items = Vec::new();
    let mut prefixes = Vec::new();
    for entry in entries {
        match entry {
            Entry::Item(item) => items.push(item),
            Entry::Prefix(prefix) => prefixes.push(prefix),
        }
    }
    (items, prefixes)
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsParams {
    pub prefix: String,
    pub delimiter: String,
    pub marker: String,
    pub max_keys: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Params {
    pub prefix: String,
    pub delimiter: String,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub max_keys: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectMetadata>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Last key or common prefix of the page, set only when truncated.
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListObjectsV2Page {
    pub objects: Vec<ObjectMetadata>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub key_count: usize,
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListUploadsParams {
    pub prefix: String,
    pub delimiter: String,
    pub key_marker: String,
    pub upload_id_marker: String,
    pub max_uploads: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ListUploadsPage {
    pub uploads: Vec<UploadMetadata>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_key_marker: String,
    pub next_upload_id_marker: String,
}

pub fn encode_continuation_token(key: &str) -> String {
    STANDARD.encode(key)
}

pub fn decode_continuation_token(token: &str) -> Result<String> {
    let invalid = || OssError::InvalidArgument(format!("invalid continuation token: {token}"));
    let bytes = STANDARD.decode(token).map_err(|_| invalid())?;
    String::from_utf8(bytes).map_err(|_| invalid())
}

impl OssStore {
    pub async fn list_objects(&self, bucket: &str, params: &ListObjectsParams) -> Result<ListObjectsPage> {
        let max = params.max_keys.unwrap_or(MAX_LIST_KEYS).min(MAX_LIST_KEYS);
        let (objects, common_prefixes, is_truncated, cursor) =
            self.page_objects(bucket, &params.prefix, &params.delimiter, &params.marker, max)
                .await?;
        Ok(ListObjectsPage {
            objects,
            common_prefixes,
            is_truncated,
            next_marker: cursor.filter(|_| is_truncated),
        })
    }

    pub async fn list_objects_v2(&self, bucket: &str, params: &ListObjectsV2Params) -> Result<ListObjectsV2Page> {
        let resume = match params.continuation_token.as_deref() {
            Some(token) if !token.is_empty() => decode_continuation_token(token)?,
            _ => params.start_after.clone().unwrap_or_default(),
        };
        let max = params.max_keys.unwrap_or(MAX_LIST_KEYS).min(MAX_LIST_KEYS);
        let (objects, common_prefixes, is_truncated, cursor) = self
            .page_objects(bucket, &params.prefix, &params.delimiter, &resume, max)
            .await?;
        let key_count = objects.len() + common_prefixes.len();
        Ok(ListObjectsV2Page {
            objects,
            common_prefixes,
            is_truncated,
            key_count,
            next_continuation_token: cursor
                .filter(|_| is_truncated)
                .map(|key| encode_continuation_token(&key)),
        })
    }

    pub async fn list_multipart_uploads(&self, bucket: &str, params: &ListUploadsParams) -> Result<ListUploadsPage> {
        self.ensure_bucket(bucket).await?;

        let mut uploads: Vec<UploadMetadata> = Vec::new();
        for (kind, path) in walk_records(&self.layout().bucket_dir(bucket)).await? {
            if kind != RecordKind::Upload {
                continue;
            }
            if let Some(record) = meta::read_record::<UploadMetadata>(&path).await? {
                uploads.push(record);
            }
        }
        uploads.sort_by(|a, b| (&a.key, &a.upload_id).cmp(&(&b.key, &b.upload_id)));

        let max = params.max_uploads.unwrap_or(MAX_LIST_UPLOADS).min(MAX_LIST_UPLOADS);
        let key_marker = params.key_marker.as_str();
        let upload_id_marker = params.upload_id_marker.as_str();
        let page = paginate(
            uploads,
            |upload: &UploadMetadata| upload.key.as_str(),
            &params.prefix,
            &params.delimiter,
            max,
            |upload, collapsed| {
                upload.key.as_str() < key_marker
                    || (upload.key == key_marker && upload.upload_id.as_str() <= upload_id_marker)
                    || (!key_marker.is_empty() && collapsed == Some(key_marker))
            },
        );

        let is_truncated = page.is_truncated;
        let (next_key_marker, next_upload_id_marker) = match page.entries.last() {
            Some(Entry::Item(upload)) if is_truncated => (upload.key.clone(), upload.upload_id.clone()),
            Some(Entry::Prefix(prefix)) if is_truncated => (prefix.clone(), String::new()),
            _ => (String::new(), String::new()),
        };
        let (uploads, common_prefixes) = split_entries(page.entries);
        debug!(bucket, uploads = uploads.len(), is_truncated, "listed multipart uploads");

        Ok(ListUploadsPage {
            uploads,
            common_prefixes,
            is_truncated,
            next_key_marker,
            next_upload_id_marker,
        })
    }

    async fn collect_objects(&self, bucket: &str) -> Result<Vec<ObjectMetadata>> {
        let mut objects = Vec::new();
        for (kind, path) in walk_records(&self.layout().bucket_dir(bucket)).await? {
            if kind != RecordKind::Object {
                continue;
            }
            let Some(mut record) = meta::read_record::<ObjectMetadata>(&path).await? else {
                continue;
            };
            if record.key.is_empty() {
                let object_dir = path.parent().unwrap_or(path.as_path());
                match self.layout().key_of(bucket, object_dir) {
                    Some(key) => record.key = key,
                    None => continue,
                }
            }
            objects.push(record);
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn page_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
        marker: &str,
        max: usize,
    ) -> Result<(Vec<ObjectMetadata>, Vec<String>, bool, Option<String>)> {
        self.ensure_bucket(bucket).await?;
        let objects = self.collect_objects(bucket).await?;

        let page = paginate(
            objects,
            |object: &ObjectMetadata| object.key.as_str(),
            prefix,
            delimiter,
            max,
            |object, collapsed| {
                !marker.is_empty() && (object.key.as_str() <= marker || collapsed == Some(marker))
            },
        );

        let cursor = page.entries.last().map(|entry| match entry {
            Entry::Item(object) => object.key.clone(),
            Entry::Prefix(prefix) => prefix.clone(),
        });
        let is_truncated = page.is_truncated;
        let (objects, prefixes) = split_entries(page.entries);
        debug!(
            bucket,
            objects = objects.len(),
            prefixes = prefixes.len(),
            is_truncated,
            "listed objects"
        );
        Ok((objects, prefixes, is_truncated, cursor))
    }
}
