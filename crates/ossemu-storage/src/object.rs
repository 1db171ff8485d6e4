use bytes::Bytes;
use ossemu_common::error::{OssError, Result};
use ossemu_common::types::ObjectMetadata;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::chunk::{ChunkReader, ReadSpan};
use crate::headers::{PayloadLength, RequestHeaders};
use crate::ingest::{ContentWriter, IngestOutcome, copy_into, ingest, ingest_into};
use crate::meta;
use crate::range::ByteRange;
use crate::store::{OssStore, no_such_key, object_metadata_from_request};
use crate::validate::validate_object_key;

pub const DEFAULT_OBJECT_ACL: &str = "default";
const FILENAME_PLACEHOLDER: &str = "${filename}";

#[derive(Debug, Clone, Default)]
pub struct GetObjectOptions {
    pub range: Option<ByteRange>,
    pub response_content_type: Option<String>,
    pub response_content_disposition: Option<String>,
}

impl GetObjectOptions {
    /// A malformed `Range` header is dropped and the whole object served.
    pub fn from_headers(headers: &RequestHeaders) -> Self {
        Self {
            range: headers.range().ok().flatten(),
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Debug)]
pub struct GetObjectOutput {
    /// Key that matched, possibly the `key/` directory marker.
    pub key: String,
    pub metadata: ObjectMetadata,
    pub content_length: u64,
    pub content_range: Option<String>,
    pub reader: ChunkReader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutput {
    pub next_position: u64,
    pub metadata: ObjectMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "Delete")]
pub struct DeleteObjectsRequest {
    #[serde(rename = "Quiet", default)]
    pub quiet: bool,
    #[serde(rename = "Object", default)]
    pub objects: Vec<DeleteObjectEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteObjectEntry {
    #[serde(rename = "Key")]
    pub key: String,
}

impl DeleteObjectsRequest {
    pub fn from_xml(body: &str) -> Result<Self> {
        quick_xml::de::from_str(body)
            .map_err(|err| OssError::BadRequest(format!("malformed delete request: {err}")))
    }

    pub fn keys(&self, encoding_type: Option<&str>) -> Vec<String> {
        let url_encoded = encoding_type.is_some_and(|t| t.to_ascii_lowercase().starts_with("url"));
        self.objects
            .iter()
            .map(|entry| {
                if url_encoded {
                    url_decode(&entry.key)
                } else {
                    entry.key.clone()
                }
            })
            .collect()
    }
}

fn url_decode(value: &str) -> String {
    let plus_decoded = value.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteObjectError {
    pub key: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectsOutput {
    /// Empty in quiet mode.
    pub deleted: Vec<String>,
    pub errors: Vec<DeleteObjectError>,
}

/// Form fields of a browser upload, already parsed by the request layer.
#[derive(Debug, Clone, Default)]
pub struct PostObjectForm {
    pub key: Option<String>,
    pub filename: Option<String>,
    pub file: Option<Bytes>,
    pub content_type: Option<String>,
    pub success_action_redirect: Option<String>,
    pub success_action_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostObjectOutput {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub location: Option<String>,
    pub success_action_status: Option<String>,
}

impl OssStore {
    /// Replaces any existing object at `key` with the streamed body.
    pub async fn put_object<R>(
        &self,
        bucket: &str,
        key: &str,
        headers: &RequestHeaders,
        body: &mut R,
    ) -> Result<ObjectMetadata>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ensure_bucket(bucket).await?;
        validate_object_key(key)?;
        let max_size = self.config().max_object_size;
        let declared = headers.payload_length(max_size)?;
        debug!(bucket, key, ?declared, "put object");

        self.clear_object_files(bucket, key).await?;
        let content = self.layout().object_content(bucket, key);
        let outcome = match ingest(body, &content, max_size, self.config().chunk_size).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.prune_empty_dirs(bucket, &self.layout().object_dir(bucket, key))
                    .await;
                return Err(err);
            }
        };

        let record = object_metadata_from_request(bucket, key, headers, &outcome);
        meta::write_record(&self.layout().object_metadata(bucket, key), &record).await?;
        info!(bucket, key, size = record.size, "object stored");
        Ok(record)
    }

    pub async fn get_object(&self, bucket: &str, key: &str, options: &GetObjectOptions) -> Result<GetObjectOutput> {
        let (key, mut metadata) = self.resolve_object(bucket, key).await?;
        let target = self.content_target(bucket, &key).await?;

        let resolved = options.range.and_then(|range| range.resolve(metadata.size));
        let content_length = resolved.map_or(metadata.size, |r| r.length());
        let content_range = resolved.map(|r| r.content_range());
        let reader = ChunkReader::open(target, resolved.map(ReadSpan::from), self.config().chunk_size).await?;

        if let Some(content_type) = &options.response_content_type {
            metadata.content_type = content_type.clone();
        }
        if let Some(disposition) = &options.response_content_disposition {
            metadata.content_disposition = Some(disposition.clone());
        }

        Ok(GetObjectOutput {
            key,
            metadata,
            content_length,
            content_range,
            reader,
        })
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        Ok(self.resolve_object(bucket, key).await?.1)
    }

    pub async fn get_object_meta(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        self.load_object(bucket, key).await
    }

    /// Deleting an absent key succeeds. Nested keys and in-flight uploads
    /// below `key` survive.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.ensure_bucket(bucket).await?;
        validate_object_key(key)?;
        self.clear_object_files(bucket, key).await?;
        self.prune_empty_dirs(bucket, &self.layout().object_dir(bucket, key))
            .await;
        debug!(bucket, key, "object deleted");
        Ok(())
    }

    /// Per-key failures are reported in the output; only a missing bucket
    /// fails the whole batch.
    pub async fn delete_objects(
        &self,
        bucket: &str,
        request: &DeleteObjectsRequest,
        encoding_type: Option<&str>,
    ) -> Result<DeleteObjectsOutput> {
        self.ensure_bucket(bucket).await?;
        let mut output = DeleteObjectsOutput::default();
        for key in request.keys(encoding_type) {
            match self.delete_object(bucket, &key).await {
                Ok(()) if !request.quiet => output.deleted.push(key),
                Ok(()) => {}
                Err(err) => output.errors.push(DeleteObjectError {
                    code: err.error_code(),
                    message: err.to_string(),
                    key,
                }),
            }
        }
        Ok(output)
    }

    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        headers: &RequestHeaders,
    ) -> Result<ObjectMetadata> {
        let source = self.load_object(src_bucket, src_key).await?;

        if src_bucket == dst_bucket && src_key == dst_key {
            let mut record = object_metadata_from_request(dst_bucket, dst_key, headers, &outcome_of(&source));
            record.part_size = source.part_size;
            record.creation_date = source.creation_date;
            record.appendable = source.appendable;
            meta::write_record(&self.layout().object_metadata(dst_bucket, dst_key), &record).await?;
            debug!(bucket = dst_bucket, key = dst_key, "object metadata replaced in place");
            return Ok(record);
        }

        self.ensure_bucket(dst_bucket).await?;
        validate_object_key(dst_key)?;

        let target = self.content_target(src_bucket, src_key).await?;
        let mut reader = ChunkReader::open(target, None, self.config().chunk_size).await?;
        self.clear_object_files(dst_bucket, dst_key).await?;
        let writer = ContentWriter::create(
            &self.layout().object_content(dst_bucket, dst_key),
            self.config().max_object_size,
        )
        .await?;
        let outcome = copy_into(&mut reader, writer).await?;

        let record = if headers.replaces_metadata() {
            object_metadata_from_request(dst_bucket, dst_key, headers, &outcome)
        } else {
            let now = ossemu_common::time::now();
            ObjectMetadata {
                bucket: dst_bucket.to_string(),
                key: dst_key.to_string(),
                size: outcome.size,
                md5: outcome.md5,
                crc64: outcome.crc64,
                creation_date: now,
                modified_date: now,
                ..source
            }
        };
        meta::write_record(&self.layout().object_metadata(dst_bucket, dst_key), &record).await?;
        info!(src_bucket, src_key, dst_bucket, dst_key, size = record.size, "object copied");
        Ok(record)
    }

    /// Appends at `position`, which must equal the current length (zero for
    /// a new object).
    pub async fn append_object<R>(
        &self,
        bucket: &str,
        key: &str,
        position: u64,
        headers: &RequestHeaders,
        body: &mut R,
    ) -> Result<AppendOutput>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ensure_bucket(bucket).await?;
        validate_object_key(key)?;

        let existing = self.read_object_metadata(bucket, key).await?;
        if existing.as_ref().is_some_and(|current| !current.appendable) {
            return Err(OssError::ObjectNotAppendable {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        let length = existing.as_ref().map_or(0, |current| current.size);
        if position != length {
            return Err(OssError::PositionNotEqualToLength { position, length });
        }

        let max_size = self.config().max_object_size;
        if let PayloadLength::Declared(declared) = headers.payload_length(max_size)? {
            if length.saturating_add(declared) > max_size {
                return Err(OssError::InvalidArgument(format!(
                    "object size {} exceeds the maximum of {max_size}",
                    length.saturating_add(declared)
                )));
            }
        }

        let content = self.layout().object_content(bucket, key);
        let writer = match existing {
            Some(_) => ContentWriter::append(&content, max_size, self.config().chunk_size).await?,
            None => ContentWriter::create(&content, max_size).await?,
        };
        let outcome = ingest_into(body, writer, self.config().chunk_size).await?;

        let record = match existing {
            Some(mut current) => {
                current.size = outcome.size;
                current.md5 = outcome.md5;
                current.crc64 = outcome.crc64;
                current.modified_date = ossemu_common::time::now();
                current
            }
            None => ObjectMetadata {
                appendable: true,
                ..object_metadata_from_request(bucket, key, headers, &outcome)
            },
        };
        meta::write_record(&self.layout().object_metadata(bucket, key), &record).await?;
        debug!(bucket, key, size = record.size, "object appended");

        Ok(AppendOutput {
            next_position: record.size,
            metadata: record,
        })
    }

    /// Stores an empty object whose metadata points at `x-oss-symlink-target`.
    pub async fn put_symlink(&self, bucket: &str, key: &str, headers: &RequestHeaders) -> Result<ObjectMetadata> {
        self.ensure_bucket(bucket).await?;
        validate_object_key(key)?;
        let target = headers
            .symlink_target()
            .ok_or_else(|| OssError::BadRequest("missing x-oss-symlink-target".to_string()))?
            .to_string();

        self.clear_object_files(bucket, key).await?;
        let mut empty: &[u8] = &[];
        let outcome = ingest(
            &mut empty,
            &self.layout().object_content(bucket, key),
            0,
            self.config().chunk_size,
        )
        .await?;
        let record = ObjectMetadata {
            symlink: true,
            symlink_target: Some(target),
            ..object_metadata_from_request(bucket, key, headers, &outcome)
        };
        meta::write_record(&self.layout().object_metadata(bucket, key), &record).await?;
        debug!(bucket, key, "symlink stored");
        Ok(record)
    }

    pub async fn get_symlink(&self, bucket: &str, key: &str) -> Result<String> {
        self.load_object(bucket, key)
            .await?
            .symlink_target
            .filter(|target| !target.is_empty())
            .ok_or_else(|| OssError::BadRequest(format!("{key} is not a symlink")))
    }

    pub async fn restore_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        self.load_object(bucket, key).await?;
        meta::update_record(
            &self.layout().object_metadata(bucket, key),
            || no_such_key(bucket, key),
            |record: &mut ObjectMetadata| {
                record.restore = true;
                record.restore_date = Some(ossemu_common::time::now());
            },
        )
        .await
    }

    pub async fn put_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<ObjectMetadata> {
        self.load_object(bucket, key).await?;
        meta::update_record(
            &self.layout().object_metadata(bucket, key),
            || no_such_key(bucket, key),
            |record: &mut ObjectMetadata| record.acl = Some(acl.to_string()),
        )
        .await
    }

    pub async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<String> {
        let record = self.load_object(bucket, key).await?;
        Ok(record.acl.unwrap_or_else(|| DEFAULT_OBJECT_ACL.to_string()))
    }

    pub async fn post_object(&self, bucket: &str, form: &PostObjectForm) -> Result<PostObjectOutput> {
        self.ensure_bucket(bucket).await?;

        let key = form
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| OssError::BadRequest("form field key is required".to_string()))?;
        let file = form
            .file
            .as_ref()
            .ok_or_else(|| OssError::BadRequest("form field file is required".to_string()))?;
        let key = key.replace(FILENAME_PLACEHOLDER, form.filename.as_deref().unwrap_or_default());
        validate_object_key(&key)?;

        let mut headers = RequestHeaders::new();
        if let Some(content_type) = &form.content_type {
            headers = headers.with("content-type", content_type)?;
        }
        let mut body: &[u8] = file;
        let record = self.put_object_unchecked(bucket, &key, &headers, &mut body).await?;

        Ok(PostObjectOutput {
            bucket: bucket.to_string(),
            key,
            etag: record.md5,
            location: form.success_action_redirect.clone(),
            success_action_status: form.success_action_status.clone(),
        })
    }

    /// [`Self::put_object`] without the payload-length header checks.
    async fn put_object_unchecked<R>(
        &self,
        bucket: &str,
        key: &str,
        headers: &RequestHeaders,
        body: &mut R,
    ) -> Result<ObjectMetadata>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.clear_object_files(bucket, key).await?;
        let content = self.layout().object_content(bucket, key);
        let outcome = ingest(body, &content, self.config().max_object_size, self.config().chunk_size).await?;
        let record = object_metadata_from_request(bucket, key, headers, &outcome);
        meta::write_record(&self.layout().object_metadata(bucket, key), &record).await?;
        info!(bucket, key, size = record.size, "object stored from form");
        Ok(record)
    }
}

fn outcome_of(metadata: &ObjectMetadata) -> IngestOutcome {
    IngestOutcome {
        size: metadata.size,
        md5: metadata.md5.clone(),
        crc64: metadata.crc64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    async fn store_with_bucket() -> (tempfile::TempDir, OssStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path()).with_chunk_size(4);
        let store = OssStore::new(config).await.unwrap();
        store.create_bucket("bkt", &RequestHeaders::new()).await.unwrap();
        (dir, store)
    }

    fn sized(len: usize) -> RequestHeaders {
        RequestHeaders::new().with("content-length", &len.to_string()).unwrap()
    }

    async fn put(store: &OssStore, key: &str, data: &[u8]) -> ObjectMetadata {
        let mut body = data;
        store.put_object("bkt", key, &sized(data.len()), &mut body).await.unwrap()
    }

    struct Fetched {
        metadata: ObjectMetadata,
        content_length: u64,
        content_range: Option<String>,
        data: Bytes,
    }

    async fn read(store: &OssStore, key: &str, options: GetObjectOptions) -> Fetched {
        let GetObjectOutput {
            metadata,
            content_length,
            content_range,
            reader,
            ..
        } = store.get_object("bkt", key, &options).await.unwrap();
        Fetched {
            metadata,
            content_length,
            content_range,
            data: reader.read_to_end().await.unwrap(),
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes_and_headers() {
        let (_dir, store) = store_with_bucket().await;
        let headers = sized(11)
            .with("content-type", "text/plain")
            .unwrap()
            .with("x-oss-meta-owner", "qa")
            .unwrap();
        let mut body: &[u8] = b"hello world";
        let record = store.put_object("bkt", "docs/a.txt", &headers, &mut body).await.unwrap();
        assert_eq!(record.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(record.custom_metadata["x-oss-meta-owner"], "qa");

        let output = read(&store, "docs/a.txt", GetObjectOptions::default()).await;
        assert_eq!(&output.data[..], b"hello world");
        assert_eq!(output.content_length, 11);
        assert!(output.content_range.is_none());
        assert_eq!(output.metadata.content_type, "text/plain");
    }

    #[tokio::test]
    async fn ranged_get_and_unsatisfiable_range_fallback() {
        let (_dir, store) = store_with_bucket().await;
        put(&store, "r", b"0123456789").await;

        let options = GetObjectOptions::default().with_range(ByteRange::FromTo { start: 0, end: Some(0) });
        let output = read(&store, "r", options).await;
        assert_eq!(&output.data[..], b"0");
        assert_eq!(output.content_range.as_deref(), Some("bytes 0-0/10"));

        let options = GetObjectOptions::default().with_range(ByteRange::FromTo { start: 20, end: None });
        let output = read(&store, "r", options).await;
        assert_eq!(&output.data[..], b"0123456789");
        assert_eq!(output.content_length, 10);

        let headers = RequestHeaders::new().with("range", "garbage").unwrap();
        assert!(GetObjectOptions::from_headers(&headers).range.is_none());
    }

    #[tokio::test]
    async fn get_falls_back_to_directory_marker_and_head_matches() {
        let (_dir, store) = store_with_bucket().await;
        put(&store, "folder/", b"").await;
        let head = store.head_object("bkt", "folder").await.unwrap();
        assert_eq!(head.key, "folder/");
        let err = store.head_object("bkt", "missing").await.unwrap_err();
        assert_eq!(err.error_code(), "NoSuchKey");
    }

    #[tokio::test]
    async fn put_requires_length_and_known_bucket() {
        let (_dir, store) = store_with_bucket().await;
        let mut body: &[u8] = b"x";
        let err = store
            .put_object("bkt", "k", &RequestHeaders::new(), &mut body)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "MissingContentLength");

        let err = store.put_object("nobkt", "k", &sized(1), &mut body).await.unwrap_err();
        assert_eq!(err.error_code(), "NoSuchBucket");

        let err = store.put_object("bkt", "../k", &sized(1), &mut body).await.unwrap_err();
        assert_eq!(err.error_code(), "InvalidObjectName");
    }

    #[tokio::test]
    async fn delete_keeps_nested_keys_and_tolerates_absent_objects() {
        let (_dir, store) = store_with_bucket().await;
        put(&store, "a", b"parent").await;
        put(&store, "a/b", b"child").await;

        store.delete_object("bkt", "a").await.unwrap();
        assert!(store.get_object_meta("bkt", "a").await.is_err());
        assert_eq!(store.get_object_meta("bkt", "a/b").await.unwrap().size, 5);

        store.delete_object("bkt", "a/b").await.unwrap();
        assert!(!store.layout().object_dir("bkt", "a").exists());
        store.delete_object("bkt", "never").await.unwrap();
    }

    #[tokio::test]
    async fn batch_delete_reports_per_key_results() {
        let (_dir, store) = store_with_bucket().await;
        put(&store, "x y", b"1").await;
        put(&store, "z", b"2").await;

        let xml = "<Delete><Quiet>false</Quiet><Object><Key>x%20y</Key></Object>\
                   <Object><Key>z</Key></Object><Object><Key>..%2Fbad</Key></Object></Delete>";
        let request = DeleteObjectsRequest::from_xml(xml).unwrap();
        let output = store.delete_objects("bkt", &request, Some("url")).await.unwrap();
        assert_eq!(output.deleted, vec!["x y".to_string(), "z".to_string()]);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, "InvalidObjectName");

        let quiet = DeleteObjectsRequest::from_xml("<Delete><Quiet>true</Quiet><Object><Key>z</Key></Object></Delete>")
            .unwrap();
        let output = store.delete_objects("bkt", &quiet, None).await.unwrap();
        assert!(output.deleted.is_empty());
        assert!(DeleteObjectsRequest::from_xml("<Delete><Object>").is_err());
    }

    #[tokio::test]
    async fn copy_duplicates_content_and_honours_metadata_directive() {
        let (_dir, store) = store_with_bucket().await;
        let headers = sized(3).with("x-oss-meta-tag", "src").unwrap();
        let mut body: &[u8] = b"abc";
        let source = store.put_object("bkt", "src", &headers, &mut body).await.unwrap();

        let copied = store
            .copy_object("bkt", "src", "bkt", "dst", &RequestHeaders::new())
            .await
            .unwrap();
        assert_eq!(copied.md5, source.md5);
        assert_eq!(copied.custom_metadata["x-oss-meta-tag"], "src");

        let replace = RequestHeaders::new()
            .with("x-oss-metadata-directive", "REPLACE")
            .unwrap()
            .with("content-type", "text/csv")
            .unwrap();
        let replaced = store.copy_object("bkt", "src", "bkt", "dst2", &replace).await.unwrap();
        assert!(replaced.custom_metadata.is_empty());
        assert_eq!(replaced.content_type, "text/csv");

        let err = store
            .copy_object("bkt", "src", "nowhere", "k", &RequestHeaders::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NoSuchBucket");
        let err = store
            .copy_object("bkt", "nope", "bkt", "k", &RequestHeaders::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NoSuchKey");
    }

    #[tokio::test]
    async fn append_checks_position_and_appendability() {
        let (_dir, store) = store_with_bucket().await;
        let mut body: &[u8] = b"abc";
        let first = store.append_object("bkt", "log", 0, &sized(3), &mut body).await.unwrap();
        assert_eq!(first.next_position, 3);
        assert!(first.metadata.appendable);

        let mut body: &[u8] = b"de";
        let err = store.append_object("bkt", "log", 1, &sized(2), &mut body).await.unwrap_err();
        assert_eq!(err.error_code(), "PositionNotEqualToLength");

        let second = store.append_object("bkt", "log", 3, &sized(2), &mut body).await.unwrap();
        assert_eq!(second.next_position, 5);
        let output = read(&store, "log", GetObjectOptions::default()).await;
        assert_eq!(&output.data[..], b"abcde");

        put(&store, "plain", b"p").await;
        let mut body: &[u8] = b"q";
        let err = store.append_object("bkt", "plain", 1, &sized(1), &mut body).await.unwrap_err();
        assert_eq!(err.error_code(), "ObjectNotAppendable");
    }

    #[tokio::test]
    async fn symlink_acl_and_restore_update_metadata() {
        let (_dir, store) = store_with_bucket().await;
        let headers = RequestHeaders::new().with("x-oss-symlink-target", "target.txt").unwrap();
        store.put_symlink("bkt", "link", &headers).await.unwrap();
        assert_eq!(store.get_symlink("bkt", "link").await.unwrap(), "target.txt");
        let err = store.put_symlink("bkt", "link2", &RequestHeaders::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "BadRequest");

        put(&store, "plain", b"p").await;
        assert_eq!(store.get_symlink("bkt", "plain").await.unwrap_err().error_code(), "BadRequest");
        assert_eq!(store.get_object_acl("bkt", "plain").await.unwrap(), DEFAULT_OBJECT_ACL);
        store.put_object_acl("bkt", "plain", "private").await.unwrap();
        assert_eq!(store.get_object_acl("bkt", "plain").await.unwrap(), "private");
        let restored = store.restore_object("bkt", "plain").await.unwrap();
        assert!(restored.restore && restored.restore_date.is_some());
    }

    #[tokio::test]
    async fn post_object_substitutes_filename() {
        let (_dir, store) = store_with_bucket().await;
        let form = PostObjectForm {
            key: Some("uploads/${filename}".to_string()),
            filename: Some("photo.jpg".to_string()),
            file: Some(Bytes::from_static(b"jpeg")),
            content_type: Some("image/jpeg".to_string()),
            ..PostObjectForm::default()
        };
        let output = store.post_object("bkt", &form).await.unwrap();
        assert_eq!(output.key, "uploads/photo.jpg");
        let meta = store.get_object_meta("bkt", "uploads/photo.jpg").await.unwrap();
        assert_eq!(meta.content_type, "image/jpeg");
        assert_eq!(meta.md5, output.etag);

        let err = store
            .post_object("bkt", &PostObjectForm { key: Some("k".to_string()), ..PostObjectForm::default() })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "BadRequest");
    }
}
