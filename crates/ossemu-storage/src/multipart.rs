//! Multipart uploads: initiate, upload parts, then complete or abort.
//!
//! Parts live as `content-<n>` files in the upload directory until
//! completion merges them, in ascending part number, into the object's
//! single `content` file.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ossemu_common::error::{OssError, Result};
use ossemu_common::types::{DEFAULT_CONTENT_TYPE, DEFAULT_STORAGE_CLASS, ObjectMetadata, UploadMetadata};
use serde::Deserialize;
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::{ChunkReader, ReadSpan, ReadTarget, discover_parts};
use crate::headers::RequestHeaders;
use crate::ingest::{ContentWriter, copy_into, digest_file, ingest};
use crate::meta;
use crate::store::{OssStore, object_metadata_from_request};
use crate::validate::validate_object_key;

pub const MAX_LIST_PARTS: usize = 1000;

/// Body of a complete request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub struct CompleteMultipartUpload {
    #[serde(rename = "Part", default)]
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag", default)]
    pub etag: String,
}

impl CompleteMultipartUpload {
    pub fn from_xml(body: &str) -> Result<Self> {
        let mut request: Self = quick_xml::de::from_str(body)
            .map_err(|err| OssError::BadRequest(format!("malformed complete request: {err}")))?;
        for part in &mut request.parts {
            part.etag = unquote_etag(&part.etag);
        }
        Ok(request)
    }
}

fn unquote_etag(etag: &str) -> String {
    let etag = etag.trim();
    for quote in ["\"", "&#34;", "&quot;"] {
        if let Some(inner) = etag
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    etag.to_string()
}

#[derive(Debug, Clone, Default)]
pub struct ListPartsParams {
    pub part_number_marker: u32,
    pub max_parts: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    pub part_number: u32,
    pub size: u64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ListPartsPage {
    pub parts: Vec<PartInfo>,
    pub is_truncated: bool,
    /// Zero unless truncated.
    pub next_part_number_marker: u32,
}

impl OssStore {
    pub async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        headers: &RequestHeaders,
    ) -> Result<UploadMetadata> {
        self.ensure_bucket(bucket).await?;
        validate_object_key(key)?;

        let upload_id = Uuid::new_v4().simple().to_string();
        let record = UploadMetadata {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.clone(),
            initiated: ossemu_common::time::now(),
            storage_class: DEFAULT_STORAGE_CLASS.to_string(),
            content_type: headers.content_type().map(str::to_string),
        };
        meta::write_record(&self.layout().upload_metadata(bucket, key, &upload_id), &record).await?;
        info!(bucket, key, upload_id, "multipart upload initiated");
        Ok(record)
    }

    /// Stores one part, replacing an earlier upload of the same number.
    /// Returns the part's MD5.
    pub async fn upload_part<R>(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        headers: &RequestHeaders,
        body: &mut R,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ensure_upload(bucket, key, upload_id, part_number).await?;
        self.record_upload_content_type(bucket, key, upload_id, headers)
            .await?;

        let max_size = self.config().max_object_size;
        headers.payload_length(max_size)?;
        let part = self.layout().part_file(bucket, key, upload_id, part_number);
        let outcome = ingest(body, &part, max_size, self.config().chunk_size).await?;
        debug!(bucket, key, upload_id, part_number, size = outcome.size, "part stored");
        Ok(outcome.md5)
    }

    /// Fills a part from a byte range of an existing object
    /// (`x-oss-copy-source-range`, whole object when absent).
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_part_copy(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        src_bucket: &str,
        src_key: &str,
        headers: &RequestHeaders,
    ) -> Result<String> {
        self.ensure_upload(bucket, key, upload_id, part_number).await?;
        let source = self.load_object(src_bucket, src_key).await?;

        let span = match headers.copy_source_range()? {
            Some(range) => {
                let resolved = range.resolve(source.size).ok_or_else(|| {
                    OssError::InvalidArgument(format!(
                        "copy source range is not satisfiable for {} bytes",
                        source.size
                    ))
                })?;
                Some(ReadSpan::from(resolved))
            }
            None => None,
        };

        let target = self.content_target(src_bucket, src_key).await?;
        let mut reader = ChunkReader::open(target, span, self.config().chunk_size).await?;
        let writer = ContentWriter::create(
            &self.layout().part_file(bucket, key, upload_id, part_number),
            self.config().max_object_size,
        )
        .await?;
        let outcome = copy_into(&mut reader, writer).await?;
        debug!(bucket, key, upload_id, part_number, src_bucket, src_key, "part copied");
        Ok(outcome.md5)
    }

    /// Merges the listed parts in ascending part number. Declared ETags are
    /// not compared against the stored parts.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        headers: &RequestHeaders,
    ) -> Result<ObjectMetadata> {
        self.ensure_upload_dir(bucket, key, upload_id).await?;

        let numbers: BTreeSet<u32> = parts.iter().map(|part| part.part_number).collect();
        let mut part_files = Vec::with_capacity(numbers.len());
        for number in numbers {
            let path = self.layout().part_file(bucket, key, upload_id, number);
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => part_files.push((path, metadata.len())),
                Ok(_) => return Err(OssError::FilePartNoExist { part_number: number }),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(OssError::FilePartNoExist { part_number: number });
                }
                Err(err) => return Err(err.into()),
            }
        }

        let upload: Option<UploadMetadata> =
            meta::read_record(&self.layout().upload_metadata(bucket, key, upload_id)).await?;

        self.clear_object_files(bucket, key).await?;
        let mut writer = ContentWriter::create(&self.layout().object_content(bucket, key), u64::MAX).await?;
        for (path, _) in &part_files {
            let mut reader =
                ChunkReader::open(ReadTarget::File(path.clone()), None, self.config().chunk_size).await?;
            loop {
                let chunk = match reader.next_chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(err) => {
                        writer.rollback().await;
                        return Err(err);
                    }
                };
                writer.write_chunk(&chunk).await?;
            }
        }
        let outcome = writer.finish().await?;

        let content_type = upload
            .and_then(|upload| upload.content_type)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let record = ObjectMetadata {
            part_size: part_files.first().map_or(0, |(_, size)| *size),
            content_type,
            ..object_metadata_from_request(bucket, key, headers, &outcome)
        };
        meta::write_record(&self.layout().object_metadata(bucket, key), &record).await?;

        self.remove_upload(bucket, key, upload_id).await?;
        info!(
            bucket,
            key,
            upload_id,
            parts = part_files.len(),
            size = record.size,
            "multipart upload completed"
        );
        Ok(record)
    }

    pub async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.ensure_upload_dir(bucket, key, upload_id).await?;
        self.remove_upload(bucket, key, upload_id).await?;
        self.prune_empty_dirs(bucket, &self.layout().object_dir(bucket, key))
            .await;
        info!(bucket, key, upload_id, "multipart upload aborted");
        Ok(())
    }

    pub async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        params: &ListPartsParams,
    ) -> Result<ListPartsPage> {
        self.ensure_upload_dir(bucket, key, upload_id).await?;

        let max = params.max_parts.unwrap_or(MAX_LIST_PARTS).min(MAX_LIST_PARTS);
        let remaining: Vec<_> = discover_parts(&self.layout().upload_dir(bucket, key, upload_id))
            .await?
            .into_iter()
            .filter(|part| part.number > params.part_number_marker)
            .collect();
        let is_truncated = remaining.len() > max;

        let mut parts = Vec::with_capacity(remaining.len().min(max));
        for part in remaining.into_iter().take(max) {
            let digest = digest_file(&part.path, self.config().chunk_size).await?;
            let modified = fs::metadata(&part.path).await?.modified()?;
            parts.push(PartInfo {
                part_number: part.number,
                size: part.size,
                etag: digest.md5,
                last_modified: DateTime::<Utc>::from(modified),
            });
        }

        let next_part_number_marker = if is_truncated {
            parts.last().map_or(0, |part| part.part_number)
        } else {
            0
        };
        Ok(ListPartsPage {
            parts,
            is_truncated,
            next_part_number_marker,
        })
    }

    async fn ensure_upload(&self, bucket: &str, key: &str, upload_id: &str, part_number: u32) -> Result<()> {
        if part_number == 0 {
            return Err(OssError::BadRequest("part number must be at least 1".to_string()));
        }
        self.ensure_upload_dir(bucket, key, upload_id).await
    }

    async fn ensure_upload_dir(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        if upload_id.is_empty() {
            return Err(OssError::BadRequest("missing upload id".to_string()));
        }
        self.ensure_bucket(bucket).await?;
        validate_object_key(key)?;

        let no_such_upload = || OssError::NoSuchUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        };
        if upload_id.contains(['/', '\\']) || upload_id == "." || upload_id == ".." {
            return Err(no_such_upload());
        }
        match fs::metadata(self.layout().upload_dir(bucket, key, upload_id)).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(no_such_upload()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(no_such_upload()),
            Err(err) => Err(err.into()),
        }
    }

    /// The first content type seen for an upload sticks.
    async fn record_upload_content_type(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        headers: &RequestHeaders,
    ) -> Result<()> {
        let Some(content_type) = headers.content_type() else {
            return Ok(());
        };
        let path = self.layout().upload_metadata(bucket, key, upload_id);
        let Some(mut record) = meta::read_record::<UploadMetadata>(&path).await? else {
            return Ok(());
        };
        if record.content_type.is_none() {
            record.content_type = Some(content_type.to_string());
            meta::write_record(&path, &record).await?;
        }
        Ok(())
    }

    async fn remove_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        fs::remove_dir_all(self.layout().upload_dir(bucket, key, upload_id)).await?;
        let uploads_root = self.layout().uploads_root(bucket, key);
        match fs::remove_dir(&uploads_root).await {
            Ok(()) => {}
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::DirectoryNotEmpty
                ) => {}
            Err(err) => warn!(path = %uploads_root.display(), error = %err, "failed to remove uploads root"),
        }
        Ok(())
    }
}
