use std::path::Path;

use anyhow::{Context, anyhow};
use ossemu_common::error::OssError;
use ossemu_common::time::{format_http_date, format_iso8601};
use ossemu_storage::{
    ByteRange, CompletedPart, GetObjectOptions, ListObjectsParams, ListUploadsParams, OssStore,
    RequestHeaders,
};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::Command;

/// Keeps the service error code in CLI error output.
trait Coded<T> {
    fn coded(self) -> anyhow::Result<T>;
}

impl<T> Coded<T> for Result<T, OssError> {
    fn coded(self) -> anyhow::Result<T> {
        self.map_err(|err| anyhow!("{}: {err}", err.error_code()))
    }
}

pub(crate) async fn run(store: &OssStore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Mb { bucket, acl } => {
            let mut headers = RequestHeaders::new();
            if let Some(acl) = acl {
                headers = headers.with("x-oss-acl", &acl).coded()?;
            }
            let record = store.create_bucket(&bucket, &headers).await.coded()?;
            println!("{}\t{}", record.bucket, format_iso8601(&record.creation_date));
        }
        Command::Rb { bucket } => store.delete_bucket(&bucket).await.coded()?,
        Command::Buckets => {
            for record in store.list_buckets().await.coded()? {
                println!("{}\t{}", record.bucket, format_iso8601(&record.creation_date));
            }
        }
        Command::Ls {
            bucket,
            prefix,
            delimiter,
            max_keys,
            marker,
        } => {
            let params = ListObjectsParams {
                prefix,
                delimiter,
                marker,
                max_keys,
            };
            let page = store.list_objects(&bucket, &params).await.coded()?;
            for prefix in &page.common_prefixes {
                println!("PRE\t{prefix}");
            }
            for object in &page.objects {
                println!(
                    "{}\t{}\t{}\t{}",
                    format_iso8601(&object.modified_date),
                    object.size,
                    object.md5,
                    object.key
                );
            }
            if let Some(next) = page.next_marker {
                println!("-- truncated, next marker: {next}");
            }
        }
        Command::Put {
            bucket,
            key,
            file,
            content_type,
        } => {
            let (mut body, len) = open_file(&file).await?;
            let mut headers = RequestHeaders::new().with("content-length", &len.to_string()).coded()?;
            if let Some(content_type) = content_type {
                headers = headers.with("content-type", &content_type).coded()?;
            }
            let record = store.put_object(&bucket, &key, &headers, &mut body).await.coded()?;
            println!("{}\t{}", record.md5, record.crc64);
        }
        Command::Get {
            bucket,
            key,
            range,
            output,
        } => {
            let mut options = GetObjectOptions::default();
            if let Some(range) = range {
                options = options.with_range(ByteRange::parse(&range).coded()?);
            }
            let object = store.get_object(&bucket, &key, &options).await.coded()?;
            if let Some(content_range) = &object.content_range {
                info!(%content_range, "serving partial content");
            }
            match output {
                Some(path) => {
                    let mut file = File::create(&path)
                        .await
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    drain(object.reader, &mut file).await?;
                }
                None => drain(object.reader, &mut tokio::io::stdout()).await?,
            }
        }
        Command::Head { bucket, key } => {
            let record = store.head_object(&bucket, &key).await.coded()?;
            println!("Content-Length: {}", record.size);
            println!("Content-Type: {}", record.content_type);
            println!("ETag: \"{}\"", record.md5.to_ascii_uppercase());
            println!("Last-Modified: {}", format_http_date(&record.modified_date));
            println!("x-oss-hash-crc64ecma: {}", record.crc64);
            for (name, value) in &record.custom_metadata {
                println!("{name}: {value}");
            }
        }
        Command::Rm { bucket, key } => store.delete_object(&bucket, &key).await.coded()?,
        Command::Cp {
            src_bucket,
            src_key,
            dst_bucket,
            dst_key,
        } => {
            let record = store
                .copy_object(&src_bucket, &src_key, &dst_bucket, &dst_key, &RequestHeaders::new())
                .await
                .coded()?;
            println!("{}\t{}", record.md5, record.size);
        }
        Command::Mpu {
            bucket,
            key,
            file,
            part_size,
            content_type,
        } => {
            let mut headers = RequestHeaders::new();
            if let Some(content_type) = content_type {
                headers = headers.with("content-type", &content_type).coded()?;
            }
            let upload = store
                .initiate_multipart_upload(&bucket, &key, &headers)
                .await
                .coded()?;
            match upload_parts(store, &bucket, &key, &upload.upload_id, &file, part_size).await {
                Ok(parts) => {
                    let record = store
                        .complete_multipart_upload(&bucket, &key, &upload.upload_id, &parts, &RequestHeaders::new())
                        .await
                        .coded()?;
                    println!("{}\t{}\t{} parts", record.md5, record.size, parts.len());
                }
                Err(err) => {
                    if let Err(abort_err) = store
                        .abort_multipart_upload(&bucket, &key, &upload.upload_id)
                        .await
                    {
                        warn!(error = %abort_err, "failed to abort upload");
                    }
                    return Err(err);
                }
            }
        }
        Command::Uploads { bucket, prefix } => {
            let params = ListUploadsParams {
                prefix,
                ..ListUploadsParams::default()
            };
            let page = store.list_multipart_uploads(&bucket, &params).await.coded()?;
            for upload in &page.uploads {
                println!(
                    "{}\t{}\t{}",
                    format_iso8601(&upload.initiated),
                    upload.upload_id,
                    upload.key
                );
            }
        }
        Command::Abort {
            bucket,
            key,
            upload_id,
        } => store
            .abort_multipart_upload(&bucket, &key, &upload_id)
            .await
            .coded()?,
    }
    Ok(())
}

async fn open_file(path: &Path) -> anyhow::Result<(File, u64)> {
    let file = File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let len = file.metadata().await?.len();
    Ok((file, len))
}

async fn upload_parts(
    store: &OssStore,
    bucket: &str,
    key: &str,
    upload_id: &str,
    path: &Path,
    part_size: u64,
) -> anyhow::Result<Vec<CompletedPart>> {
    if part_size == 0 {
        return Err(anyhow!("part size must be positive"));
    }
    let (mut file, len) = open_file(path).await?;
    let mut parts = Vec::new();
    let mut offset = 0;
    let mut part_number = 1;
    while offset < len {
        let this_part = part_size.min(len - offset);
        let headers = RequestHeaders::new()
            .with("content-length", &this_part.to_string())
            .coded()?;
        let mut body = (&mut file).take(this_part);
        let etag = store
            .upload_part(bucket, key, upload_id, part_number, &headers, &mut body)
            .await
            .coded()?;
        parts.push(CompletedPart { part_number, etag });
        offset += this_part;
        part_number += 1;
    }
    Ok(parts)
}

async fn drain<W>(mut reader: ossemu_storage::ChunkReader, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = reader.next_chunk().await.coded()? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(())
}
