//! Streaming writes of request bodies into content files.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use ossemu_common::error::{OssError, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

use crate::chunk::{ChunkReader, read_up_to};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub size: u64,
    /// Lowercase hex MD5, used as the ETag.
    pub md5: String,
    pub crc64: u64,
}

/// MD5 and CRC-64/ECMA-182 computed side by side.
pub struct ContentDigest {
    md5: Md5,
    crc64: crc64fast::Digest,
    size: u64,
}

impl Default for ContentDigest {
    fn default() -> Self {
        Self {
            md5: Md5::new(),
            crc64: crc64fast::Digest::new(),
            size: 0,
        }
    }
}

impl ContentDigest {
    pub fn update(&mut self, chunk: &[u8]) {
        self.md5.update(chunk);
        self.crc64.write(chunk);
        self.size += chunk.len() as u64;
    }

    pub fn finish(self) -> IngestOutcome {
        IngestOutcome {
            size: self.size,
            md5: format!("{:x}", self.md5.finalize()),
            crc64: self.crc64.sum64(),
        }
    }
}

/// Digests of an existing file, read in `chunk_size` pieces.
pub async fn digest_file(path: &Path, chunk_size: usize) -> Result<IngestOutcome> {
    let mut file = File::open(path).await?;
    let mut digest = ContentDigest::default();
    loop {
        let chunk = read_up_to(&mut file, chunk_size.max(1)).await?;
        if chunk.is_empty() {
            break;
        }
        digest.update(&chunk);
    }
    Ok(digest.finish())
}

/// Size-bounded sink for object content. Exceeding the limit rolls the file
/// back: a created file is removed, an appended one truncated to its old
/// length.
pub struct ContentWriter {
    path: PathBuf,
    file: File,
    digest: ContentDigest,
    base_len: u64,
    created: bool,
    limit: u64,
}

impl ContentWriter {
    pub async fn create(path: &Path, limit: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            digest: ContentDigest::default(),
            base_len: 0,
            created: true,
            limit,
        })
    }

    /// Opens `path` for appending; the digests cover the existing bytes too.
    pub async fn append(path: &Path, limit: u64, chunk_size: usize) -> Result<Self> {
        let mut digest = ContentDigest::default();
        let mut existing = File::open(path).await?;
        loop {
            let chunk = read_up_to(&mut existing, chunk_size.max(1)).await?;
            if chunk.is_empty() {
                break;
            }
            digest.update(&chunk);
        }
        drop(existing);

        let file = OpenOptions::new().append(true).open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            base_len: digest.size,
            digest,
            created: false,
            limit,
        })
    }

    pub fn size(&self) -> u64 {
        self.digest.size
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let next = self.digest.size + chunk.len() as u64;
        if next > self.limit {
            self.rollback().await;
            return Err(OssError::InvalidArgument(format!(
                "object size exceeds the maximum of {} bytes",
                self.limit
            )));
        }
        if let Err(err) = self.file.write_all(chunk).await {
            self.rollback().await;
            return Err(err.into());
        }
        self.digest.update(chunk);
        Ok(())
    }

    pub async fn finish(mut self) -> Result<IngestOutcome> {
        self.file.flush().await?;
        self.file.sync_data().await?;
        let outcome = self.digest.finish();
        debug!(path = %self.path.display(), size = outcome.size, "content written");
        Ok(outcome)
    }

    /// Undoes everything written through this writer.
    pub async fn rollback(&mut self) {
        let result = if self.created {
            fs::remove_file(&self.path).await
        } else {
            self.file.set_len(self.base_len).await
        };
        if let Err(err) = result {
            warn!(path = %self.path.display(), error = %err, "failed to roll back partial content");
        }
    }
}

/// Streams `body` into `dest`, never holding more than `chunk_size` bytes.
pub async fn ingest<R>(body: &mut R, dest: &Path, limit: u64, chunk_size: usize) -> Result<IngestOutcome>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let writer = ContentWriter::create(dest, limit).await?;
    ingest_into(body, writer, chunk_size).await
}

pub async fn ingest_into<R>(body: &mut R, mut writer: ContentWriter, chunk_size: usize) -> Result<IngestOutcome>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        let chunk = match read_up_to(body, chunk_size.max(1)).await {
            Ok(chunk) => chunk,
            Err(err) => {
                writer.rollback().await;
                return Err(err.into());
            }
        };
        if chunk.is_empty() {
            break;
        }
        writer.write_chunk(&chunk).await?;
    }
    writer.finish().await
}

/// Drains a read session into `writer`.
pub async fn copy_into(reader: &mut ChunkReader, mut writer: ContentWriter) -> Result<IngestOutcome> {
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
    writer.finish().await
}
