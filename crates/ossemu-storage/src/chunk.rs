//! Pull-based chunked reads over stored content.
//!
//! A [`ChunkReader`] is opened over either a single content file or a
//! directory of numbered part files, optionally restricted to a byte window,
//! and then drained with [`ChunkReader::next_chunk`] until it yields `None`.
//! Sessions are forward-only: re-reading requires opening a new reader.
//!
//! The part list and part sizes are captured when the reader is opened;
//! later changes to the files are not tracked.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use ossemu_common::error::Result;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::layout::part_number_of;
use crate::range::ResolvedRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    /// One content file.
    File(PathBuf),
    /// Every `content-<n>` file inside a directory, concatenated by `n`.
    Parts(PathBuf),
}

/// Byte window of a ranged read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSpan {
    pub start: u64,
    pub length: u64,
}

impl From<ResolvedRange> for ReadSpan {
    fn from(range: ResolvedRange) -> Self {
        Self {
            start: range.start,
            length: range.length(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    SingleWhole,
    SingleRange,
    MultipartWhole,
    MultipartRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFile {
    pub number: u32,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug)]
enum State {
    SingleWhole {
        file: File,
    },
    SingleRange {
        file: File,
        start: u64,
        remaining: u64,
        positioned: bool,
    },
    MultipartWhole {
        parts: Vec<PartFile>,
        index: usize,
        current: Option<File>,
    },
    MultipartRange {
        parts: Vec<PartFile>,
        abs_pos: u64,
        remaining: u64,
    },
    Finished,
}

#[derive(Debug)]
pub struct ChunkReader {
    chunk_size: usize,
    mode: ReadMode,
    state: State,
}

impl ChunkReader {
    pub async fn open(target: ReadTarget, span: Option<ReadSpan>, chunk_size: usize) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let (mode, state) = match (target, span) {
            (ReadTarget::File(path), None) => {
                let file = File::open(&path).await?;
                (ReadMode::SingleWhole, State::SingleWhole { file })
            }
            (ReadTarget::File(path), Some(span)) => {
                let file = File::open(&path).await?;
                (
                    ReadMode::SingleRange,
                    State::SingleRange {
                        file,
                        start: span.start,
                        remaining: span.length,
                        positioned: false,
                    },
                )
            }
            (ReadTarget::Parts(dir), None) => {
                let parts = discover_parts(&dir).await?;
                (
                    ReadMode::MultipartWhole,
                    State::MultipartWhole {
                        parts,
                        index: 0,
                        current: None,
                    },
                )
            }
            (ReadTarget::Parts(dir), Some(span)) => {
                let parts = discover_parts(&dir).await?;
                (
                    ReadMode::MultipartRange,
                    State::MultipartRange {
                        parts,
                        abs_pos: span.start,
                        remaining: span.length,
                    },
                )
            }
        };

        debug!(?mode, ?span, chunk_size, "opened chunk reader");
        Ok(Self {
            chunk_size,
            mode,
            state,
        })
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Next chunk of at most `chunk_size` bytes; `None` once exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let chunk_size = self.chunk_size;
        let chunk = match &mut self.state {
            State::Finished => None,
            State::SingleWhole { file } => {
                let chunk = read_up_to(file, chunk_size).await?;
                (!chunk.is_empty()).then_some(chunk)
            }
            State::SingleRange {
                file,
                start,
                remaining,
                positioned,
            } => {
                if *remaining == 0 {
                    None
                } else {
                    if !*positioned {
                        file.seek(SeekFrom::Start(*start)).await?;
                        *positioned = true;
                    }
                    let want = budget(*remaining, chunk_size);
                    let chunk = read_up_to(file, want).await?;
                    if chunk.len() < want {
                        // past end of file: truncate instead of failing
                        *remaining = 0;
                    } else {
                        *remaining -= chunk.len() as u64;
                    }
                    (!chunk.is_empty()).then_some(chunk)
                }
            }
            State::MultipartWhole {
                parts,
                index,
                current,
            } => next_whole_part_chunk(parts, index, current, chunk_size).await?,
            State::MultipartRange {
                parts,
                abs_pos,
                remaining,
            } => next_ranged_part_chunk(parts, abs_pos, remaining, chunk_size).await?,
        };

        if chunk.is_none() {
            self.state = State::Finished;
        }
        Ok(chunk)
    }

    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Adapts the session into a stream for a transport body; the stream ends
    /// after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(reader))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

/// Part files in `dir`, ordered by their numeric suffix with sizes captured.
pub async fn discover_parts(dir: &Path) -> Result<Vec<PartFile>> {
    let mut parts = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(parts),
        Err(err) => return Err(err.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(number) = part_number_of(&name.to_string_lossy()) else {
            continue;
        };
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        parts.push(PartFile {
            number,
            path: entry.path(),
            size: metadata.len(),
        });
    }

    parts.sort_by_key(|part| part.number);
    Ok(parts)
}

async fn next_whole_part_chunk(
    parts: &[PartFile],
    index: &mut usize,
    current: &mut Option<File>,
    chunk_size: usize,
) -> Result<Option<Bytes>> {
    loop {
        if current.is_none() {
            let Some(part) = parts.get(*index) else {
                return Ok(None);
            };
            *current = Some(File::open(&part.path).await?);
        }
        let Some(file) = current.as_mut() else {
            return Ok(None);
        };

        let chunk = read_up_to(file, chunk_size).await?;
        if chunk.len() < chunk_size {
            *current = None;
            *index += 1;
        }
        if !chunk.is_empty() {
            return Ok(Some(chunk));
        }
    }
}

async fn next_ranged_part_chunk(
    parts: &[PartFile],
    abs_pos: &mut u64,
    remaining: &mut u64,
    chunk_size: usize,
) -> Result<Option<Bytes>> {
    if *remaining == 0 || parts.is_empty() {
        return Ok(None);
    }

    let want = budget(*remaining, chunk_size);

    let mut index = 0;
    let mut offset = *abs_pos;
    while let Some(part) = parts.get(index) {
        if offset < part.size {
            break;
        }
        offset -= part.size;
        index += 1;
    }

    let mut out = BytesMut::with_capacity(want);
    while out.len() < want {
        let Some(part) = parts.get(index) else {
            break;
        };
        let mut file = File::open(&part.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let read = read_up_to(&mut file, want - out.len()).await?;
        out.extend_from_slice(&read);

        index += 1;
        offset = 0;
    }

    if out.is_empty() {
        *remaining = 0;
        return Ok(None);
    }

    *abs_pos += out.len() as u64;
    *remaining -= out.len() as u64;
    Ok(Some(out.freeze()))
}

fn budget(remaining: u64, chunk_size: usize) -> usize {
    usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size))
}

/// Reads until `limit` bytes are collected or the reader is exhausted.
pub(crate) async fn read_up_to<R>(reader: &mut R, limit: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(limit);
    while buf.len() < limit {
        let left = (limit - buf.len()) as u64;
        let n = (&mut *reader).take(left).read_buf(&mut buf).await?;
        if n == 0 {
            break;
        }
    }
    Ok(buf.freeze())
}
