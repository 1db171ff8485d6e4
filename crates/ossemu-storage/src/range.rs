//! `Range` / `x-oss-copy-source-range` header handling.

use ossemu_common::error::{OssError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=S-E` or `bytes=S-`; an omitted end means "to the last byte".
    FromTo { start: u64, end: Option<u64> },
    /// `bytes=-N`: the final `N` bytes.
    Suffix(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    /// Inclusive.
    pub end: u64,
    pub total: u64,
}

impl ResolvedRange {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

impl ByteRange {
    pub fn parse(header: &str) -> Result<Self> {
        let invalid = || OssError::InvalidArgument(format!("invalid range: {header}"));

        let value = header.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
        let (start, end) = value.split_once('-').ok_or_else(invalid)?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(invalid()),
            (true, false) => end.parse().map(Self::Suffix).map_err(|_| invalid()),
            (false, _) => {
                let start = start.parse().map_err(|_| invalid())?;
                let end = if end.is_empty() {
                    None
                } else {
                    Some(end.parse().map_err(|_| invalid())?)
                };
                Ok(Self::FromTo { start, end })
            }
        }
    }

    /// Resolves against an object of `total` bytes. An end past the last byte
    /// is clamped; `None` means the range can not be satisfied.
    pub fn resolve(&self, total: u64) -> Option<ResolvedRange> {
        if total == 0 {
            return None;
        }
        let last = total - 1;
        let (start, end) = match *self {
            Self::FromTo { start, end } => (start, end.map_or(last, |e| e.min(last))),
            Self::Suffix(0) => return None,
            Self::Suffix(n) => (total.saturating_sub(n), last),
        };
        if start > end {
            return None;
        }
        Some(ResolvedRange { start, end, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_zero_end_is_a_single_byte() {
        let range = ByteRange::parse("bytes=0-0").unwrap();
        let resolved = range.resolve(10).unwrap();
        assert_eq!((resolved.start, resolved.end, resolved.length()), (0, 0, 1));
        assert_eq!(resolved.content_range(), "bytes 0-0/10");
    }

    #[test]
    fn omitted_end_reads_to_last_byte() {
        let resolved = ByteRange::parse("bytes=4-").unwrap().resolve(10).unwrap();
        assert_eq!((resolved.start, resolved.end), (4, 9));
    }

    #[test]
    fn suffix_and_clamped_ranges() {
        let suffix = ByteRange::parse("bytes=-3").unwrap().resolve(10).unwrap();
        assert_eq!((suffix.start, suffix.end), (7, 9));

        let clamped = ByteRange::parse("bytes=8-100").unwrap().resolve(10).unwrap();
        assert_eq!((clamped.start, clamped.end, clamped.length()), (8, 9, 2));
    }

    #[test]
    fn unsatisfiable_and_malformed_ranges() {
        assert!(ByteRange::parse("bytes=10-12").unwrap().resolve(10).is_none());
        assert!(ByteRange::parse("bytes=5-2").unwrap().resolve(10).is_none());
        assert!(ByteRange::parse("bytes=0-0").unwrap().resolve(0).is_none());
        assert!(ByteRange::parse("items=0-1").is_err());
        assert!(ByteRange::parse("bytes=-").is_err());
        assert!(ByteRange::parse("bytes=a-b").is_err());
    }
}
