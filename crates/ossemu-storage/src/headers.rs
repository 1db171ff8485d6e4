use std::collections::BTreeMap;

use http::header::{
    CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderName, RANGE,
    TRANSFER_ENCODING,
};
use http::{HeaderMap, HeaderValue};
use ossemu_common::error::{OssError, Result};

use crate::range::ByteRange;

pub const META_PREFIX: &str = "x-oss-meta-";
pub const COPY_SOURCE_RANGE: &str = "x-oss-copy-source-range";
pub const METADATA_DIRECTIVE: &str = "x-oss-metadata-directive";
pub const OBJECT_ACL: &str = "x-oss-object-acl";
pub const BUCKET_ACL: &str = "x-oss-acl";
pub const SYMLINK_TARGET: &str = "x-oss-symlink-target";

/// How the size of a request body is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLength {
    Declared(u64),
    Chunked,
}

/// Header view handed over by the request layer.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    map: HeaderMap,
}

impl From<HeaderMap> for RequestHeaders {
    fn from(map: HeaderMap) -> Self {
        Self { map }
    }
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| OssError::InvalidArgument(format!("invalid header name {name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| OssError::InvalidArgument(format!("invalid header value: {err}")))?;
        self.map.insert(name, value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Exactly one of a content length or chunked transfer encoding is
    /// accepted; a declared length above `max_size` is refused up front.
    pub fn payload_length(&self, max_size: u64) -> Result<PayloadLength> {
        if let Some(value) = self.get(CONTENT_LENGTH.as_str()) {
            let declared: u64 = value
                .parse()
                .map_err(|_| OssError::InvalidArgument(format!("invalid content-length: {value}")))?;
            if declared > max_size {
                return Err(OssError::InvalidArgument(format!(
                    "object size {declared} exceeds the maximum of {max_size}"
                )));
            }
            return Ok(PayloadLength::Declared(declared));
        }

        match self.get(TRANSFER_ENCODING.as_str()) {
            Some(encoding) if encoding.eq_ignore_ascii_case("chunked") => Ok(PayloadLength::Chunked),
            _ => Err(OssError::MissingContentLength),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE.as_str())
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.get(CONTENT_ENCODING.as_str())
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.get(CONTENT_DISPOSITION.as_str())
    }

    pub fn range(&self) -> Result<Option<ByteRange>> {
        self.get(RANGE.as_str()).map(ByteRange::parse).transpose()
    }

    pub fn copy_source_range(&self) -> Result<Option<ByteRange>> {
        self.get(COPY_SOURCE_RANGE).map(ByteRange::parse).transpose()
    }

    pub fn replaces_metadata(&self) -> bool {
        self.get(METADATA_DIRECTIVE)
            .is_some_and(|directive| directive.eq_ignore_ascii_case("REPLACE"))
    }

    pub fn object_acl(&self) -> Option<&str> {
        self.get(OBJECT_ACL)
    }

    pub fn bucket_acl(&self) -> Option<&str> {
        self.get(BUCKET_ACL)
    }

    pub fn symlink_target(&self) -> Option<&str> {
        self.get(SYMLINK_TARGET)
    }

    /// `x-oss-meta-*` headers keyed by their full lowercase header name.
    pub fn custom_metadata(&self) -> BTreeMap<String, String> {
        self.map
            .iter()
            .filter(|(name, _)| name.as_str().starts_with(META_PREFIX))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_length_requires_length_or_chunked() {
        let none = RequestHeaders::new();
        assert!(matches!(none.payload_length(10), Err(OssError::MissingContentLength)));

        let gzip = RequestHeaders::new().with("transfer-encoding", "gzip").unwrap();
        assert!(matches!(gzip.payload_length(10), Err(OssError::MissingContentLength)));

        let chunked = RequestHeaders::new().with("transfer-encoding", "chunked").unwrap();
        assert_eq!(chunked.payload_length(10).unwrap(), PayloadLength::Chunked);

        let declared = RequestHeaders::new().with("content-length", "10").unwrap();
        assert_eq!(declared.payload_length(10).unwrap(), PayloadLength::Declared(10));
    }

    #[test]
    fn declared_length_over_limit_is_invalid_argument() {
        let headers = RequestHeaders::new().with("content-length", "11").unwrap();
        let err = headers.payload_length(10).unwrap_err();
        assert_eq!(err.error_code(), "InvalidArgument");
    }

    #[test]
    fn collects_custom_metadata_verbatim() {
        let headers = RequestHeaders::new()
            .with("x-oss-meta-author", "alice")
            .unwrap()
            .with("x-oss-meta-Project", "demo")
            .unwrap()
            .with("content-type", "text/plain")
            .unwrap();
        let meta = headers.custom_metadata();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta["x-oss-meta-author"], "alice");
        assert_eq!(meta["x-oss-meta-project"], "demo");
        assert_eq!(headers.content_type(), Some("text/plain"));
    }

    #[test]
    fn parses_ranges_and_directives() {
        let headers = RequestHeaders::new()
            .with("range", "bytes=1-2")
            .unwrap()
            .with(COPY_SOURCE_RANGE, "bytes=0-9")
            .unwrap()
            .with(METADATA_DIRECTIVE, "replace")
            .unwrap();
        assert_eq!(
            headers.range().unwrap(),
            Some(ByteRange::FromTo { start: 1, end: Some(2) })
        );
        assert!(headers.copy_source_range().unwrap().is_some());
        assert!(headers.replaces_metadata());
        assert!(RequestHeaders::new().range().unwrap().is_none());
    }
}
