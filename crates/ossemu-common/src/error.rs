use thiserror::Error;

#[derive(Debug, Error)]
pub enum OssError {
    #[error("bucket not found: {0}")]
    NoSuchBucket(String),
    #[error("bucket is not empty: {0}")]
    BucketNotEmpty(String),
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),
    #[error("invalid object name: {0}")]
    InvalidObjectName(String),
    #[error("too many buckets: limit is {limit}")]
    TooManyBuckets { limit: usize },
    #[error("object not found: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },
    #[error("upload not found: {bucket}/{key} ({upload_id})")]
    NoSuchUpload {
        bucket: String,
        key: String,
        upload_id: String,
    },
    #[error("part does not exist: {part_number}")]
    FilePartNoExist { part_number: u32 },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("missing content length")]
    MissingContentLength,
    #[error("object is not appendable: {bucket}/{key}")]
    ObjectNotAppendable { bucket: String, key: String },
    #[error("position {position} is not equal to object length {length}")]
    PositionNotEqualToLength { position: u64, length: u64 },
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OssError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::BucketNotEmpty(_) => "BucketNotEmpty",
            Self::InvalidBucketName(_) => "InvalidBucketName",
            Self::InvalidObjectName(_) => "InvalidObjectName",
            Self::TooManyBuckets { .. } => "TooManyBuckets",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::FilePartNoExist { .. } => "FilePartNoExist",
            Self::BadRequest(_) => "BadRequest",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::MissingContentLength => "MissingContentLength",
            Self::ObjectNotAppendable { .. } => "ObjectNotAppendable",
            Self::PositionNotEqualToLength { .. } => "PositionNotEqualToLength",
            Self::InternalError(_) | Self::Io(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoSuchBucket(_) | Self::NoSuchKey { .. } | Self::NoSuchUpload { .. } => 404,
            Self::BucketNotEmpty(_)
            | Self::ObjectNotAppendable { .. }
            | Self::PositionNotEqualToLength { .. } => 409,
            Self::InvalidBucketName(_)
            | Self::InvalidObjectName(_)
            | Self::TooManyBuckets { .. }
            | Self::FilePartNoExist { .. }
            | Self::BadRequest(_)
            | Self::InvalidArgument(_) => 400,
            Self::MissingContentLength => 411,
            Self::InternalError(_) | Self::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, OssError>;
