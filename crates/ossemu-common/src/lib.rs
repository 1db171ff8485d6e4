pub mod error;
pub mod time;
pub mod types;

pub use error::{OssError, Result};
pub use types::{BucketMetadata, ObjectMetadata, UploadMetadata};
