pub mod bucket;
pub mod chunk;
pub mod config;
pub mod headers;
pub mod ingest;
pub mod layout;
pub mod list;
pub mod meta;
pub mod multipart;
pub mod object;
pub mod range;
pub mod store;
pub mod validate;

pub use chunk::{ChunkReader, ReadMode, ReadSpan, ReadTarget};
pub use config::StoreConfig;
pub use headers::{PayloadLength, RequestHeaders};
pub use list::{
    ListObjectsPage, ListObjectsParams, ListObjectsV2Page, ListObjectsV2Params, ListUploadsPage,
    ListUploadsParams,
};
pub use multipart::{CompleteMultipartUpload, CompletedPart, ListPartsPage, ListPartsParams, PartInfo};
pub use object::{
    AppendOutput, DeleteObjectsOutput, DeleteObjectsRequest, GetObjectOptions, GetObjectOutput,
    PostObjectForm, PostObjectOutput,
};
pub use range::ByteRange;
pub use store::OssStore;
