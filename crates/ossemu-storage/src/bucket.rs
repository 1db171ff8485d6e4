use ossemu_common::error::{OssError, Result};
use ossemu_common::types::BucketMetadata;
use tokio::fs;
use tracing::{debug, info};

use crate::headers::RequestHeaders;
use crate::layout::BUCKET_METADATA;
use crate::list::walk_records;
use crate::meta;
use crate::store::OssStore;
use crate::validate::validate_bucket_name;

pub const DEFAULT_BUCKET_ACL: &str = "private";

impl OssStore {
    /// Creating a bucket that already exists returns its record unchanged.
    pub async fn create_bucket(&self, bucket: &str, headers: &RequestHeaders) -> Result<BucketMetadata> {
        validate_bucket_name(bucket)?;

        let path = self.layout().bucket_metadata(bucket);
        if let Some(existing) = meta::read_record::<BucketMetadata>(&path).await? {
            debug!(bucket, "bucket already exists");
            return Ok(existing);
        }

        let limit = self.config().max_buckets;
        if self.bucket_names().await?.len() >= limit {
            return Err(OssError::TooManyBuckets { limit });
        }

        let record = BucketMetadata {
            bucket: bucket.to_string(),
            creation_date: ossemu_common::time::now(),
            acl: headers.bucket_acl().map(str::to_string),
        };
        meta::write_record(&path, &record).await?;
        info!(bucket, "bucket created");
        Ok(record)
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketMetadata>> {
        let mut buckets = Vec::new();
        for name in self.bucket_names().await? {
            if let Some(record) = meta::read_record(&self.layout().bucket_metadata(&name)).await? {
                buckets.push(record);
            }
        }
        Ok(buckets)
    }

    pub async fn get_bucket_info(&self, bucket: &str) -> Result<BucketMetadata> {
        self.ensure_bucket(bucket).await?;
        meta::load_record(&self.layout().bucket_metadata(bucket), || {
            OssError::NoSuchBucket(bucket.to_string())
        })
        .await
    }

    pub async fn put_bucket_acl(&self, bucket: &str, acl: &str) -> Result<BucketMetadata> {
        self.ensure_bucket(bucket).await?;
        meta::update_record(
            &self.layout().bucket_metadata(bucket),
            || OssError::NoSuchBucket(bucket.to_string()),
            |record: &mut BucketMetadata| record.acl = Some(acl.to_string()),
        )
        .await
    }

    pub async fn get_bucket_acl(&self, bucket: &str) -> Result<String> {
        let record = self.get_bucket_info(bucket).await?;
        Ok(record.acl.unwrap_or_else(|| DEFAULT_BUCKET_ACL.to_string()))
    }

    /// Refused while any object or in-flight upload remains.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.ensure_bucket(bucket).await?;

        let bucket_dir = self.layout().bucket_dir(bucket);
        if !walk_records(&bucket_dir).await?.is_empty() {
            return Err(OssError::BucketNotEmpty(bucket.to_string()));
        }

        fs::remove_dir_all(&bucket_dir).await?;
        info!(bucket, "bucket deleted");
        Ok(())
    }

    /// Names of directories under the root that carry a bucket record, sorted.
    async fn bucket_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.layout().root()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if !meta::exists(&entry.path().join(BUCKET_METADATA)).await? {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use ossemu_common::types::UploadMetadata;

    use super::*;
    use crate::config::StoreConfig;

    async fn store(max_buckets: usize) -> (tempfile::TempDir, OssStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path()).with_max_buckets(max_buckets);
        let store = OssStore::new(config).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn create_is_idempotent_and_listing_is_sorted() {
        let (_dir, store) = store(10).await;
        let headers = RequestHeaders::new().with("x-oss-acl", "public-read").unwrap();
        let first = store.create_bucket("zeta", &headers).await.unwrap();
        let again = store.create_bucket("zeta", &RequestHeaders::new()).await.unwrap();
        assert_eq!(first, again);
        store.create_bucket("alpha", &RequestHeaders::new()).await.unwrap();

        let names: Vec<_> = store
            .list_buckets()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.bucket)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(store.get_bucket_acl("zeta").await.unwrap(), "public-read");
        assert_eq!(store.get_bucket_acl("alpha").await.unwrap(), DEFAULT_BUCKET_ACL);
    }

    #[tokio::test]
    async fn enforces_naming_and_bucket_ceiling() {
        let (_dir, store) = store(1).await;
        let err = store.create_bucket("Bad_Name", &RequestHeaders::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "InvalidBucketName");

        store.create_bucket("one", &RequestHeaders::new()).await.unwrap();
        let err = store.create_bucket("two", &RequestHeaders::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "TooManyBuckets");
        store.create_bucket("one", &RequestHeaders::new()).await.unwrap();
    }

    #[tokio::test]
    async fn acl_round_trip_and_missing_bucket() {
        let (_dir, store) = store(10).await;
        store.create_bucket("acl", &RequestHeaders::new()).await.unwrap();
        store.put_bucket_acl("acl", "public-read-write").await.unwrap();
        assert_eq!(store.get_bucket_acl("acl").await.unwrap(), "public-read-write");

        let err = store.get_bucket_info("nope").await.unwrap_err();
        assert_eq!(err.error_code(), "NoSuchBucket");
        let err = store.delete_bucket("nope").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn delete_refuses_buckets_with_uploads() {
        let (_dir, store) = store(10).await;
        store.create_bucket("busy", &RequestHeaders::new()).await.unwrap();
        let upload = UploadMetadata {
            bucket: "busy".to_string(),
            key: "k".to_string(),
            upload_id: "u1".to_string(),
            initiated: ossemu_common::time::now(),
            storage_class: "Standard".to_string(),
            content_type: None,
        };
        let path = store.layout().upload_metadata("busy", "k", "u1");
        meta::write_record(&path, &upload).await.unwrap();

        let err = store.delete_bucket("busy").await.unwrap_err();
        assert_eq!(err.error_code(), "BucketNotEmpty");

        fs::remove_dir_all(store.layout().object_dir("busy", "k")).await.unwrap();
        store.delete_bucket("busy").await.unwrap();
        assert!(store.list_buckets().await.unwrap().is_empty());
    }
}
