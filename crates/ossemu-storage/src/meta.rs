//! YAML records beside the stored content. See [`ossemu_common::types`]
//! for the record shapes.

use std::path::Path;

use ossemu_common::error::{OssError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

pub async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => serde_yaml::from_slice(&bytes).map(Some).map_err(|err| {
            OssError::InternalError(format!("failed to parse {}: {err}", path.display()))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(OssError::Io(err)),
    }
}

/// Like [`read_record`] but a missing record becomes `missing()`.
pub async fn load_record<T, F>(path: &Path, missing: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> OssError,
{
    read_record(path).await?.ok_or_else(missing)
}

pub async fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let text = serde_yaml::to_string(record).map_err(|err| {
        OssError::InternalError(format!("failed to serialize {}: {err}", path.display()))
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, text).await?;
    Ok(())
}

/// Read-modify-write of an existing record; returns the stored value.
pub async fn update_record<T, F, M>(path: &Path, missing: M, modify: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut T),
    M: FnOnce() -> OssError,
{
    let mut record: T = load_record(path, missing).await?;
    modify(&mut record);
    write_record(path, &record).await?;
    Ok(record)
}

pub async fn exists(path: &Path) -> Result<bool> {
    Ok(fs::try_exists(path).await?)
}

#[cfg(test)]
mod tests {
    use ossemu_common::types::UploadMetadata;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let record: Option<Record> = read_record(&dir.path().join("absent")).await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn update_rewrites_record_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata");
        write_record(&path, &Record { name: "a".to_string(), count: 1 })
            .await
            .unwrap();

        let updated: Record = update_record(
            &path,
            || OssError::InternalError("gone".to_string()),
            |r: &mut Record| r.count += 1,
        )
        .await
        .unwrap();
        assert_eq!(updated.count, 2);

        let stored: Record = load_record(&path, || OssError::InternalError("gone".to_string()))
            .await
            .unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn corrupt_record_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata");
        fs::write(&path, b": [unbalanced").await.unwrap();
        let err = read_record::<Record>(&path).await.unwrap_err();
        assert_eq!(err.error_code(), "InternalError");
    }

    #[tokio::test]
    async fn reads_upload_records_left_by_earlier_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata");
        fs::write(
            &path,
            "---\n:bucket: b\n:object: dir/k\n:upload_id: 9f86d081884c7d659a2feaa0c55ad015\n\
             :initiated: '2024-05-01T10:00:00.000Z'\n:storage_class: Standard\n:content_type: text/plain\n",
        )
        .await
        .unwrap();

        let record: UploadMetadata = load_record(&path, || OssError::InternalError("gone".to_string()))
            .await
            .unwrap();
        assert_eq!(record.key, "dir/k");
        assert_eq!(record.content_type.as_deref(), Some("text/plain"));

        write_record(&path, &record).await.unwrap();
        let text = fs::read_to_string(&path).await.unwrap();
        assert!(text.contains(":upload_id: 9f86d081884c7d659a2feaa0c55ad015"), "{text}");
        let reread: UploadMetadata = read_record(&path).await.unwrap().unwrap();
        assert_eq!(reread, record);
    }
}
