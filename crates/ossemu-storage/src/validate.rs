use ossemu_common::error::{OssError, Result};

use crate::layout::is_reserved_segment;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const OBJECT_KEY_MAX_LEN: usize = 1023;

pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    let invalid = || OssError::InvalidBucketName(bucket.to_string());

    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&bucket.len()) {
        return Err(invalid());
    }
    if !bucket
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid());
    }
    if bucket.starts_with('-') || bucket.ends_with('-') {
        return Err(invalid());
    }
    Ok(())
}

/// Keys become directory paths, so segments the layout reserves are refused
/// along with anything that could escape the bucket directory.
pub fn validate_object_key(key: &str) -> Result<()> {
    let invalid = || OssError::InvalidObjectName(key.to_string());

    if key.is_empty() || key.len() > OBJECT_KEY_MAX_LEN {
        return Err(invalid());
    }
    if key.starts_with('/') || key.contains('\\') || key.contains('\0') {
        return Err(invalid());
    }

    let trimmed = key.strip_suffix('/').unwrap_or(key);
    for segment in trimmed.split('/') {
        if segment.is_empty() || is_reserved_segment(segment) {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_follow_service_rules() {
        for name in ["abc", "my-bucket-01", "a".repeat(63).as_str()] {
            assert!(validate_bucket_name(name).is_ok(), "{name}");
        }
        for name in ["ab", "-abc", "abc-", "ABC", "a_b_c", "a.b.c", "a".repeat(64).as_str()] {
            assert!(validate_bucket_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn object_keys_reject_traversal_and_reserved_segments() {
        for key in ["a", "dir/file.txt", "dir/", "with space", "deep/er/key"] {
            assert!(validate_object_key(key).is_ok(), "{key}");
        }
        for key in [
            "",
            "/abs",
            "a\\b",
            "../escape",
            "a/./b",
            "a//b",
            "x/.multipart/y",
            "x/metadata",
            "content-2",
        ] {
            let err = validate_object_key(key).unwrap_err();
            assert_eq!(err.error_code(), "InvalidObjectName", "{key}");
        }
        assert!(validate_object_key(&"k".repeat(1024)).is_err());
    }
}
