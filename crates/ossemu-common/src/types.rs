//! Records persisted beside buckets, objects and uploads.
//!
//! Records are YAML mappings keyed by `:name` symbols, so stores written by
//! earlier emulator releases load unchanged and stay readable to them.
//! Numbers written as strings and header lists in place of a single value
//! are accepted on read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::time::iso8601;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const DEFAULT_STORAGE_CLASS: &str = "Standard";

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_storage_class() -> String {
    DEFAULT_STORAGE_CLASS.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Text(String),
}

/// `12`, `'12'` and an empty value all load; the latter as zero.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Number::Int(n)) => Ok(n),
        Some(Number::Text(text)) if text.trim().is_empty() => Ok(0),
        Some(Number::Text(text)) => text.trim().parse().map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderText {
    One(String),
    Many(Vec<String>),
}

/// A header value stored either as a string or as the raw header list.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let text = match Option::<HeaderText>::deserialize(deserializer)? {
        None => None,
        Some(HeaderText::One(text)) => Some(text),
        Some(HeaderText::Many(values)) => values.into_iter().next(),
    };
    Ok(text.filter(|text| !text.is_empty()))
}

fn lenient_content_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_else(default_content_type))
}

fn lenient_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error> {
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMetadata {
    #[serde(rename = ":bucket")]
    pub bucket: String,
    #[serde(rename = ":creation_date", with = "iso8601")]
    pub creation_date: DateTime<Utc>,
    #[serde(
        rename = ":acl",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub acl: Option<String>,
}

/// Per-object record stored next to the object's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(rename = ":bucket")]
    pub bucket: String,
    #[serde(rename = ":object", default)]
    pub key: String,
    #[serde(rename = ":size", default, deserialize_with = "lenient_u64")]
    pub size: u64,
    /// Size of the first merged part; zero for objects not built by multipart upload.
    #[serde(rename = ":part_size", default, deserialize_with = "lenient_u64")]
    pub part_size: u64,
    #[serde(rename = ":md5", default)]
    pub md5: String,
    #[serde(rename = ":crc64", default, deserialize_with = "lenient_u64")]
    pub crc64: u64,
    #[serde(
        rename = ":content_type",
        default = "default_content_type",
        deserialize_with = "lenient_content_type"
    )]
    pub content_type: String,
    #[serde(
        rename = ":content_encoding",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_encoding: Option<String>,
    #[serde(
        rename = ":content_disposition",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_disposition: Option<String>,
    #[serde(rename = ":custom_metadata", default, deserialize_with = "lenient_map")]
    pub custom_metadata: BTreeMap<String, String>,
    #[serde(rename = ":creation_date", with = "iso8601")]
    pub creation_date: DateTime<Utc>,
    #[serde(rename = ":modified_date", with = "iso8601")]
    pub modified_date: DateTime<Utc>,
    #[serde(rename = ":appendable", default)]
    pub appendable: bool,
    #[serde(
        rename = ":acl",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub acl: Option<String>,
    #[serde(rename = ":symlink", default, skip_serializing_if = "std::ops::Not::not")]
    pub symlink: bool,
    #[serde(
        rename = ":symlink_target",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub symlink_target: Option<String>,
    #[serde(rename = ":restore", default)]
    pub restore: bool,
    #[serde(
        rename = ":restore_date",
        default,
        with = "iso8601::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub restore_date: Option<DateTime<Utc>>,
    #[serde(rename = ":storage_class", default = "default_storage_class")]
    pub storage_class: String,
}

impl ObjectMetadata {
    pub fn is_multipart(&self) -> bool {
        self.part_size > 0
    }
}

/// Record persisted for every in-flight multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    #[serde(rename = ":bucket")]
    pub bucket: String,
    #[serde(rename = ":object")]
    pub key: String,
    #[serde(rename = ":upload_id")]
    pub upload_id: String,
    #[serde(rename = ":initiated", with = "iso8601")]
    pub initiated: DateTime<Utc>,
    #[serde(rename = ":storage_class", default = "default_storage_class")]
    pub storage_class: String,
    #[serde(
        rename = ":content_type",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
}
