//! Store configuration.
//!
//! A [`StoreConfig`] is handed to [`crate::OssStore::new`]; nothing in the
//! storage crate reads process-wide settings on its own, so independent
//! stores can coexist in one process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_MAX_BUCKETS: usize = 100;
pub const DEFAULT_STORE_ROOT: &str = "./store";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per bucket.
    pub root: PathBuf,
    /// Hard ceiling for a single object or part, checked against declared and received bytes.
    pub max_object_size: u64,
    /// Largest chunk produced by readers and used when streaming bodies to disk.
    pub chunk_size: usize,
    pub max_buckets: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORE_ROOT),
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Reads `OSSEMU_STORE`, `OSSEMU_MAX_OBJECT_SIZE`, `OSSEMU_CHUNK_SIZE` and
    /// `OSSEMU_MAX_BUCKETS`, keeping defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("OSSEMU_STORE") {
            if !v.is_empty() {
                config.root = PathBuf::from(v);
            }
        }
        if let Some(n) = env_number::<u64>("OSSEMU_MAX_OBJECT_SIZE") {
            config.max_object_size = n;
        }
        if let Some(n) = env_number::<usize>("OSSEMU_CHUNK_SIZE") {
            config.chunk_size = n;
        }
        if let Some(n) = env_number::<usize>("OSSEMU_MAX_BUCKETS") {
            config.max_buckets = n;
        }

        config
    }

    pub fn with_max_object_size(mut self, max_object_size: u64) -> Self {
        self.max_object_size = max_object_size;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
