//! Runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheStore, DiskCacheStore, MemoryCacheStore};
use crate::{Error, Result};

pub const DEFAULT_MAX_ENTRIES: u64 = 1024;

/// Where filtered graphs are cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheConfig {
    /// In-process, bounded by entry count.
    Memory {
        #[serde(default = "default_max_entries")]
        max_entries: u64,
        #[serde(default)]
        ttl_seconds: Option<u64>,
    },
    /// One file per entry under `dir`.
    Disk {
        dir: PathBuf,
        #[serde(default)]
        ttl_seconds: Option<u64>,
    },
}

fn default_max_entries() -> u64 {
    DEFAULT_MAX_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory { max_entries: DEFAULT_MAX_ENTRIES, ttl_seconds: None }
    }
}

impl CacheConfig {
    pub fn open_store(&self) -> Result<Box<dyn CacheStore>> {
        Ok(match self {
            CacheConfig::Memory { max_entries, ttl_seconds } => Box::new(MemoryCacheStore::new(
                *max_entries,
                ttl_seconds.map(Duration::from_secs),
            )),
            CacheConfig::Disk { dir, ttl_seconds } => Box::new(DiskCacheStore::open(
                dir.clone(),
                ttl_seconds.map(Duration::from_secs),
            )?),
        })
    }
}

/// Top-level settings for an [`crate::Explorer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Keep the temporary blob directory on shutdown.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Persistent blob directory; a temporary one when unset.
    #[serde(default)]
    pub blob_root: Option<PathBuf>,
}

impl ExplorerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read `BIOGRAPH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ExplorerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let debug = match lookup("BIOGRAPH_DEBUG") {
            Some(v) => parse_bool("BIOGRAPH_DEBUG", &v)?,
            None => false,
        };
        let ttl_seconds = lookup("BIOGRAPH_CACHE_TTL_SECONDS")
            .map(|v| parse_u64("BIOGRAPH_CACHE_TTL_SECONDS", &v))
            .transpose()?;
        let cache = match lookup("BIOGRAPH_CACHE_DIR") {
            Some(dir) => CacheConfig::Disk { dir: dir.into(), ttl_seconds },
            None => CacheConfig::Memory {
                max_entries: lookup("BIOGRAPH_CACHE_MAX_ENTRIES")
                    .map(|v| parse_u64("BIOGRAPH_CACHE_MAX_ENTRIES", &v))
                    .transpose()?
                    .unwrap_or(DEFAULT_MAX_ENTRIES),
                ttl_seconds,
            },
        };
        let blob_root = lookup("BIOGRAPH_BLOB_ROOT").map(PathBuf::from);
        Ok(Self { debug, cache, blob_root })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::ConfigError(format!("{name}: expected a boolean, got '{other}'"))),
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("{name}: expected an integer, got '{value}'")))
}
