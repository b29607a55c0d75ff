//! On-disk cache store: one file per key.
//!
//! File layout: an RFC 3339 timestamp line, then the payload bytes.
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers never observe a half-written entry.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{CacheKey, CacheStore};
use crate::{Error, Result};

const ENTRY_EXT: &str = "entry";

pub struct DiskCacheStore {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl DiskCacheStore {
    /// Open (creating if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened disk cache");
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => {
                let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
                Utc::now().signed_duration_since(stored_at) > ttl
            }
            None => false,
        }
    }
}

fn split_entry(bytes: &[u8]) -> Result<(DateTime<Utc>, &[u8])> {
    let newline = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| Error::CacheError("cache entry missing header".into()))?;
    let header = std::str::from_utf8(&bytes[..newline])
        .map_err(|e| Error::CacheError(format!("cache entry header not UTF-8: {e}")))?;
    let stored_at = DateTime::parse_from_rfc3339(header)
        .map_err(|e| Error::CacheError(format!("bad cache entry timestamp '{header}': {e}")))?
        .with_timezone(&Utc);
    Ok((stored_at, &bytes[newline + 1..]))
}

impl CacheStore for DiskCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (stored_at, payload) = split_entry(&bytes)?;
        if self.is_expired(stored_at) {
            debug!(%key, "disk cache entry expired");
            // a concurrent writer may have replaced or removed it already
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(payload.to_vec()))
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        writeln!(tmp, "{}", Utc::now().to_rfc3339())?;
        tmp.write_all(&value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.entry_path(key)).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
                match fs::remove_file(&path) {
                    Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
