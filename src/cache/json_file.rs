//! File-backed cache store.
//!
//! The whole table is loaded on open and written back on
//! [`CacheStore::flush`](super::CacheStore::flush) as a pretty-printed JSON array. Writes go to a
//! sibling temp file that is renamed over the target, so a crash mid-write
//! leaves the previous document intact.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::models::CacheEntry;

use super::CacheError;
use super::table::{CacheTable, TableBacked};

/// Cache store persisted as one JSON document.
#[derive(Debug)]
pub struct JsonFileCacheStore {
    path: PathBuf,
    table: Mutex<CacheTable>,
}

impl JsonFileCacheStore {
    /// Open the cache document at `path`; a missing file is an empty cache.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    #[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries: Vec<CacheEntry> = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Cache file does not exist yet; starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(entries = entries.len(), "Opened cache file");
        Ok(Self {
            path,
            table: Mutex::new(CacheTable::from_entries(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TableBacked for JsonFileCacheStore {
    fn table(&self) -> &Mutex<CacheTable> {
        &self.table
    }

    #[instrument(level = "info", skip(self, table), fields(path = %self.path.display()))]
    async fn persist(&self, table: &mut CacheTable) -> Result<(), CacheError> {
        if !table.is_dirty() {
            debug!("Cache unchanged; skipping write");
            return Ok(());
        }

        let entries = table.snapshot();
        let json = serde_json::to_vec_pretty(&entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        fs::write(&temp, json).await?;
        fs::rename(&temp, &self.path).await?;
        table.mark_clean();

        info!(entries = entries.len(), "Wrote cache file");
        Ok(())
    }
}
