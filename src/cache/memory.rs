//! Non-persistent cache store.

use tokio::sync::Mutex;

use crate::models::CacheEntry;

use super::table::{CacheTable, TableBacked};

/// Cache store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    table: Mutex<CacheTable>,
}

impl MemoryCacheStore {
    /// Store seeded with `entries`, keyed by their `url_hash`.
    pub fn with_entries(entries: Vec<CacheEntry>) -> Self {
        Self {
            table: Mutex::new(CacheTable::from_entries(entries)),
        }
    }

    /// Every entry, valid or not.
    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        self.table.lock().await.snapshot()
    }
}

impl TableBacked for MemoryCacheStore {
    fn table(&self) -> &Mutex<CacheTable> {
        &self.table
    }
}
