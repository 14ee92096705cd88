// ============================================================================
// Opaque Store - string key/value persistence (redb)
// ============================================================================
// Best-effort local storage for user preferences such as the wanted set.
// The file location comes from `ShopwatchConfig::store_path`.
// ============================================================================

mod memory;

pub use memory::MemoryStore;

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KV: TableDefinition<&str, &str> = TableDefinition::new("kv");

/// Opaque get/set string store
pub trait OpaqueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Embedded file-backed store
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the store file, creating its directory if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow!("Failed to create {}: {}", dir.display(), e))?;
        }

        let db = Database::create(&path)
            .map_err(|e| anyhow!("Failed to open store {}: {}", path.display(), e))?;
        let store = Self { db, path };
        store.ensure_table()?;
        info!("Opened store at {}", store.path.display());
        Ok(store)
    }

    fn ensure_table(&self) -> Result<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        txn.open_table(KV)
            .map_err(|e| anyhow!("Failed to create kv table: {}", e))?;
        txn.commit()
            .map_err(|e| anyhow!("Failed to commit kv table: {}", e))
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored keys
    pub fn len(&self) -> Result<u64> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(KV)
            .map_err(|e| anyhow!("Failed to open kv table: {}", e))?;
        table.len().map_err(|e| anyhow!("Failed to count keys: {}", e))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl OpaqueStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(KV)
            .map_err(|e| anyhow!("Failed to open kv table: {}", e))?;

        let value = table
            .get(key)
            .map_err(|e| anyhow!("Failed to get {}: {}", key, e))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(KV)
                .map_err(|e| anyhow!("Failed to open kv table: {}", e))?;
            table
                .insert(key, value)
                .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
        }
        write_txn
            .commit()
            .map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored key: {}", key);
        Ok(())
    }
}
