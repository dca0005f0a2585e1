//! ACID-durable backing store backed by redb.
//!
//! Holds the persisted cache entries between runs. Every write is its own
//! transaction; reads use MVCC snapshots.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::StoreResult;
use crate::store::backing::{BackingStore, pattern_matches};

/// Table of persisted cache entries (string keys → bincode values).
const ENTRY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "grulia.redb";

fn redb_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{context} failed: {e}"),
    }
}

/// ACID-durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the table up front so read transactions never see it missing.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        txn.open_table(ENTRY_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        txn.commit().map_err(|e| redb_err("commit", e))?;

        Ok(Self { db: Arc::new(db) })
    }

}

impl BackingStore for DurableStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(ENTRY_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let result = table.get(key).map_err(|e| redb_err("get", e))?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        {
            let mut table = txn
                .open_table(ENTRY_TABLE)
                .map_err(|e| redb_err("open_table", e))?;
            table.insert(key, value).map_err(|e| redb_err("insert", e))?;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(())
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let Some(prefix) = pattern.strip_suffix('*') else {
            return Ok(self.get(pattern)?.map(|_| pattern.to_string()).into_iter().collect());
        };
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(ENTRY_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let mut keys = Vec::new();
        for item in table.range(prefix..).map_err(|e| redb_err("range", e))? {
            let (key, _) = item.map_err(|e| redb_err("range", e))?;
            let key = key.value();
            if !pattern_matches(pattern, key) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
