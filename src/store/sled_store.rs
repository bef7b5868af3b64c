//! A `KVStore` backed by the `sled` embedded database.

use sled::Db;

use super::KVStore;
use crate::Result;

/// A key-value store backed by `sled`. `sled::Db` is internally
/// `Arc`-based, so cloning is cheap and thread-safe by construction.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Wraps an already-opened `sled::Db`.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Opens a `sled::Db` at `path` and wraps it.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(sled::open(path)?))
    }
}

impl KVStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?.map(|ivec| ivec.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.db
            .scan_prefix(prefix.as_bytes())
            .map(|entry| {
                let (key, _) = entry?;
                String::from_utf8(key.to_vec()).map_err(Into::into)
            })
            .collect()
    }
}
