//! The `KVStore` capability trait: the common surface the durable tier of
//! the filesystem is built on, plus two reference backends.

use crate::Result;

mod bitcask;
mod sled_store;

pub use bitcask::BitcaskStore;
pub use sled_store::SledStore;

/// A byte-oriented, prefix-listable key-value store.
///
/// Implementors must be cheaply cloneable (typically `Arc`-backed
/// internally) and safe to share across threads, since `TieredFS` fans
/// writes out across tiers concurrently.
pub trait KVStore: Clone + Send + Sync + 'static {
    /// Reads one value.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Reads many values in one call. Backends that can batch I/O
    /// (e.g. a single sled transaction) should override the default.
    fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Writes one value, creating or overwriting `key`.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Writes many values. Default implementation is not atomic across
    /// keys; backends that can batch should override.
    fn put_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        for (k, v) in entries {
            self.put(k, v)?;
        }
        Ok(())
    }

    /// Removes one key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Removes many keys.
    fn delete_many(&self, keys: &[String]) -> Result<()> {
        for k in keys {
            self.delete(k)?;
        }
        Ok(())
    }

    /// Removes every key under `prefix`.
    fn delete_all(&self, prefix: &str) -> Result<()> {
        for key in self.list(prefix)? {
            self.delete(&key)?;
        }
        Ok(())
    }

    /// Lists every key starting with `prefix`, in unspecified order.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}
