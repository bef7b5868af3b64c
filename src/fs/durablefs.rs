//! The durable `FileStore` tier: file content chunked over a `KVStore`,
//! keyed `meta::<path>` / `chunk::<path>::<i>` per spec §4.2.

use serde::{Deserialize, Serialize};

use super::{FileStore, CHUNK_SIZE};
use crate::store::KVStore;
use crate::{Result, VolumeError};

#[derive(Debug, Serialize, Deserialize)]
struct FileMeta {
    chunk_count: usize,
    len: usize,
}

fn meta_key(path: &str) -> String {
    format!("meta::{path}")
}

fn chunk_key(path: &str, idx: usize) -> String {
    format!("chunk::{path}::{idx}")
}

fn chunk_prefix(path: &str) -> String {
    format!("chunk::{path}::")
}

/// A `KVStore`-backed `FileStore`. File content is split into
/// `CHUNK_SIZE`-byte segments, each addressed by its own key, with a
/// small metadata record tracking chunk count so reads know how many
/// keys to fetch.
pub struct DurableFs<K: KVStore> {
    store: K,
}

impl<K: KVStore> DurableFs<K> {
    /// Wraps an already-opened `KVStore`.
    pub fn new(store: K) -> Self {
        Self { store }
    }
}

impl<K: KVStore> FileStore for DurableFs<K> {
    fn read_file(&self, path: &str) -> Result<String> {
        let meta_bytes = self
            .store
            .get(&meta_key(path))?
            .ok_or_else(|| VolumeError::Enoent(path.to_string()))?;
        let meta: FileMeta = serde_json::from_slice(&meta_bytes)?;

        let keys: Vec<String> = (0..meta.chunk_count).map(|i| chunk_key(path, i)).collect();
        let chunks = self.store.get_many(&keys)?;

        let mut bytes = Vec::with_capacity(meta.len);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let chunk = chunk.ok_or_else(|| {
                VolumeError::Internal(format!("missing chunk {i} for {path}"))
            })?;
            bytes.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8(bytes)?)
    }

    fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let bytes = content.as_bytes();
        let chunks: Vec<(String, Vec<u8>)> = bytes
            .chunks(CHUNK_SIZE)
            .enumerate()
            .map(|(i, chunk)| (chunk_key(path, i), chunk.to_vec()))
            .collect();
        let chunk_count = chunks.len();

        // Drop any stale chunks beyond the new count (the file shrank).
        let existing = self.store.list(&chunk_prefix(path))?;
        let stale: Vec<String> = existing
            .into_iter()
            .filter(|k| {
                k.rsplit("::")
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(|n| n >= chunk_count)
                    .unwrap_or(false)
            })
            .collect();
        if !stale.is_empty() {
            self.store.delete_many(&stale)?;
        }

        if !chunks.is_empty() {
            self.store.put_many(&chunks)?;
        }

        let meta = FileMeta {
            chunk_count,
            len: bytes.len(),
        };
        self.store.put(&meta_key(path), &serde_json::to_vec(&meta)?)
    }

    fn unlink(&self, path: &str) -> Result<()> {
        if self.store.get(&meta_key(path))?.is_none() {
            return Ok(());
        }
        self.store.delete_all(&chunk_prefix(path))?;
        self.store.delete(&meta_key(path))
    }

    fn list_paths(&self) -> Result<Vec<String>> {
        self.store
            .list("meta::")
            .map(|keys| keys.into_iter().map(|k| k["meta::".len()..].to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BitcaskStore;
    use tempfile::tempdir;

    #[test]
    fn write_read_unlink_round_trip() {
        let dir = tempdir().unwrap();
        let fs = DurableFs::new(BitcaskStore::open(dir.path()).unwrap());
        fs.write_file("/a.txt", "hello world").unwrap();
        assert_eq!(fs.read_file("/a.txt").unwrap(), "hello world");
        fs.unlink("/a.txt").unwrap();
        assert!(matches!(fs.read_file("/a.txt"), Err(VolumeError::Enoent(_))));
    }

    #[test]
    fn large_file_spans_multiple_chunks() {
        let dir = tempdir().unwrap();
        let fs = DurableFs::new(BitcaskStore::open(dir.path()).unwrap());
        let content = "x".repeat(CHUNK_SIZE * 3 + 17);
        fs.write_file("/big.txt", &content).unwrap();
        assert_eq!(fs.read_file("/big.txt").unwrap(), content);
    }

    #[test]
    fn shrinking_a_file_drops_stale_trailing_chunks() {
        let dir = tempdir().unwrap();
        let fs = DurableFs::new(BitcaskStore::open(dir.path()).unwrap());
        let big = "y".repeat(CHUNK_SIZE * 2 + 5);
        fs.write_file("/f.txt", &big).unwrap();
        fs.write_file("/f.txt", "small").unwrap();
        assert_eq!(fs.read_file("/f.txt").unwrap(), "small");
        assert!(fs.store.get(&chunk_key("/f.txt", 1)).unwrap().is_none());
    }

    #[test]
    fn list_paths_strips_meta_prefix() {
        let dir = tempdir().unwrap();
        let fs = DurableFs::new(BitcaskStore::open(dir.path()).unwrap());
        fs.write_file("/a.txt", "1").unwrap();
        fs.write_file("/b.txt", "2").unwrap();
        let mut paths = fs.list_paths().unwrap();
        paths.sort();
        assert_eq!(paths, vec!["/a.txt".to_string(), "/b.txt".to_string()]);
    }
}
