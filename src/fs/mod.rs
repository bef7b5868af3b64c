//! The per-volume file storage stack: a `FileStore` capability trait, a
//! pure in-memory tier, a durable tier chunked over a `KVStore`, and a
//! `TieredFS` that composes any number of tiers into one fan-out store.

mod durablefs;
mod memfs;
mod tieredfs;

pub use durablefs::DurableFs;
pub use memfs::MemFs;
pub use tieredfs::TieredFs;

use crate::Result;

/// Maximum bytes of file content stored in a single durable-tier chunk.
pub const CHUNK_SIZE: usize = 131_072;

/// Minimal whole-file storage capability a volume's filesystem tiers
/// must provide. Paths are opaque UTF-8 strings (the spec's files are
/// flat, not a nested directory tree — `Enotdir`/`Enotempty` are
/// reserved for a future hierarchical layout and are never raised by
/// the shipped tiers).
pub trait FileStore: Send + Sync {
    /// Reads the full content of `path`. `Err(Enoent)` if absent.
    fn read_file(&self, path: &str) -> Result<String>;

    /// Writes (creating or overwriting) the full content of `path`.
    fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// Removes `path`. An idempotent no-op if `path` doesn't exist.
    fn unlink(&self, path: &str) -> Result<()>;

    /// Lists every path currently stored, in unspecified order.
    fn list_paths(&self) -> Result<Vec<String>>;

    /// Whether `path` currently exists.
    fn exists(&self, path: &str) -> bool {
        self.read_file(path).is_ok()
    }

    /// Removes every file in the store. Used by PUT's bulk-replace
    /// semantics (spec §4.5): clear, then write the new entries.
    fn clear(&self) -> Result<()> {
        for path in self.list_paths()? {
            self.unlink(&path)?;
        }
        Ok(())
    }
}
