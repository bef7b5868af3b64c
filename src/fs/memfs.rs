//! A pure in-memory `FileStore`, used as the fastest read tier and as the
//! entirety of an ephemeral volume's storage.

use std::collections::HashMap;
use std::sync::RwLock;

use super::FileStore;
use crate::{Result, VolumeError};

/// An in-memory map of path to content, guarded by a single `RwLock`.
#[derive(Default)]
pub struct MemFs {
    files: RwLock<HashMap<String, String>>,
}

impl MemFs {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemFs {
    fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| VolumeError::Enoent(path.to_string()))
    }

    fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.files
            .write()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn unlink(&self, path: &str) -> Result<()> {
        self.files.write().unwrap().remove(path);
        Ok(())
    }

    fn list_paths(&self) -> Result<Vec<String>> {
        Ok(self.files.read().unwrap().keys().cloned().collect())
    }
}
