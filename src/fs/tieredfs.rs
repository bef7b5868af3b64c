//! Composes any number of `FileStore` tiers into one: reads hit the
//! fastest (first) tier only; writes and unlinks fan out to every tier
//! concurrently, with the first error winning.

use log::warn;
use rayon::prelude::*;

use super::FileStore;
use crate::{Result, VolumeError};

/// A stack of `FileStore` tiers, ordered fastest-first. The in-process
/// convention is `[MemFs, DurableFs<...>]` for a durable volume, or just
/// `[MemFs]` for an ephemeral one.
pub struct TieredFs {
    tiers: Vec<Box<dyn FileStore>>,
}

impl TieredFs {
    /// Builds a tiered store from `tiers`, fastest first.
    pub fn new(tiers: Vec<Box<dyn FileStore>>) -> Self {
        assert!(!tiers.is_empty(), "TieredFs needs at least one tier");
        Self { tiers }
    }
}

impl FileStore for TieredFs {
    fn read_file(&self, path: &str) -> Result<String> {
        self.tiers[0].read_file(path)
    }

    fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let results: Vec<Result<()>> = self
            .tiers
            .par_iter()
            .map(|tier| tier.write_file(path, content))
            .collect();
        first_error(results)
    }

    fn unlink(&self, path: &str) -> Result<()> {
        let results: Vec<Result<()>> = self
            .tiers
            .par_iter()
            .map(|tier| tier.unlink(path))
            .collect();
        first_error(results)
    }

    fn clear(&self) -> Result<()> {
        let results: Vec<Result<()>> = self.tiers.par_iter().map(|tier| tier.clear()).collect();
        first_error(results)
    }

    fn list_paths(&self) -> Result<Vec<String>> {
        self.tiers[0].list_paths()
    }

    fn exists(&self, path: &str) -> bool {
        self.tiers[0].exists(path)
    }
}

/// Folds a per-tier result vector into one outcome. Every tier is given
/// the write regardless of an earlier tier's failure (so a transient
/// fault in one tier never silently skips the others); the first error
/// encountered, in tier order, is what's returned.
fn first_error(results: Vec<Result<()>>) -> Result<()> {
    let mut first: Option<VolumeError> = None;
    for result in results {
        if let Err(e) = result {
            warn!("tiered fs write failed on one tier: {e}");
            if first.is_none() {
                first = Some(e);
            }
        }
    }
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
