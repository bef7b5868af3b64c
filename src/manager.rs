//! The `VolumeManager`: owns the table of live `VolumeActor`s, lazily
//! creates one on first touch, and — for non-ephemeral volumes —
//! hydrates its `MemFs` tier from the durable tier before publishing
//! the actor where any request can reach it (spec §4.3 "At volume
//! boot").

use std::sync::Arc;

use dashmap::DashMap;
use log::info;

use crate::config::{is_ephemeral, DurableEngine, ManagerConfig};
use crate::fs::{DurableFs, FileStore, MemFs, TieredFs};
use crate::store::{BitcaskStore, SledStore};
use crate::volume::VolumeActor;
use crate::Result;

/// Owns every `VolumeActor` this process has opened, keyed by volume id.
pub struct VolumeManager {
    config: ManagerConfig,
    volumes: DashMap<String, Arc<VolumeActor>>,
}

impl VolumeManager {
    /// Creates an empty manager. No volumes are opened eagerly — each
    /// opens lazily the first time `get_or_create` names it.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            volumes: DashMap::new(),
        }
    }

    /// Returns the actor for `volume_id`, creating and (for durable
    /// volumes) hydrating it first if this is the first request this
    /// process has seen for that id.
    ///
    /// Construction happens entirely before the actor is inserted into
    /// `volumes`, so no concurrent caller can ever observe a
    /// partially-hydrated volume (spec §4.3's hydration mutual-exclusion
    /// requirement, satisfied here by `DashMap::entry`'s per-shard lock
    /// rather than a separate guard).
    pub fn get_or_create(&self, volume_id: &str) -> Result<Arc<VolumeActor>> {
        if let Some(actor) = self.volumes.get(volume_id) {
            return Ok(actor.clone());
        }

        match self.volumes.entry(volume_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Ok(e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let actor = Arc::new(self.open_volume(volume_id)?);
                e.insert(actor.clone());
                Ok(actor)
            }
        }
    }

    fn open_volume(&self, volume_id: &str) -> Result<VolumeActor> {
        let fs = if is_ephemeral(volume_id) {
            info!("volume {volume_id}: opening ephemeral (memory-only)");
            TieredFs::new(vec![Box::new(MemFs::new())])
        } else {
            info!("volume {volume_id}: opening durable ({:?})", self.config.engine);
            let durable_path = self.config.data_dir.join(sanitize(volume_id));
            std::fs::create_dir_all(&durable_path)?;

            hydrate_and_build(&durable_path, self.config.engine)?
        };

        Ok(VolumeActor::new(volume_id.to_string(), fs, self.config.volume.clone()))
    }

    /// Number of volumes currently open in this process.
    pub fn open_count(&self) -> usize {
        self.volumes.len()
    }
}

/// Opens the durable backend `engine` selects at `durable_path`, hydrates
/// a fresh `MemFs` from it, and returns the two-tier `TieredFs` over
/// both — fully built before this function returns, so the caller can
/// publish it without any caller ever observing a partially-hydrated
/// volume.
fn hydrate_and_build(durable_path: &std::path::Path, engine: DurableEngine) -> Result<TieredFs> {
    let mem = MemFs::new();
    match engine {
        DurableEngine::Bitcask => {
            let durable = DurableFs::new(BitcaskStore::open(durable_path)?);
            hydrate(&mem, &durable)?;
            Ok(TieredFs::new(vec![Box::new(mem), Box::new(durable)]))
        }
        DurableEngine::Sled => {
            let durable = DurableFs::new(SledStore::open(durable_path)?);
            hydrate(&mem, &durable)?;
            Ok(TieredFs::new(vec![Box::new(mem), Box::new(durable)]))
        }
    }
}

fn hydrate<D: FileStore>(mem: &MemFs, durable: &D) -> Result<()> {
    for path in durable.list_paths()? {
        let content = durable.read_file(&path)?;
        mem.write_file(&path, &content)?;
    }
    Ok(())
}

/// Volume ids may contain characters a filesystem path component
/// can't (`/`, `:`), since the `ephemeral:` prefix already uses `:`
/// and volume ids are otherwise free-form strings. Collapse anything
/// that isn't alphanumeric, `-`, or `_` to `_`.
fn sanitize(volume_id: &str) -> String {
    volume_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
