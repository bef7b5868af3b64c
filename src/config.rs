//! Tunables the body of the spec leaves as implementation choices: how
//! many text sessions a volume retains, which `KVStore` backend powers
//! the durable tier, and whether PUT broadcasts. Mirrors the role the
//! teacher's `DEFAULT_ADDR`/`--engine` CLI flags play, just as library
//! config structs instead of `clap` arguments.

/// Per-volume tunables.
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    /// Maximum number of `text_sessions` entries retained before the
    /// oldest (by insertion order) is evicted. See spec §5 "Memory".
    pub session_capacity: usize,
    /// Whether a successful PUT broadcasts a `ServerEvent` per written
    /// file (spec §4.5 "PUT", §9 resolved Open Question).
    pub broadcast_on_put: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            session_capacity: 64,
            broadcast_on_put: true,
        }
    }
}

/// Which `KVStore` implementation backs a non-ephemeral volume's
/// durable tier. Mirrors the teacher's `--engine kvs|sled` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurableEngine {
    /// The append-only log-structured store (`BitcaskStore`).
    Bitcask,
    /// The `sled`-backed store (`SledStore`).
    Sled,
}

impl Default for DurableEngine {
    fn default() -> Self {
        DurableEngine::Bitcask
    }
}

/// Tunables shared across every volume a `VolumeManager` opens.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory under which each non-ephemeral volume's durable store
    /// is opened, one subdirectory per volume id.
    pub data_dir: std::path::PathBuf,
    /// Durable backend selection for newly opened volumes.
    pub engine: DurableEngine,
    /// Defaults applied to every volume this manager opens.
    pub volume: VolumeConfig,
}

impl ManagerConfig {
    /// A `ManagerConfig` rooted at `data_dir` with otherwise-default
    /// tunables.
    pub fn new(data_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            engine: DurableEngine::default(),
            volume: VolumeConfig::default(),
        }
    }
}

/// A volume id bearing this prefix opens with no durable tier at all
/// (spec §9 "Ephemeral mode"): pure `MemFs`, contents vanish on
/// `VolumeActor` drop.
pub const EPHEMERAL_PREFIX: &str = "ephemeral:";

/// Whether `volume_id` names an ephemeral (memory-only) volume.
pub fn is_ephemeral(volume_id: &str) -> bool {
    volume_id.starts_with(EPHEMERAL_PREFIX)
}
