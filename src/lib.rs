#![deny(missing_docs)]

//! A per-volume realtime collaborative filesystem.
//!
//! Clients attach to a named volume and share a flat tree of text/JSON
//! files: reading a point-in-time snapshot, mutating files through
//! three patch families (RFC 6902 JSON Patch, whole-file replace, and a
//! positional text CRDT), and subscribing to an ordered stream of
//! per-path change events. [`VolumeActor`] is the single-writer
//! concurrency boundary every mutation passes through; [`VolumeManager`]
//! owns the table of volumes a process has open, and [`RequestSurface`]
//! exposes the four operations an external transport (out of scope for
//! this crate) would route requests to.

mod bit;
mod common;
mod config;
mod dispatch;
mod error;
mod fs;
mod locker;
mod manager;
mod session_store;
mod store;
mod subscriber;
mod surface;
mod text_crdt;
mod volume;

pub use common::{
    ContentSelector, FilePatch, FilePatchResult, JsonPatchOp, PutEntry, ServerEvent, TextOp,
    VolumeFileEntry, VolumeListResponse, VolumePatchRequest, VolumePatchResponse,
};
pub use config::{is_ephemeral, DurableEngine, ManagerConfig, VolumeConfig, EPHEMERAL_PREFIX};
pub use error::{Result, VolumeError};
pub use fs::{DurableFs, FileStore, MemFs, TieredFs, CHUNK_SIZE};
pub use locker::{FileLocker, LockGuard};
pub use manager::VolumeManager;
pub use store::{BitcaskStore, KVStore, SledStore};
pub use subscriber::{Subscriber, SubscriberRegistry, SubscriptionId};
pub use surface::RequestSurface;
pub use volume::VolumeActor;
