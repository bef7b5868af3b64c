//! The Volume Actor: the single-writer concurrency boundary a volume's
//! PATCH/LIST/PUT/subscribe operations all pass through (spec §4.5).
//! Mutable state (`timestamp`, `text_sessions`) lives behind one
//! `Mutex`, held for the full duration of a request so no caller ever
//! observes partial state from an in-flight batch (invariant I3).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::common::{
    ContentSelector, FilePatchResult, PutEntry, ServerEvent, VolumeFileEntry, VolumeListResponse,
    VolumePatchRequest, VolumePatchResponse,
};
use crate::config::VolumeConfig;
use crate::dispatch;
use crate::fs::{FileStore, TieredFs};
use crate::locker::{dedup_preserving_order, FileLocker};
use crate::session_store::SessionStore;
use crate::subscriber::{Subscriber, SubscriberRegistry, SubscriptionId};
use crate::Result;

/// Mutable actor state, guarded by `VolumeActor::state`.
struct ActorState {
    timestamp: u64,
    sessions: SessionStore,
}

/// The per-volume single-writer actor. Construct one per distinct
/// volume id and keep it alive for the process's lifetime (or at least
/// for as long as that volume is in use) via a `VolumeManager`.
pub struct VolumeActor {
    id: String,
    fs: TieredFs,
    locker: FileLocker,
    subscribers: SubscriberRegistry,
    config: VolumeConfig,
    state: Mutex<ActorState>,
    // Exposed separately from `state` so a caller can cheaply read the
    // current version without taking the actor's write lock (e.g. for
    // diagnostics); every mutation of it happens under `state`.
    timestamp_hint: AtomicU64,
}

impl VolumeActor {
    /// Builds an actor over an already-hydrated `fs` (see
    /// `VolumeManager` for the hydration step that must precede this
    /// for non-ephemeral volumes).
    pub fn new(id: String, fs: TieredFs, config: VolumeConfig) -> Self {
        let timestamp = now_millis();
        let mut sessions = SessionStore::new(config.session_capacity);
        sessions.open(timestamp);
        VolumeActor {
            id,
            fs,
            locker: FileLocker::new(),
            subscribers: SubscriberRegistry::new(),
            config,
            timestamp_hint: AtomicU64::new(timestamp),
            state: Mutex::new(ActorState { timestamp, sessions }),
        }
    }

    /// The volume id this actor serves.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The volume's logical version as of the last completed request.
    /// May be stale by the time the caller reads it if a request is
    /// concurrently in flight; callers needing a consistent snapshot
    /// should use `list` instead.
    pub fn current_timestamp(&self) -> u64 {
        self.timestamp_hint.load(Ordering::Acquire)
    }

    /// `PATCH /volumes/V/files` (spec §4.5 "PATCH").
    pub fn patch(&self, request: VolumePatchRequest) -> VolumePatchResponse {
        debug!(
            "volume {}: PATCH batch of {} patch(es), messageId={:?}",
            self.id,
            request.patches.len(),
            request.message_id
        );

        let paths = dedup_preserving_order(request.patches.iter().map(|p| p.path().to_string()));
        let _locks = self.locker.lock_many(&paths);

        let mut state = self.state.lock().unwrap();

        let mut results = dispatch::apply_phase(&self.fs, &mut state.sessions, &request.patches);

        let new_timestamp = advance(state.timestamp);
        state.timestamp = new_timestamp;
        state.sessions.open(new_timestamp);
        self.timestamp_hint.store(new_timestamp, Ordering::Release);

        let all_accepted = results.iter().all(|r| r.accepted);
        if all_accepted {
            for result in &mut results {
                if let Err(e) = dispatch::commit_one(&self.fs, result) {
                    warn!("volume {}: commit failed for {}: {e}", self.id, result.path);
                    result.accepted = false;
                }
            }
        }

        let all_committed = results.iter().all(|r| r.accepted);
        if all_committed {
            let events: Vec<ServerEvent> = results
                .iter()
                .map(|r| ServerEvent {
                    message_id: request.message_id.clone(),
                    path: r.path.clone(),
                    timestamp: new_timestamp,
                    deleted: r.deleted,
                })
                .collect();
            self.subscribers.broadcast(&events);
        }

        VolumePatchResponse {
            timestamp: new_timestamp,
            results,
        }
    }

    /// `GET /volumes/V/files/<p>?content=<sel>` (spec §4.5 "LIST").
    pub fn list(&self, path_prefix: &str, content: ContentSelector) -> Result<VolumeListResponse> {
        let state = self.state.lock().unwrap();
        debug!("volume {}: LIST under {path_prefix:?}", self.id);

        let mut fs_map = BTreeMap::new();
        for path in self.fs.list_paths()? {
            if !path.starts_with(path_prefix) {
                continue;
            }
            let entry = if content.includes(&path) {
                VolumeFileEntry {
                    content: self.fs.read_file(&path).ok(),
                }
            } else {
                VolumeFileEntry { content: None }
            };
            fs_map.insert(path, entry);
        }

        Ok(VolumeListResponse {
            timestamp: state.timestamp,
            volume_id: self.id.clone(),
            fs: fs_map,
        })
    }

    /// `PUT /volumes/V/files` (spec §4.5 "PUT"): clears every tier, then
    /// writes every entry. Does not advance `timestamp` — a bulk replace
    /// is not itself a versioned text edit and invalidates no in-flight
    /// session (there is nothing left to rebase against after a clear).
    pub fn put(&self, entries: BTreeMap<String, PutEntry>) -> Result<()> {
        let state = self.state.lock().unwrap();
        debug!("volume {}: PUT replacing with {} file(s)", self.id, entries.len());

        self.fs.clear()?;
        for (path, entry) in &entries {
            self.fs.write_file(path, &entry.content)?;
        }

        if self.config.broadcast_on_put {
            let events: Vec<ServerEvent> = entries
                .keys()
                .map(|path| ServerEvent {
                    message_id: None,
                    path: path.clone(),
                    timestamp: state.timestamp,
                    deleted: None,
                })
                .collect();
            self.subscribers.broadcast(&events);
        }

        Ok(())
    }

    /// Registers `sink` to receive every future `ServerEvent` this
    /// volume broadcasts.
    pub fn subscribe(&self, sink: Arc<dyn Subscriber>) -> SubscriptionId {
        self.subscribers.subscribe(sink)
    }

    /// Removes a previously registered sink.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }

    /// Number of currently connected subscribers. Exposed for tests and
    /// diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// `now`, or `prev + 1` if the wall clock hasn't advanced (or went
/// backward) since the last commit — `timestamp` must be strictly
/// monotonic (invariant I2) regardless of clock resolution or skew.
fn advance(prev: u64) -> u64 {
    let now = now_millis();
    if now <= prev {
        prev + 1
    } else {
        now
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}
