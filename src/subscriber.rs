//! The Subscriber Registry: a set of opaque message sinks a volume fans
//! `ServerEvent`s out to after every successful commit (spec §4.5 step 5).
//! The long-lived message transport itself (the WebSocket/SSE channel a
//! real client connects through) is out of scope; this module only needs
//! something that can accept a `ServerEvent` and report whether it's
//! still alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};

use crate::common::ServerEvent;

/// An opaque sink a subscriber registers to receive `ServerEvent`s on.
/// Implementations own the real transport (a channel to a WebSocket
/// writer task, a test-harness `Vec` collector, …). `send` returns
/// `false` to signal the sink is gone; the registry removes it and
/// moves on rather than treating that as a batch-wide failure.
pub trait Subscriber: Send + Sync {
    /// Delivers one event. Returns `false` if the sink can no longer
    /// accept events (disconnected, send timed out, …).
    fn send(&self, event: &ServerEvent) -> bool;
}

/// Opaque handle returned by `SubscriberRegistry::subscribe`, used to
/// unsubscribe later.
pub type SubscriptionId = u64;

/// Fan-out registry of `Subscriber` sinks. Connect/disconnect may happen
/// concurrently with broadcast (spec §5): the registry guards itself
/// with `DashMap`'s internal sharding rather than the actor's own
/// state mutex, so a slow subscriber callback only stalls the broadcast
/// step of its own batch, never unrelated PATCH/LIST calls.
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    sinks: DashMap<SubscriptionId, Arc<dyn Subscriber>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink`, returning a handle to unsubscribe it later.
    pub fn subscribe(&self, sink: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.insert(id, sink);
        debug!("subscriber {id} connected ({} total)", self.sinks.len());
        id
    }

    /// Removes a previously registered sink. A no-op if it was already
    /// removed (e.g. by a failed send).
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.sinks.remove(&id).is_some() {
            debug!("subscriber {id} disconnected ({} total)", self.sinks.len());
        }
    }

    /// Delivers every event in `events`, in order, to every live sink, in
    /// the order the events were produced (broadcast order matches
    /// commit order — spec §5). A sink whose `send` fails is dropped
    /// from the registry; its failure does not affect delivery to other
    /// sinks or other events in this batch.
    pub fn broadcast(&self, events: &[ServerEvent]) {
        if events.is_empty() || self.sinks.is_empty() {
            return;
        }
        let mut dead = Vec::new();
        for entry in self.sinks.iter() {
            let (id, sink) = (*entry.key(), entry.value());
            for event in events {
                if !sink.send(event) {
                    warn!("subscriber {id} send failed, dropping");
                    dead.push(id);
                    break;
                }
            }
        }
        for id in dead {
            self.unsubscribe(id);
        }
    }

    /// Number of currently registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no registered sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
