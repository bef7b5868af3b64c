//! A capacity-bounded map from session timestamp to the `Bit` tracking
//! that session's accumulated positional drift, evicting in insertion
//! order once full so a volume with many short-lived editors can't grow
//! `text_sessions` without bound.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::bit::Bit;

/// FIFO-evicting store of per-timestamp text sessions.
pub struct SessionStore {
    capacity: usize,
    order: VecDeque<u64>,
    sessions: HashMap<u64, Bit>,
}

impl SessionStore {
    /// Creates a store that holds at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SessionStore capacity must be positive");
        Self {
            capacity,
            order: VecDeque::new(),
            sessions: HashMap::new(),
        }
    }

    /// Opens a fresh session at `timestamp`, evicting the oldest session
    /// if this would exceed capacity. Overwrites any existing session at
    /// the same timestamp (callers create a fresh BIT per new commit
    /// timestamp; reuse happens only via `get_mut`).
    pub fn open(&mut self, timestamp: u64) {
        if !self.sessions.contains_key(&timestamp) && self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.sessions.remove(&evicted);
                debug!("evicted text session at timestamp {evicted}");
            }
        }
        if !self.sessions.contains_key(&timestamp) {
            self.order.push_back(timestamp);
        }
        self.sessions.insert(timestamp, Bit::new());
    }

    /// Returns a mutable handle to the session at `timestamp`, if it is
    /// still live.
    pub fn get_mut(&mut self, timestamp: u64) -> Option<&mut Bit> {
        self.sessions.get_mut(&timestamp)
    }

    /// Whether a session at `timestamp` is currently tracked.
    pub fn contains(&self, timestamp: u64) -> bool {
        self.sessions.contains_key(&timestamp)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_get_mut_round_trips() {
        let mut store = SessionStore::new(4);
        store.open(10);
        assert!(store.contains(10));
        let bit = store.get_mut(10).unwrap();
        bit.update(0, 3);
        assert_eq!(store.get_mut(10).unwrap().query(5), 3);
    }

    #[test]
    fn get_mut_on_unknown_timestamp_is_none() {
        let mut store = SessionStore::new(4);
        assert!(store.get_mut(999).is_none());
    }

    #[test]
    fn capacity_overflow_evicts_oldest_first() {
        let mut store = SessionStore::new(2);
        store.open(1);
        store.open(2);
        store.open(3);
        assert!(!store.contains(1));
        assert!(store.contains(2));
        assert!(store.contains(3));
        assert_eq!(store.len(), 2);
    }
}
