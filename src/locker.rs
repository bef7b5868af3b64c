//! The File Locker: one fair mutex per path, created lazily and retained
//! for the lifetime of the volume (spec §4.4). `lock_many` takes an
//! already-deduplicated path list (the caller — the actor's PATCH
//! pipeline — is responsible for the dedup contract; locking the same
//! path twice here would deadlock against itself) and returns a scoped
//! guard that releases every acquired lock on drop.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use dashmap::DashMap;

/// A single path's lock: a boolean held/free flag plus a condvar, woken
/// in FIFO order by `Condvar::notify_one` (the OS scheduler's own
/// wait-queue ordering, which on every platform this crate targets is
/// first-in-first-out).
struct PathLock {
    held: Mutex<bool>,
    free: Condvar,
}

impl PathLock {
    fn new() -> Self {
        Self {
            held: Mutex::new(false),
            free: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.free.wait(held).unwrap();
        }
        *held = true;
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap();
        *held = false;
        self.free.notify_one();
    }
}

/// Lazily-populated per-path mutex set, sharded by `DashMap` so unrelated
/// paths never contend on a single global lock.
#[derive(Default)]
pub struct FileLocker {
    locks: DashMap<String, Arc<PathLock>>,
}

impl FileLocker {
    /// Creates an empty locker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires one lock per entry of `paths`, in the order given.
    /// `paths` must already be deduplicated — this is the caller's
    /// contract, not enforced here, since re-locking a path already held
    /// by this same call would block forever.
    pub fn lock_many(&self, paths: &[String]) -> LockGuard {
        let mut held = Vec::with_capacity(paths.len());
        for path in paths {
            let lock = self
                .locks
                .entry(path.clone())
                .or_insert_with(|| Arc::new(PathLock::new()))
                .clone();
            lock.acquire();
            held.push(lock);
        }
        LockGuard { held: VecDeque::from(held) }
    }
}

/// Releases every lock it holds, in acquisition order, when dropped.
pub struct LockGuard {
    held: VecDeque<Arc<PathLock>>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        while let Some(lock) = self.held.pop_front() {
            lock.release();
        }
    }
}

/// Deduplicates `paths`, preserving first-occurrence order, the way the
/// actor's PATCH pipeline must before calling `lock_many`.
pub fn dedup_preserving_order(paths: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for path in paths {
        if seen.insert(path.clone()) {
            out.push(path);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_many_excludes_concurrent_access_to_same_path() {
        let locker = Arc::new(FileLocker::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locker = locker.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                let _guard = locker.lock_many(&["/a.txt".to_string()]);
                let before = counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                // If two threads were ever inside the critical section at
                // once, this would observe a value it didn't itself set.
                assert_eq!(counter.load(Ordering::SeqCst), before + 1);
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn distinct_paths_do_not_contend() {
        let locker = FileLocker::new();
        let guard = locker.lock_many(&["/a.txt".to_string()]);
        // Locking an unrelated path must not block.
        let _other = locker.lock_many(&["/b.txt".to_string()]);
        drop(guard);
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let paths = vec!["/a".to_string(), "/b".to_string(), "/a".to_string(), "/c".to_string()];
        assert_eq!(
            dedup_preserving_order(paths),
            vec!["/a".to_string(), "/b".to_string(), "/c".to_string()]
        );
    }

    #[test]
    fn lock_many_on_empty_list_is_a_no_op() {
        let locker = FileLocker::new();
        let _guard = locker.lock_many(&[]);
    }
}
