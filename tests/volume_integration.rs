//! End-to-end scenarios exercising `VolumeManager`/`RequestSurface`
//! against real durable backends, covering the literal I/O scenarios
//! and cross-cutting invariants named in the top-level spec (§8).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tempfile::tempdir;
use volumes::{
    ContentSelector, FilePatch, ManagerConfig, PutEntry, RequestSurface, ServerEvent, Subscriber,
    TextOp, VolumeManager, VolumePatchRequest,
};

struct Collector(Mutex<Vec<ServerEvent>>);

impl Subscriber for Collector {
    fn send(&self, event: &ServerEvent) -> bool {
        self.0.lock().unwrap().push(event.clone());
        true
    }
}

fn surface_over(dir: &std::path::Path) -> RequestSurface {
    RequestSurface::new(Arc::new(VolumeManager::new(ManagerConfig::new(dir))))
}

#[test]
fn atomic_batch_rejection_leaves_the_filesystem_untouched() {
    let dir = tempdir().unwrap();
    let surface = surface_over(dir.path());

    surface
        .patch(
            "vol",
            VolumePatchRequest {
                message_id: None,
                patches: vec![FilePatch::TextSet {
                    path: "/a.txt".to_string(),
                    content: Some("original".to_string()),
                }],
            },
        )
        .unwrap();

    // A batch with one rejected patch (stale text-patch session) and one
    // otherwise-valid one; per I3 neither file should change.
    let response = surface
        .patch(
            "vol",
            VolumePatchRequest {
                message_id: None,
                patches: vec![
                    FilePatch::TextSet {
                        path: "/b.txt".to_string(),
                        content: Some("new".to_string()),
                    },
                    FilePatch::TextPatch {
                        path: "/a.txt".to_string(),
                        timestamp: 1, // never a real session
                        operations: vec![TextOp::Insert { at: 0, text: "x".to_string() }],
                    },
                ],
            },
        )
        .unwrap();

    assert!(response.results.iter().any(|r| !r.accepted));
    let listed = surface.list("vol", "/", Some("true")).unwrap();
    assert_eq!(listed.fs.get("/a.txt").unwrap().content.as_deref(), Some("original"));
    assert!(!listed.fs.contains_key("/b.txt"));
}

#[test]
fn subscriber_sees_an_event_only_for_accepted_results_after_commit() {
    let dir = tempdir().unwrap();
    let manager = Arc::new(VolumeManager::new(ManagerConfig::new(dir.path())));
    let surface = RequestSurface::new(manager.clone());
    let volume = manager.get_or_create("vol").unwrap();

    let collector = Arc::new(Collector(Mutex::new(Vec::new())));
    volume.subscribe(collector.clone());

    // Rejected batch: no event at all.
    surface
        .patch(
            "vol",
            VolumePatchRequest {
                message_id: None,
                patches: vec![FilePatch::TextPatch {
                    path: "/a.txt".to_string(),
                    timestamp: 999,
                    operations: vec![TextOp::Insert { at: 0, text: "x".to_string() }],
                }],
            },
        )
        .unwrap();
    assert!(collector.0.lock().unwrap().is_empty());

    // Accepted batch: exactly one event, matching timestamp.
    let response = surface
        .patch(
            "vol",
            VolumePatchRequest {
                message_id: None,
                patches: vec![FilePatch::TextSet {
                    path: "/a.txt".to_string(),
                    content: Some("hi".to_string()),
                }],
            },
        )
        .unwrap();

    let events = collector.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "/a.txt");
    assert_eq!(events[0].timestamp, response.timestamp);
}

#[test]
fn durable_and_memory_tiers_agree_after_a_fully_accepted_batch() {
    let dir = tempdir().unwrap();
    let manager = Arc::new(VolumeManager::new(ManagerConfig::new(dir.path())));
    let volume = manager.get_or_create("vol").unwrap();

    volume.patch(VolumePatchRequest {
        message_id: None,
        patches: vec![FilePatch::TextSet {
            path: "/a.txt".to_string(),
            content: Some("hello tiers".to_string()),
        }],
    });

    drop(manager);

    // Reopening the manager forces a fresh hydration read straight from
    // the durable tier; if it didn't match what MemFs held, this would
    // observe stale or missing content.
    let manager = VolumeManager::new(ManagerConfig::new(dir.path()));
    let volume = manager.get_or_create("vol").unwrap();
    let listed = volume.list("/", ContentSelector::All).unwrap();
    assert_eq!(listed.fs.get("/a.txt").unwrap().content.as_deref(), Some("hello tiers"));
}

#[test]
fn large_file_round_trips_across_chunk_boundaries() {
    let dir = tempdir().unwrap();
    let manager = VolumeManager::new(ManagerConfig::new(dir.path()));
    let volume = manager.get_or_create("vol").unwrap();

    let content = "x".repeat(volumes::CHUNK_SIZE * 2 + 37);
    volume.patch(VolumePatchRequest {
        message_id: None,
        patches: vec![FilePatch::TextSet {
            path: "/big.txt".to_string(),
            content: Some(content.clone()),
        }],
    });

    let listed = volume.list("/", ContentSelector::All).unwrap();
    assert_eq!(listed.fs.get("/big.txt").unwrap().content.as_ref(), Some(&content));
}

#[test]
fn ephemeral_volume_has_no_footprint_on_disk() {
    let dir = tempdir().unwrap();
    let manager = VolumeManager::new(ManagerConfig::new(dir.path()));
    let volume = manager.get_or_create("ephemeral:scratch").unwrap();

    volume.patch(VolumePatchRequest {
        message_id: None,
        patches: vec![FilePatch::TextSet {
            path: "/a.txt".to_string(),
            content: Some("gone on restart".to_string()),
        }],
    });

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(entries.is_empty(), "ephemeral volume must not create a durable subdirectory");
}

#[test]
fn put_replaces_the_whole_volume_and_broadcasts_by_default() {
    let dir = tempdir().unwrap();
    let manager = Arc::new(VolumeManager::new(ManagerConfig::new(dir.path())));
    let surface = RequestSurface::new(manager.clone());
    let volume = manager.get_or_create("vol").unwrap();

    volume.patch(VolumePatchRequest {
        message_id: None,
        patches: vec![FilePatch::TextSet {
            path: "/old.txt".to_string(),
            content: Some("stale".to_string()),
        }],
    });

    let collector = Arc::new(Collector(Mutex::new(Vec::new())));
    volume.subscribe(collector.clone());

    let mut entries = BTreeMap::new();
    entries.insert("/new.txt".to_string(), PutEntry { content: "fresh".to_string() });
    surface.put("vol", entries).unwrap();

    let listed = surface.list("vol", "/", Some("true")).unwrap();
    assert!(!listed.fs.contains_key("/old.txt"));
    assert_eq!(listed.fs.get("/new.txt").unwrap().content.as_deref(), Some("fresh"));

    let events = collector.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "/new.txt");
}
