//! The Request Surface: the four volume-boundary operations named in
//! spec §6, as plain methods over a `VolumeManager`. URL routing,
//! authentication, and the long-lived message transport itself are all
//! out of scope (spec §1) — this layer starts one step inside that
//! boundary, where a caller has already resolved a volume id and (for
//! subscribe) established a sink.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::common::{ContentSelector, PutEntry, VolumeListResponse, VolumePatchRequest, VolumePatchResponse};
use crate::manager::VolumeManager;
use crate::subscriber::{Subscriber, SubscriptionId};
use crate::Result;

/// A thin request-shaped facade over a `VolumeManager`: each method
/// corresponds to one row of spec §6's endpoint table, minus the
/// transport (HTTP method, URL, upgrade handshake) that out-of-scope
/// collaborator would otherwise own.
pub struct RequestSurface {
    manager: Arc<VolumeManager>,
}

impl RequestSurface {
    /// Wraps an already-constructed manager.
    pub fn new(manager: Arc<VolumeManager>) -> Self {
        Self { manager }
    }

    /// `GET /volumes/V/files/<p>?content=<sel>`. `content` is the raw
    /// query parameter value, parsed per the §4.5 selector rules.
    pub fn list(
        &self,
        volume_id: &str,
        path: &str,
        content: Option<&str>,
    ) -> Result<VolumeListResponse> {
        debug!("LIST volume={volume_id} path={path:?} content={content:?}");
        let volume = self.manager.get_or_create(volume_id)?;
        volume.list(path, ContentSelector::parse(content))
    }

    /// `PUT /volumes/V/files`.
    pub fn put(&self, volume_id: &str, entries: BTreeMap<String, PutEntry>) -> Result<()> {
        debug!("PUT volume={volume_id} entries={}", entries.len());
        let volume = self.manager.get_or_create(volume_id)?;
        volume.put(entries)
    }

    /// `PATCH /volumes/V/files`.
    pub fn patch(&self, volume_id: &str, request: VolumePatchRequest) -> Result<VolumePatchResponse> {
        debug!("PATCH volume={volume_id} patches={}", request.patches.len());
        let volume = self.manager.get_or_create(volume_id)?;
        Ok(volume.patch(request))
    }

    /// `GET /volumes/V/files` upgraded to a message channel. The
    /// transport-level precondition (rejecting a request with no
    /// `Upgrade` header, per spec §4.5 "Failure semantics") is the
    /// external collaborator's job; by the time a caller reaches this
    /// method it already has a sink ready to receive events.
    pub fn subscribe(&self, volume_id: &str, sink: Arc<dyn Subscriber>) -> Result<SubscriptionId> {
        debug!("SUBSCRIBE volume={volume_id}");
        let volume = self.manager.get_or_create(volume_id)?;
        Ok(volume.subscribe(sink))
    }

    /// Disconnects a previously established subscription.
    pub fn unsubscribe(&self, volume_id: &str, id: SubscriptionId) -> Result<()> {
        debug!("UNSUBSCRIBE volume={volume_id}");
        let volume = self.manager.get_or_create(volume_id)?;
        volume.unsubscribe(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FilePatch;
    use crate::config::ManagerConfig;
    use tempfile::tempdir;

    #[test]
    fn put_then_list_round_trips_through_the_surface() {
        let dir = tempdir().unwrap();
        let surface = RequestSurface::new(Arc::new(VolumeManager::new(ManagerConfig::new(dir.path()))));

        let mut entries = BTreeMap::new();
        entries.insert("/a.txt".to_string(), PutEntry { content: "hi".to_string() });
        surface.put("vol", entries).unwrap();

        let listed = surface.list("vol", "/", Some("true")).unwrap();
        assert_eq!(listed.fs.get("/a.txt").unwrap().content.as_deref(), Some("hi"));
    }

    #[test]
    fn patch_through_the_surface_returns_accepted_results() {
        let dir = tempdir().unwrap();
        let surface = RequestSurface::new(Arc::new(VolumeManager::new(ManagerConfig::new(dir.path()))));

        let response = surface
            .patch(
                "vol",
                VolumePatchRequest {
                    message_id: Some("m1".to_string()),
                    patches: vec![FilePatch::TextSet {
                        path: "/a.txt".to_string(),
                        content: Some("hi".to_string()),
                    }],
                },
            )
            .unwrap();

        assert!(response.results[0].accepted);
    }
}
