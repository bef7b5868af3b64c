//! The Patch Dispatcher: classifies each `FilePatch` in a batch and runs its
//! apply-phase logic (§4.5 step 2) against an in-memory staging map layered
//! over the volume's `TieredFS`. No durable writes happen here — the
//! dispatcher only produces the result vector the actor's commit gate acts
//! on.

use std::collections::HashMap;

use json_patch::{patch as apply_json_patch, Patch};
use log::{debug, warn};
use serde_json::Value;

use crate::common::{FilePatch, FilePatchResult, TextOp};
use crate::fs::FileStore;
use crate::session_store::SessionStore;
use crate::text_crdt;
use crate::VolumeError;

/// What the apply phase decided to do with one path, pending the commit
/// gate.
#[derive(Debug, Clone)]
enum Staged {
    Write(String),
    Delete,
}

/// Reads the "current" content for `path`: the staged value from earlier
/// in this same batch if present, otherwise the committed content from
/// `fs`. Returns `None` if the path does not exist by either measure.
fn read_current(
    fs: &dyn FileStore,
    staged: &HashMap<String, Staged>,
    path: &str,
) -> Option<String> {
    match staged.get(path) {
        Some(Staged::Write(content)) => Some(content.clone()),
        Some(Staged::Delete) => None,
        None => fs.read_file(path).ok(),
    }
}

/// Applies `patches` in order against `fs` + `sessions`, staging results in
/// memory. Returns one `FilePatchResult` per input patch, in input order
/// (invariant I5).
pub fn apply_phase(
    fs: &dyn FileStore,
    sessions: &mut SessionStore,
    patches: &[FilePatch],
) -> Vec<FilePatchResult> {
    let mut staged: HashMap<String, Staged> = HashMap::new();
    let mut results = Vec::with_capacity(patches.len());

    for patch in patches {
        let path = patch.path().to_string();
        let result = match patch {
            FilePatch::Json { patches: ops, .. } => apply_json(fs, &staged, &path, ops),
            FilePatch::TextSet { content, .. } => apply_text_set(fs, &staged, &path, content),
            FilePatch::TextPatch {
                timestamp,
                operations,
                ..
            } => apply_text_patch(fs, &staged, sessions, &path, *timestamp, operations),
        };

        if result.accepted {
            if result.deleted == Some(true) {
                staged.insert(path.clone(), Staged::Delete);
            } else if let Some(content) = &result.content {
                staged.insert(path.clone(), Staged::Write(content.clone()));
            }
        }
        results.push(result);
    }

    results
}

fn apply_json(
    fs: &dyn FileStore,
    staged: &HashMap<String, Staged>,
    path: &str,
    ops: &[crate::common::JsonPatchOp],
) -> FilePatchResult {
    let current = read_current(fs, staged, path).unwrap_or_else(|| "{}".to_string());

    let mut value: Value = match serde_json::from_str(&current) {
        Ok(v) => v,
        Err(e) => {
            warn!("json patch on {path}: current content is not valid JSON: {e}");
            return FilePatchResult {
                path: path.to_string(),
                accepted: false,
                content: Some(current),
                deleted: None,
            };
        }
    };

    // Applied one operation at a time, rather than as a single `Patch`,
    // so a `remove` targeting the document root can be special-cased to
    // `Value::Null` instead of depending on whether the crate's own
    // root-removal behavior happens to agree with this (deleting the
    // file) being a legal outcome rather than a RFC 6902 error.
    for op in ops {
        let result = if is_root_remove(op) {
            value = Value::Null;
            Ok(())
        } else {
            apply_json_patch(&mut value, &Patch(std::slice::from_ref(op).to_vec()))
        };
        if let Err(e) = result {
            debug!("json patch rejected for {path}: {e}");
            return FilePatchResult {
                path: path.to_string(),
                accepted: false,
                content: Some(current),
                deleted: None,
            };
        }
    }

    let new_content = value.to_string();
    let deleted = value.is_null();
    debug!("json patch accepted for {path} (deleted={deleted})");
    FilePatchResult {
        path: path.to_string(),
        accepted: true,
        content: Some(new_content),
        deleted: if deleted { Some(true) } else { None },
    }
}

/// Whether `op` is a `remove` targeting the document root (an empty
/// JSON Pointer) — how a whole file gets deleted via JSON patch.
fn is_root_remove(op: &crate::common::JsonPatchOp) -> bool {
    matches!(op, json_patch::PatchOperation::Remove(r) if r.path.to_string().is_empty())
}

fn apply_text_set(
    fs: &dyn FileStore,
    staged: &HashMap<String, Staged>,
    path: &str,
    content: &Option<String>,
) -> FilePatchResult {
    let _ = read_current(fs, staged, path); // staged content is irrelevant: whole-file replace
    let new_content = content.clone().unwrap_or_default();
    FilePatchResult {
        path: path.to_string(),
        accepted: true,
        content: Some(new_content),
        deleted: None,
    }
}

fn apply_text_patch(
    fs: &dyn FileStore,
    staged: &HashMap<String, Staged>,
    sessions: &mut SessionStore,
    path: &str,
    timestamp: u64,
    operations: &[TextOp],
) -> FilePatchResult {
    let current = read_current(fs, staged, path).unwrap_or_default();

    let bit = match sessions.get_mut(timestamp) {
        Some(bit) => bit,
        None => {
            debug!("text patch rejected for {path}: no session at timestamp {timestamp}");
            return FilePatchResult {
                path: path.to_string(),
                accepted: false,
                content: Some(current),
                deleted: None,
            };
        }
    };

    let mut doc = current.clone();
    let mut trial_bit = bit.clone();
    if text_crdt::apply_ops(&mut doc, &mut trial_bit, operations) {
        *bit = trial_bit;
        debug!("text patch accepted for {path}@{timestamp}");
        FilePatchResult {
            path: path.to_string(),
            accepted: true,
            content: Some(doc),
            deleted: None,
        }
    } else {
        debug!("text patch rejected for {path}@{timestamp}: out-of-range position");
        FilePatchResult {
            path: path.to_string(),
            accepted: false,
            content: Some(current),
            deleted: None,
        }
    }
}

/// Result of committing one staged patch result to the durable tiers.
pub fn commit_one(fs: &dyn FileStore, result: &FilePatchResult) -> Result<(), VolumeError> {
    if result.deleted == Some(true) {
        fs.unlink(&result.path)
    } else if let Some(content) = &result.content {
        fs.write_file(&result.path, content)
    } else {
        Ok(())
    }
}

/// Folds patches targeting the same path into a single equivalent patch,
/// per the optional client-side/pre-pass coalescing described in spec
/// §4.5: JSON patches concatenate their op arrays; text-sets keep the
/// last content; text-patches concatenate operations under the earliest
/// timestamp. Not used internally by the actor (which must keep one
/// result per *input* patch — invariant I5); exposed for callers that
/// want to shrink a batch before submission.
pub fn merge_same_path_patches(patches: Vec<FilePatch>) -> Vec<FilePatch> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, FilePatch> = HashMap::new();

    for patch in patches {
        let path = patch.path().to_string();
        match merged.get_mut(&path) {
            None => {
                order.push(path.clone());
                merged.insert(path, patch);
            }
            Some(existing) => merge_into(existing, patch),
        }
    }

    order
        .into_iter()
        .filter_map(|path| merged.remove(&path))
        .collect()
}

fn merge_into(existing: &mut FilePatch, incoming: FilePatch) {
    match (existing, incoming) {
        (
            FilePatch::Json { patches, .. },
            FilePatch::Json {
                patches: more_patches,
                ..
            },
        ) => patches.extend(more_patches),
        (FilePatch::TextSet { content, .. }, FilePatch::TextSet { content: new, .. }) => {
            *content = new;
        }
        (
            FilePatch::TextPatch {
                timestamp,
                operations,
                ..
            },
            FilePatch::TextPatch {
                timestamp: other_ts,
                operations: more_ops,
                ..
            },
        ) => {
            operations.extend(more_ops);
            if other_ts < *timestamp {
                *timestamp = other_ts;
            }
        }
        // Mismatched kinds on the same path: last write wins, matching
        // the unmerged batch's own input-order semantics.
        (slot, incoming) => *slot = incoming,
    }
}
