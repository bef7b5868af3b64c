//! Wire types shared across the patch dispatcher, the volume actor, and the
//! (out-of-scope) transport layer that would serialise these to/from JSON.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single positional text edit, rebased by the actor against the BIT
/// session the client submitted its `timestamp` against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TextOp {
    /// Insert `text` at client-side position `at`.
    Insert {
        /// Client-side position, rebased via the session BIT.
        at: usize,
        /// Text to insert.
        text: String,
    },
    /// Delete `length` code units starting at client-side position `at`.
    Delete {
        /// Client-side position, rebased via the session BIT.
        at: usize,
        /// Number of characters to remove.
        length: usize,
    },
}

/// One RFC 6902 JSON Patch operation; a thin alias over the `json-patch`
/// crate's representation so callers of this crate only need one import.
pub type JsonPatchOp = json_patch::PatchOperation;

/// One member of a `VolumePatchRequest.patches` array. Classified on
/// deserialization per the predicates in spec §6: `patches` present → JSON
/// patch; else `content` present (including `null`) → text set; else
/// `timestamp` + `operations` → text patch.
#[derive(Debug, Clone)]
pub enum FilePatch {
    /// An RFC 6902 JSON Patch applied to the parsed JSON content of `path`.
    Json {
        /// Target file path.
        path: String,
        /// The patch operations to fold over the file's parsed JSON.
        patches: Vec<JsonPatchOp>,
    },
    /// A whole-file replace. `content: None` means create-empty.
    TextSet {
        /// Target file path.
        path: String,
        /// Replacement content, or `None` to create an empty file.
        content: Option<String>,
    },
    /// A positional text edit rebased against a prior session timestamp.
    TextPatch {
        /// Target file path.
        path: String,
        /// The session timestamp this patch's positions are relative to.
        timestamp: u64,
        /// The ordered list of insert/delete operations.
        operations: Vec<TextOp>,
    },
}

impl FilePatch {
    /// The path this patch targets, regardless of kind.
    pub fn path(&self) -> &str {
        match self {
            FilePatch::Json { path, .. } => path,
            FilePatch::TextSet { path, .. } => path,
            FilePatch::TextPatch { path, .. } => path,
        }
    }
}

impl<'de> Deserialize<'de> for FilePatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| DeError::custom("FilePatch must be a JSON object"))?;

        let path = obj
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| DeError::custom("FilePatch missing string field `path`"))?
            .to_string();

        if let Some(patches) = obj.get("patches") {
            let patches: Vec<JsonPatchOp> =
                serde_json::from_value(patches.clone()).map_err(DeError::custom)?;
            return Ok(FilePatch::Json { path, patches });
        }

        if obj.contains_key("content") {
            let content: Option<String> = obj
                .get("content")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(DeError::custom)?;
            return Ok(FilePatch::TextSet { path, content });
        }

        if let (Some(timestamp), Some(operations)) = (obj.get("timestamp"), obj.get("operations"))
        {
            let timestamp = timestamp
                .as_u64()
                .ok_or_else(|| DeError::custom("`timestamp` must be a non-negative integer"))?;
            let operations: Vec<TextOp> =
                serde_json::from_value(operations.clone()).map_err(DeError::custom)?;
            return Ok(FilePatch::TextPatch {
                path,
                timestamp,
                operations,
            });
        }

        Err(DeError::custom(
            "FilePatch did not match any known shape (json/text-set/text-patch)",
        ))
    }
}

impl Serialize for FilePatch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            FilePatch::Json { path, patches } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("path", path)?;
                map.serialize_entry("patches", patches)?;
                map.end()
            }
            FilePatch::TextSet { path, content } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("path", path)?;
                map.serialize_entry("content", content)?;
                map.end()
            }
            FilePatch::TextPatch {
                path,
                timestamp,
                operations,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("path", path)?;
                map.serialize_entry("timestamp", timestamp)?;
                map.serialize_entry("operations", operations)?;
                map.end()
            }
        }
    }
}

/// The result of applying one `FilePatch`. Always present, one per input
/// patch, in input order (invariant I5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilePatchResult {
    /// The path this result pertains to.
    pub path: String,
    /// Whether the patch (and, after the commit gate, its persistence)
    /// succeeded.
    pub accepted: bool,
    /// The resulting content: the new content on acceptance, the
    /// pre-patch content on rejection (so the client can rebase).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set when this patch deleted the file (a JSON Patch `remove` at the
    /// document root).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// `PATCH /volumes/V/files` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumePatchRequest {
    /// Opaque client-supplied id echoed back on every `ServerEvent` this
    /// batch produces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// The patches to apply, in order.
    pub patches: Vec<FilePatch>,
}

/// `PATCH /volumes/V/files` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumePatchResponse {
    /// The volume's logical version after this batch (always advances).
    pub timestamp: u64,
    /// One result per input patch, in input order.
    pub results: Vec<FilePatchResult>,
}

/// One entry of a `LIST` response's `fs` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VolumeFileEntry {
    /// The file's content, or `None` if the caller's `content` selector
    /// excluded this path.
    pub content: Option<String>,
}

/// `GET /volumes/V/files/<p>?content=<sel>` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeListResponse {
    /// The volume's logical version at the moment of the read.
    pub timestamp: u64,
    /// The volume's id.
    pub volume_id: String,
    /// Every matching path, each with content gated by the selector.
    pub fs: std::collections::BTreeMap<String, VolumeFileEntry>,
}

/// Selector for which files a `LIST` response includes content for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSelector {
    /// Include content for every returned path.
    All,
    /// Include content for no path.
    None,
    /// Include content only for paths starting with this prefix.
    Prefix(String),
}

impl ContentSelector {
    /// Parses the `content` query parameter per spec §4.5: `"true"` → All,
    /// `"false"` or absent → None, anything else → Prefix.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => ContentSelector::None,
            Some("true") => ContentSelector::All,
            Some("false") => ContentSelector::None,
            Some(prefix) => ContentSelector::Prefix(prefix.to_string()),
        }
    }

    /// Whether `path` should have its content included under this selector.
    pub fn includes(&self, path: &str) -> bool {
        match self {
            ContentSelector::All => true,
            ContentSelector::None => false,
            ContentSelector::Prefix(p) => path.starts_with(p.as_str()),
        }
    }
}

/// One entry of a `PUT /volumes/V/files` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutEntry {
    /// The file's full replacement content.
    pub content: String,
}

/// A change event broadcast to every subscriber after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    /// Echoes the triggering request's `messageId`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// The path that changed.
    pub path: String,
    /// The volume's logical version at commit time.
    pub timestamp: u64,
    /// Set when this event represents a deletion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}
