//! Drive item metadata
//!
//! Minimal deserialization of the item JSON the service returns at the
//! terminal success state of an upload or metadata call. The transfer engine
//! treats the parsed value opaquely; richer facet mapping is out of scope.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::errors::ApiError;

/// Metadata of a remote drive item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    /// Opaque item id
    pub id: String,
    /// File or folder name
    pub name: String,
    /// Size in bytes
    pub size: Option<u64>,
    /// Entity tag for change detection
    pub e_tag: Option<String>,
    /// Last modification timestamp
    pub last_modified_date_time: Option<DateTime<Utc>>,
    /// Reference to the containing folder
    pub parent_reference: Option<ParentReference>,
    /// Present when the item is a file
    pub file: Option<serde_json::Value>,
    /// Present when the item is a folder
    pub folder: Option<serde_json::Value>,
}

/// Parent folder reference inside an item response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    /// Parent item id
    pub id: Option<String>,
    /// Drive containing the parent
    pub drive_id: Option<String>,
    /// Parent path (e.g. `/drive/root:/Documents`)
    pub path: Option<String>,
}

impl ItemMetadata {
    /// Whether the item is a folder.
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

/// Parses raw response bytes into [`ItemMetadata`].
///
/// A body that does not deserialize indicates the server answered outside
/// the documented contract, so the failure is reported as a protocol
/// violation rather than a server error.
pub fn parse_metadata(bytes: &[u8]) -> Result<ItemMetadata, ApiError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError::Protocol(format!("malformed item metadata: {e}")))
}
