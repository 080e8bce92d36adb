//! Item pointers and API path resolution
//!
//! A [`Pointer`] is a logical reference to a remote drive item, either by
//! opaque item id or by a hierarchical path under the drive root. Resolution
//! turns a pointer into the canonical API path the service expects:
//!
//! - id:   `/drive/items/{id}`
//! - path: `/drive/root:/{segment}/{segment}`
//!
//! Operators select a sub-resource or action on the referenced item and are
//! appended only at resolution time. The suffix convention differs by
//! pointer kind (`/content` for id pointers, `:/content` for path pointers);
//! both forms are part of the service's wire contract.

use std::fmt::{self, Display, Formatter};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::errors::ApiError;

/// Characters kept literal when escaping a single path segment.
///
/// Everything else non-alphanumeric is percent-encoded. Notably `/` is NOT
/// in this set: a literal slash inside a segment must be escaped so that the
/// slashes joining segments remain the only separators.
const SEGMENT_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Escapes one path segment for use inside an API path.
fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ESCAPE).to_string()
}

// ============================================================================
// Operator
// ============================================================================

/// Sub-resource or action suffix appended to a resolved item path.
///
/// The wire strings are fixed by the service API and must match verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Raw file content (`content`)
    Content,
    /// Child items of a folder (`children`)
    Children,
    /// Asynchronous server-side copy (`action.copy`)
    ActionCopy,
    /// Resumable upload session creation (`upload.createSession`)
    UploadCreateSession,
}

impl Operator {
    /// The exact suffix string sent on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Operator::Content => "content",
            Operator::Children => "children",
            Operator::ActionCopy => "action.copy",
            Operator::UploadCreateSession => "upload.createSession",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ============================================================================
// Pointer
// ============================================================================

/// Logical reference to a remote item, by id or by path.
///
/// Exactly one addressing mode is active per pointer. A pointer is immutable;
/// resolution never mutates it and operators are never stored pre-resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pointer {
    /// Reference by opaque item id
    Id {
        /// Drive containing the item; `None` selects the default drive
        drive_id: Option<String>,
        /// Opaque item id issued by the service
        item_id: String,
    },
    /// Reference by path segments under the drive root
    Path {
        /// Drive containing the item; `None` selects the default drive
        drive_id: Option<String>,
        /// Raw (unescaped) path segments from root to the item
        segments: Vec<String>,
    },
}

impl Pointer {
    /// Creates an id pointer on the default drive.
    pub fn from_id(item_id: impl Into<String>) -> Self {
        Pointer::Id {
            drive_id: None,
            item_id: item_id.into(),
        }
    }

    /// Creates a path pointer on the default drive from raw segments.
    ///
    /// Segments must not be escaped; escaping happens at resolution time.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Pointer::Path {
            drive_id: None,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a path pointer to the drive root.
    pub fn root() -> Self {
        Pointer::from_segments(Vec::<String>::new())
    }

    /// Drive prefix for this pointer (`/drive` or `/drives/{id}`).
    fn drive_prefix(&self) -> String {
        let drive_id = match self {
            Pointer::Id { drive_id, .. } | Pointer::Path { drive_id, .. } => drive_id.as_deref(),
        };
        match drive_id {
            Some(id) => format!("/drives/{}", encode_segment(id)),
            None => "/drive".to_string(),
        }
    }

    /// Resolves the pointer to its canonical API path, without any operator.
    ///
    /// Each path segment is escaped independently so that the literal `/`
    /// separators between segments survive.
    pub fn resolve(&self) -> String {
        match self {
            Pointer::Id { item_id, .. } => {
                format!("{}/items/{}", self.drive_prefix(), encode_segment(item_id))
            }
            Pointer::Path { segments, .. } => {
                if segments.is_empty() {
                    format!("{}/root", self.drive_prefix())
                } else {
                    let escaped: Vec<String> =
                        segments.iter().map(|s| encode_segment(s)).collect();
                    format!("{}/root:/{}", self.drive_prefix(), escaped.join("/"))
                }
            }
        }
    }

    /// Resolves the pointer with an operator suffix appended.
    ///
    /// Id pointers use the plain `/operator` form, path pointers the
    /// `:/operator` form. Requesting an operator the pointer kind cannot
    /// express is a caller programming error, reported as
    /// [`ApiError::Protocol`].
    pub fn resolve_operator(&self, operator: Operator) -> Result<String, ApiError> {
        match self {
            Pointer::Id { .. } => match operator {
                // A bare id cannot name the new file an upload session
                // creates; callers must resolve a child path first.
                Operator::UploadCreateSession => Err(ApiError::Protocol(format!(
                    "operator `{}` is not addressable through an id pointer",
                    operator
                ))),
                _ => Ok(format!("{}/{}", self.resolve(), operator.as_wire())),
            },
            Pointer::Path { segments, .. } => {
                if segments.is_empty() {
                    // The root folder has no `:` form; only `children` makes
                    // sense and uses the plain suffix.
                    match operator {
                        Operator::Children => Ok(format!("{}/{}", self.resolve(), operator.as_wire())),
                        _ => Err(ApiError::Protocol(format!(
                            "operator `{}` cannot be applied to the drive root",
                            operator
                        ))),
                    }
                } else {
                    Ok(format!("{}:/{}", self.resolve(), operator.as_wire()))
                }
            }
        }
    }

    /// Returns a new path pointer referencing `child_name` under this pointer.
    ///
    /// Only path pointers can be extended; extending an id pointer is a
    /// caller programming error.
    pub fn resolve_child(&self, child_name: impl Into<String>) -> Result<Pointer, ApiError> {
        match self {
            Pointer::Path { drive_id, segments } => {
                let mut segments = segments.clone();
                segments.push(child_name.into());
                Ok(Pointer::Path {
                    drive_id: drive_id.clone(),
                    segments,
                })
            }
            Pointer::Id { .. } => Err(ApiError::Protocol(
                "cannot resolve a child name under an id pointer".to_string(),
            )),
        }
    }

    /// JSON `parentReference` fragment for copy/move request bodies.
    pub fn to_parent_reference(&self) -> serde_json::Value {
        match self {
            Pointer::Id { drive_id, item_id } => {
                let mut obj = serde_json::json!({ "id": item_id });
                if let Some(drive_id) = drive_id {
                    obj["driveId"] = serde_json::json!(drive_id);
                }
                obj
            }
            Pointer::Path { segments, .. } => {
                // parentReference paths are sent unescaped
                let path = if segments.is_empty() {
                    "/drive/root:".to_string()
                } else {
                    format!("/drive/root:/{}", segments.join("/"))
                };
                serde_json::json!({ "path": path })
            }
        }
    }
}

impl Display for Pointer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolve())
    }
}
