//! Data model shared between the gateway and the state store.
//!
//! Field names follow the server's camelCase JSON payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned folder identifier.
pub type FolderId = String;

/// Server-assigned note identifier.
pub type NoteId = String;

/// A named container grouping notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    /// Parent reference; carried through but not interpreted as a hierarchy.
    #[serde(default)]
    pub parent_folder_id: Option<FolderId>,
}

impl Folder {
    pub fn new(id: impl Into<FolderId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_folder_id: None,
        }
    }
}

/// A unit of user content owned by exactly one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub folder_id: FolderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Build a note stamped with the current time (used by test doubles and
    /// fixtures; real notes come from the server).
    pub fn new(
        id: impl Into<NoteId>,
        folder_id: impl Into<FolderId>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            folder_id: folder_id.into(),
            title: None,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns true when `content` has nothing worth persisting.
pub fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}
