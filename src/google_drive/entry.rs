use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::google_drive::DriveId;

/// The mime type Drive uses to mark a folder. Nothing else distinguishes a
/// folder from a file, so this is only ever compared in [`EntryKind::from_mime_type`].
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    File,
}

impl EntryKind {
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    }
}

/// A file or folder as Drive reports it.
///
/// Serializes to the same camelCase shape the Drive API uses (`size` as a
/// decimal string), so a front end can treat it like a Drive `File` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEntry", into = "WireEntry")]
pub struct DriveEntry {
    pub id: DriveId,
    pub name: String,
    pub kind: EntryKind,
    pub mime_type: String,
    pub modified_time: Option<DateTime<Utc>>,
    /// Byte count; `None` for folders and Google-native documents.
    pub size: Option<u64>,
    /// Drive allows several parents. Index 0 is treated as the canonical one.
    pub parents: Vec<DriveId>,
    pub thumbnail_link: Option<String>,
    pub web_view_link: Option<String>,
    pub icon_link: Option<String>,
}

impl DriveEntry {
    pub fn new(id: impl Into<DriveId>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntryKind::from_mime_type(&mime_type),
            mime_type,
            modified_time: None,
            size: None,
            parents: Vec::new(),
            thumbnail_link: None,
            web_view_link: None,
            icon_link: None,
        }
    }

    pub fn folder(id: impl Into<DriveId>, name: impl Into<String>) -> Self {
        Self::new(id, name, FOLDER_MIME_TYPE)
    }

    pub fn with_parent(mut self, parent: impl Into<DriveId>) -> Self {
        self.parents.push(parent.into());
        self
    }
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
    pub fn with_modified_time(mut self, modified_time: DateTime<Utc>) -> Self {
        self.modified_time = Some(modified_time);
        self
    }
}

impl DriveEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
    pub fn canonical_parent(&self) -> Option<&DriveId> {
        self.parents.first()
    }
    pub fn has_parent(&self, parent: &DriveId) -> bool {
        self.parents.iter().any(|p| p == parent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry {
    id: DriveId,
    name: String,
    mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parents: Vec<DriveId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon_link: Option<String>,
}

impl From<WireEntry> for DriveEntry {
    fn from(wire: WireEntry) -> Self {
        DriveEntry {
            id: wire.id,
            name: wire.name,
            kind: EntryKind::from_mime_type(&wire.mime_type),
            mime_type: wire.mime_type,
            modified_time: wire.modified_time,
            size: wire.size.and_then(|s| s.parse().ok()),
            parents: wire.parents,
            thumbnail_link: wire.thumbnail_link,
            web_view_link: wire.web_view_link,
            icon_link: wire.icon_link,
        }
    }
}

impl From<DriveEntry> for WireEntry {
    fn from(entry: DriveEntry) -> Self {
        WireEntry {
            id: entry.id,
            name: entry.name,
            mime_type: entry.mime_type,
            modified_time: entry.modified_time,
            size: entry.size.map(|s| s.to_string()),
            parents: entry.parents,
            thumbnail_link: entry.thumbnail_link,
            web_view_link: entry.web_view_link,
            icon_link: entry.icon_link,
        }
    }
}
