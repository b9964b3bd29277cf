use std::cmp::Ordering;

use anyhow::anyhow;
use google_drive3::api::File;

use crate::google_drive::{DriveEntry, DriveError, DriveId, Permission};

/// Escapes a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Folders first, then most recently modified first. Matches the
/// `folder,modifiedTime desc` ordering requested from Drive.
pub fn listing_order(a: &DriveEntry, b: &DriveEntry) -> Ordering {
    b.is_folder()
        .cmp(&a.is_folder())
        .then_with(|| b.modified_time.cmp(&a.modified_time))
}

/// Converts hub metadata into a [`DriveEntry`]. Drive reports the top-level
/// folder by its real id; `root` is that id, and parents equal to it are
/// rewritten to the root alias so callers only ever see one root.
pub(crate) fn entry_from_drive_file(file: File, root: &DriveId) -> anyhow::Result<DriveEntry> {
    let id = file.id.ok_or(anyhow!("file metadata has no id"))?;
    let mime_type = file
        .mime_type
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
    let mut entry = DriveEntry::new(id, file.name.unwrap_or_default(), mime_type);
    entry.modified_time = file.modified_time;
    entry.size = file.size.and_then(|s| u64::try_from(s).ok());
    entry.parents = file
        .parents
        .unwrap_or_default()
        .into_iter()
        .map(DriveId::from)
        .map(|parent| if &parent == root { DriveId::root() } else { parent })
        .collect();
    entry.thumbnail_link = file.thumbnail_link;
    entry.web_view_link = file.web_view_link;
    entry.icon_link = file.icon_link;
    Ok(entry)
}

pub(crate) fn permission_from_drive(
    permission: google_drive3::api::Permission,
) -> anyhow::Result<Permission> {
    Ok(Permission {
        id: permission.id.ok_or(anyhow!("permission has no id"))?,
        grantee_type: permission.type_.unwrap_or_else(|| "user".to_string()),
        email_address: permission.email_address,
        role: permission.role.unwrap_or_default(),
    })
}

/// Maps a failed hub call onto [`DriveError`]. `subject` is the entry the
/// call was about; a 404 for it becomes [`DriveError::NotFound`].
pub(crate) fn classify_error(error: google_drive3::Error, subject: Option<&DriveId>) -> DriveError {
    match error {
        google_drive3::Error::BadRequest(body) => {
            let status = body["error"]["code"]
                .as_u64()
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(400);
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            api_error(status, message, subject)
        }
        google_drive3::Error::Failure(response) => {
            let status = response.status().as_u16();
            api_error(
                status,
                format!("Drive request failed with status {}", status),
                subject,
            )
        }
        other => DriveError::Api {
            status: 500,
            message: other.to_string(),
        },
    }
}

fn api_error(status: u16, message: String, subject: Option<&DriveId>) -> DriveError {
    match subject {
        Some(id) if status == 404 => DriveError::NotFound(id.clone()),
        _ => DriveError::Api { status, message },
    }
}
