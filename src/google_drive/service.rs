use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::auth::GoogleUser;
use crate::google_drive::{DriveEntry, DriveId, Permission, ShareRequest, StorageQuota};

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("File not found: {0}")]
    NotFound(DriveId),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Token expired, please re-authenticate")]
    TokenExpired,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DriveResult<T> = std::result::Result<T, DriveError>;

/// Metadata plus a streamed body, returned by [`DriveService::download`].
pub struct FileContent {
    pub entry: DriveEntry,
    pub body: ByteStream,
}

#[derive(Debug, Clone)]
pub struct NewUpload {
    pub name: String,
    pub mime_type: mime::Mime,
    /// `None` uploads into the root folder.
    pub parent: Option<DriveId>,
    pub data: Bytes,
}

/// Every Drive operation the server exposes.
///
/// Implementations must reject users whose access token is past its expiry
/// with [`DriveError::TokenExpired`] before talking to Drive.
#[async_trait]
pub trait DriveService: Send + Sync + 'static {
    /// Non-trashed children of `folder`, folders first then newest first.
    async fn list_folder(&self, user: &GoogleUser, folder: &DriveId) -> DriveResult<Vec<DriveEntry>>;

    async fn get_entry(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<DriveEntry>;

    async fn download(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<FileContent>;

    async fn upload(&self, user: &GoogleUser, upload: NewUpload) -> DriveResult<DriveEntry>;

    async fn create_folder(
        &self,
        user: &GoogleUser,
        name: &str,
        parent: Option<&DriveId>,
    ) -> DriveResult<DriveEntry>;

    async fn delete(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<()>;

    /// Adds `target` as a parent. With `remove_from_parents` every current
    /// parent is detached first, so the entry ends up only in `target`.
    async fn move_entry(
        &self,
        user: &GoogleUser,
        id: &DriveId,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> DriveResult<DriveEntry>;

    /// Case-insensitive name match over non-trashed entries.
    async fn search(&self, user: &GoogleUser, query: &str) -> DriveResult<Vec<DriveEntry>>;

    async fn share(&self, user: &GoogleUser, request: &ShareRequest) -> DriveResult<Permission>;

    async fn permissions(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<Vec<Permission>>;

    async fn remove_permission(
        &self,
        user: &GoogleUser,
        id: &DriveId,
        permission_id: &str,
    ) -> DriveResult<()>;

    async fn storage_quota(&self, user: &GoogleUser) -> DriveResult<StorageQuota>;
}

pub(crate) fn ensure_fresh(user: &GoogleUser) -> DriveResult<()> {
    if user.is_expired() {
        return Err(DriveError::TokenExpired);
    }
    Ok(())
}
