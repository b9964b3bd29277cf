use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::{GoogleUser, UserProfile, SESSION_COOKIE};
use crate::google_drive::{
    DriveEntry, DriveError, DriveId, DriveService, NewUpload, Permission, ShareRequest,
    StorageReport,
};
use crate::server::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{message} ({status})")]
    Status { status: u16, message: String },
    #[error("{0} is not a folder")]
    NotAFolder(DriveId),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<DriveError> for ClientError {
    fn from(error: DriveError) -> Self {
        let error = ApiError::from_lookup(error);
        ClientError::Status {
            status: error.status().as_u16(),
            message: error.to_string(),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Where the client data layer gets its data from.
///
/// One method per server route; [`HttpSource`] goes over the wire,
/// [`LocalSource`] calls a [`DriveService`] directly.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// `None` lists the root folder.
    async fn list_files(&self, folder: Option<&DriveId>) -> ClientResult<Vec<DriveEntry>>;
    async fn get_file(&self, id: &DriveId) -> ClientResult<DriveEntry>;
    async fn search(&self, query: &str) -> ClientResult<Vec<DriveEntry>>;
    async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> ClientResult<DriveEntry>;
    async fn upload_file(&self, upload: NewUpload) -> ClientResult<DriveEntry>;
    async fn delete_file(&self, id: &DriveId) -> ClientResult<()>;
    async fn move_file(
        &self,
        id: &DriveId,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> ClientResult<DriveEntry>;
    async fn permissions(&self, id: &DriveId) -> ClientResult<Vec<Permission>>;
    async fn share(&self, request: &ShareRequest) -> ClientResult<Permission>;
    async fn remove_permission(&self, id: &DriveId, permission_id: &str) -> ClientResult<()>;
    async fn storage(&self) -> ClientResult<StorageReport>;
    async fn current_user(&self) -> ClientResult<UserProfile>;
    async fn logout(&self) -> ClientResult<()>;

    /// Where a browser would fetch the attachment from.
    fn download_url(&self, id: &DriveId) -> String {
        download_path(id)
    }
}

/// Same-origin path of the attachment route for `id`.
pub fn download_path(id: &DriveId) -> String {
    format!("/api/drive/files/{}/download", id)
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

/// Talks to a running server with a session cookie.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    http: reqwest::Client,
}

impl HttpSource {
    /// `session` is the raw value of the session cookie, if signed in.
    pub fn new(base: Url, session: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(session) = session {
            let cookie = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, session))?;
            headers.insert(COOKIE, cookie);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(HttpSource { base, http })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let url = self
            .base
            .join(path)
            .map_err(|e| anyhow::anyhow!("invalid request path {}: {}", path, e))?;
        Ok(self.http.request(method, url))
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!("response status: {}", status);
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<MessageBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        Ok(self.send(request).await?.json::<T>().await?)
    }
}

#[async_trait]
impl FileSource for HttpSource {
    #[instrument(skip(self))]
    async fn list_files(&self, folder: Option<&DriveId>) -> ClientResult<Vec<DriveEntry>> {
        let request = match folder {
            Some(folder) if !folder.is_root() => {
                self.request(Method::GET, &format!("/api/drive/folders/{}/files", folder))?
            }
            _ => self.request(Method::GET, "/api/drive/files")?,
        };
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn get_file(&self, id: &DriveId) -> ClientResult<DriveEntry> {
        let request = self.request(Method::GET, &format!("/api/drive/files/{}", id))?;
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> ClientResult<Vec<DriveEntry>> {
        let request = self
            .request(Method::GET, "/api/drive/search")?
            .query(&[("q", query)]);
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> ClientResult<DriveEntry> {
        let request = self
            .request(Method::POST, "/api/drive/folders")?
            .json(&json!({ "name": name, "parentId": parent }));
        self.json(request).await
    }

    #[instrument(skip(self, upload), fields(name = %upload.name))]
    async fn upload_file(&self, upload: NewUpload) -> ClientResult<DriveEntry> {
        let part = Part::bytes(upload.data.to_vec())
            .file_name(upload.name)
            .mime_str(upload.mime_type.as_ref())?;
        let mut form = Form::new().part("file", part);
        if let Some(parent) = upload.parent {
            form = form.text("parentFolderId", parent.into_string());
        }
        let request = self
            .request(Method::POST, "/api/drive/upload")?
            .multipart(form);
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, id: &DriveId) -> ClientResult<()> {
        let request = self.request(Method::DELETE, &format!("/api/drive/files/{}", id))?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn move_file(
        &self,
        id: &DriveId,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> ClientResult<DriveEntry> {
        let request = self
            .request(Method::PATCH, &format!("/api/drive/files/{}/move", id))?
            .json(&json!({
                "targetFolderId": target,
                "removeFromParents": remove_from_parents,
            }));
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn permissions(&self, id: &DriveId) -> ClientResult<Vec<Permission>> {
        let request = self.request(Method::GET, &format!("/api/drive/permissions/{}", id))?;
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn share(&self, request: &ShareRequest) -> ClientResult<Permission> {
        let body = json!({
            "fileId": request.file_id,
            "emailAddress": request.email_address,
            "role": request.role,
            "sendNotification": request.send_notification,
        });
        let request = self.request(Method::POST, "/api/drive/share")?.json(&body);
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn remove_permission(&self, id: &DriveId, permission_id: &str) -> ClientResult<()> {
        let path = format!("/api/drive/permissions/{}/{}", id, permission_id);
        let request = self.request(Method::DELETE, &path)?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn storage(&self) -> ClientResult<StorageReport> {
        let request = self.request(Method::GET, "/api/drive/storage")?;
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn current_user(&self) -> ClientResult<UserProfile> {
        let request = self.request(Method::GET, "/api/auth/user")?;
        self.json(request).await
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> ClientResult<()> {
        let request = self.request(Method::GET, "/api/auth/logout")?;
        self.send(request).await?;
        Ok(())
    }

    fn download_url(&self, id: &DriveId) -> String {
        let path = download_path(id);
        self.base
            .join(&path)
            .map(|url| url.to_string())
            .unwrap_or(path)
    }
}

/// Calls a [`DriveService`] in-process on behalf of one user. Errors are
/// mapped to the statuses the server would answer with.
#[derive(Clone)]
pub struct LocalSource {
    drive: Arc<dyn DriveService>,
    user: GoogleUser,
}

impl LocalSource {
    pub fn new(drive: Arc<dyn DriveService>, user: GoogleUser) -> Self {
        LocalSource { drive, user }
    }
}

#[async_trait]
impl FileSource for LocalSource {
    async fn list_files(&self, folder: Option<&DriveId>) -> ClientResult<Vec<DriveEntry>> {
        let folder = folder.cloned().unwrap_or_else(DriveId::root);
        Ok(self.drive.list_folder(&self.user, &folder).await?)
    }

    async fn get_file(&self, id: &DriveId) -> ClientResult<DriveEntry> {
        Ok(self.drive.get_entry(&self.user, id).await?)
    }

    async fn search(&self, query: &str) -> ClientResult<Vec<DriveEntry>> {
        Ok(self.drive.search(&self.user, query).await?)
    }

    async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> ClientResult<DriveEntry> {
        Ok(self.drive.create_folder(&self.user, name, parent).await?)
    }

    async fn upload_file(&self, upload: NewUpload) -> ClientResult<DriveEntry> {
        Ok(self.drive.upload(&self.user, upload).await?)
    }

    async fn delete_file(&self, id: &DriveId) -> ClientResult<()> {
        Ok(self.drive.delete(&self.user, id).await?)
    }

    async fn move_file(
        &self,
        id: &DriveId,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> ClientResult<DriveEntry> {
        Ok(self
            .drive
            .move_entry(&self.user, id, target, remove_from_parents)
            .await?)
    }

    async fn permissions(&self, id: &DriveId) -> ClientResult<Vec<Permission>> {
        Ok(self.drive.permissions(&self.user, id).await?)
    }

    async fn share(&self, request: &ShareRequest) -> ClientResult<Permission> {
        Ok(self.drive.share(&self.user, request).await?)
    }

    async fn remove_permission(&self, id: &DriveId, permission_id: &str) -> ClientResult<()> {
        Ok(self
            .drive
            .remove_permission(&self.user, id, permission_id)
            .await?)
    }

    async fn storage(&self) -> ClientResult<StorageReport> {
        Ok(self.drive.storage_quota(&self.user).await?.into())
    }

    async fn current_user(&self) -> ClientResult<UserProfile> {
        Ok(self.user.profile())
    }

    async fn logout(&self) -> ClientResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_drive::MemoryDrive;

    #[test]
    fn drive_errors_map_to_server_statuses() {
        let missing: ClientError = DriveError::NotFound(DriveId::from("x")).into();
        assert_eq!(missing.status(), Some(404));
        let expired: ClientError = DriveError::TokenExpired.into();
        assert_eq!(expired.status(), Some(401));
        let upstream: ClientError = DriveError::Api {
            status: 403,
            message: "quota".to_string(),
        }
        .into();
        assert_eq!(upstream.status(), Some(500));
    }

    #[test]
    fn download_url_is_absolute_for_http_sources() {
        let source = HttpSource::new(Url::parse("http://127.0.0.1:5000").unwrap(), None).unwrap();
        assert_eq!(
            source.download_url(&DriveId::from("document-1")),
            "http://127.0.0.1:5000/api/drive/files/document-1/download"
        );
    }

    #[tokio::test]
    async fn local_source_lists_root_for_none() {
        let drive = MemoryDrive::with_entries(vec![
            DriveEntry::folder("folder-1", "Test Folder 1").with_parent("root"),
            DriveEntry::new("document-1", "Test Document.docx", "text/plain").with_parent("folder-1"),
        ]);
        let source = LocalSource::new(Arc::new(drive), GoogleUser::for_tests());
        let root = source.list_files(None).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].id.as_str(), "folder-1");
    }
}
