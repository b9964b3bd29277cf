use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use futures::TryStreamExt;
use google_drive3::api::{File, Scope};
use google_drive3::hyper::client::HttpConnector;
use google_drive3::hyper_rustls::HttpsConnector;
use google_drive3::DriveHub;
use google_drive3::{hyper_rustls, oauth2};
use hyper::Client;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::auth::GoogleUser;
use crate::google_drive::helpers::{
    classify_error, entry_from_drive_file, escape_query_value, permission_from_drive,
};
use crate::google_drive::service::ensure_fresh;
use crate::google_drive::{
    DriveEntry, DriveId, DriveResult, DriveService, FileContent, NewUpload, Permission,
    ShareRequest, StorageQuota, FOLDER_MIME_TYPE, ROOT_ALIAS,
};

const FIELDS_FILE: &str =
    "id, name, mimeType, size, parents, modifiedTime, iconLink, thumbnailLink, webViewLink";
const FIELDS_PERMISSION: &str = "id, type, emailAddress, role";
const LIST_ORDER: &str = "folder,modifiedTime desc";
const PAGE_SIZE: i32 = 100;

type Hub = DriveHub<HttpsConnector<HttpConnector>>;

/// [`DriveService`] backed by the Drive v3 REST API.
///
/// One hyper client is shared by every request; the hub is rebuilt per call
/// around the calling user's access token. Each user's real root folder id
/// is looked up once and remembered, keyed by user id.
#[derive(Clone)]
pub struct GoogleDrive {
    client: Client<HttpsConnector<HttpConnector>>,
    root_ids: Arc<RwLock<HashMap<String, DriveId>>>,
}

impl GoogleDrive {
    pub fn new() -> Self {
        let client = Client::builder().build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .https_or_http()
                .enable_http1()
                .enable_http2()
                .build(),
        );
        GoogleDrive {
            client,
            root_ids: Arc::default(),
        }
    }

    async fn hub(&self, user: &GoogleUser) -> DriveResult<Hub> {
        ensure_fresh(user)?;
        let auth = oauth2::AccessTokenAuthenticator::builder(user.access_token.clone())
            .build()
            .await
            .context("could not build access token authenticator")?;
        Ok(DriveHub::new(self.client.clone(), auth))
    }

    /// The id Drive reports in `parents` for the user's top-level folder.
    async fn root_id(&self, hub: &Hub, user: &GoogleUser) -> DriveResult<DriveId> {
        if let Some(id) = self.root_ids.read().await.get(&user.id) {
            return Ok(id.clone());
        }
        let (_response, root) = hub
            .files()
            .get(ROOT_ALIAS)
            .add_scope(Scope::Full)
            .param("fields", "id")
            .doit()
            .await
            .map_err(|e| classify_error(e, None))?;
        let id = DriveId::from(root.id.ok_or(anyhow!("root folder has no id"))?);
        debug!("root_id: {} for user {}", id, user.id);
        self.root_ids
            .write()
            .await
            .insert(user.id.clone(), id.clone());
        Ok(id)
    }
}

impl Default for GoogleDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleDrive {
    #[instrument(skip(self, hub, root))]
    async fn list_by_query(
        &self,
        hub: &Hub,
        root: &DriveId,
        query: &str,
    ) -> DriveResult<Vec<DriveEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            debug!("list_by_query: page_token: {:?}", page_token);
            let mut request = hub
                .files()
                .list()
                .q(query)
                .order_by(LIST_ORDER)
                .page_size(PAGE_SIZE)
                .add_scope(Scope::Full)
                .param("fields", &format!("nextPageToken, files({})", FIELDS_FILE));
            if let Some(page_token) = &page_token {
                request = request.page_token(page_token);
            }
            let (_response, result) = request.doit().await.map_err(|e| classify_error(e, None))?;
            let files = result.files.ok_or(anyhow!("no file list returned"))?;
            debug!("list_by_query: response: {:?}", files.len());
            for file in files {
                entries.push(entry_from_drive_file(file, root)?);
            }
            page_token = result.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(entries)
    }

    async fn fetch_entry(&self, hub: &Hub, root: &DriveId, id: &DriveId) -> DriveResult<DriveEntry> {
        let (_response, file) = hub
            .files()
            .get(id.as_str())
            .add_scope(Scope::Full)
            .param("fields", FIELDS_FILE)
            .doit()
            .await
            .map_err(|e| classify_error(e, Some(id)))?;
        Ok(entry_from_drive_file(file, root)?)
    }
}

#[async_trait]
impl DriveService for GoogleDrive {
    #[instrument(skip(self, user))]
    async fn list_folder(&self, user: &GoogleUser, folder: &DriveId) -> DriveResult<Vec<DriveEntry>> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query_value(folder.as_str())
        );
        self.list_by_query(&hub, &root, &query).await
    }

    #[instrument(skip(self, user))]
    async fn get_entry(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<DriveEntry> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        self.fetch_entry(&hub, &root, id).await
    }

    #[instrument(skip(self, user))]
    async fn download(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<FileContent> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        let entry = self.fetch_entry(&hub, &root, id).await?;
        let (response, _file) = hub
            .files()
            .get(id.as_str())
            .add_scope(Scope::Readonly)
            .acknowledge_abuse(true)
            .param("alt", "media")
            .doit()
            .await
            .map_err(|e| classify_error(e, Some(id)))?;
        debug!("download: response status: {:?}", response.status());
        let body = response
            .into_body()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(FileContent {
            entry,
            body: Box::pin(body),
        })
    }

    #[instrument(skip(self, user, upload), fields(name = %upload.name, size = upload.data.len()))]
    async fn upload(&self, user: &GoogleUser, upload: NewUpload) -> DriveResult<DriveEntry> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        let metadata = File {
            name: Some(upload.name),
            mime_type: Some(upload.mime_type.to_string()),
            parents: upload.parent.map(|p| vec![p.into_string()]),
            ..Default::default()
        };
        let (response, file) = hub
            .files()
            .create(metadata)
            .add_scope(Scope::Full)
            .param("fields", FIELDS_FILE)
            .upload(Cursor::new(upload.data.to_vec()), upload.mime_type)
            .await
            .map_err(|e| classify_error(e, None))?;
        debug!("upload(): response: {:?}", response.status());
        Ok(entry_from_drive_file(file, &root)?)
    }

    #[instrument(skip(self, user))]
    async fn create_folder(
        &self,
        user: &GoogleUser,
        name: &str,
        parent: Option<&DriveId>,
    ) -> DriveResult<DriveEntry> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        let metadata = File {
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: Some(vec![parent.cloned().unwrap_or_else(DriveId::root).into_string()]),
            ..Default::default()
        };
        // metadata-only create: the generated client only exposes upload variants
        let (_response, file) = hub
            .files()
            .create(metadata)
            .add_scope(Scope::Full)
            .param("fields", FIELDS_FILE)
            .upload(Cursor::new(Vec::<u8>::new()), mime::APPLICATION_OCTET_STREAM)
            .await
            .map_err(|e| classify_error(e, parent))?;
        Ok(entry_from_drive_file(file, &root)?)
    }

    #[instrument(skip(self, user))]
    async fn delete(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<()> {
        let hub = self.hub(user).await?;
        hub.files()
            .delete(id.as_str())
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(|e| classify_error(e, Some(id)))?;
        Ok(())
    }

    #[instrument(skip(self, user))]
    async fn move_entry(
        &self,
        user: &GoogleUser,
        id: &DriveId,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> DriveResult<DriveEntry> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        let current = self.fetch_entry(&hub, &root, id).await?;
        let current_parents = current
            .parents
            .iter()
            .filter(|p| *p != target)
            .map(|p| if p.is_root() { root.as_str() } else { p.as_str() })
            .collect::<Vec<_>>()
            .join(",");
        debug!("move_entry: current parents: {:?}", current_parents);

        let mut request = hub
            .files()
            .update(File::default(), id.as_str())
            .add_parents(target.as_str())
            .add_scope(Scope::Full)
            .param("fields", FIELDS_FILE);
        if remove_from_parents && !current_parents.is_empty() {
            request = request.remove_parents(&current_parents);
        }
        let (_response, file) = request
            .doit_without_upload()
            .await
            .map_err(|e| classify_error(e, Some(id)))?;
        Ok(entry_from_drive_file(file, &root)?)
    }

    #[instrument(skip(self, user))]
    async fn search(&self, user: &GoogleUser, query: &str) -> DriveResult<Vec<DriveEntry>> {
        let hub = self.hub(user).await?;
        let root = self.root_id(&hub, user).await?;
        let query = format!(
            "name contains '{}' and trashed = false",
            escape_query_value(query)
        );
        self.list_by_query(&hub, &root, &query).await
    }

    #[instrument(skip(self, user))]
    async fn share(&self, user: &GoogleUser, request: &ShareRequest) -> DriveResult<Permission> {
        let hub = self.hub(user).await?;
        let permission = google_drive3::api::Permission {
            type_: Some("user".to_string()),
            email_address: Some(request.email_address.clone()),
            role: Some(request.role.to_string()),
            ..Default::default()
        };
        let (_response, created) = hub
            .permissions()
            .create(permission, request.file_id.as_str())
            .send_notification_email(request.send_notification)
            .add_scope(Scope::Full)
            .param("fields", FIELDS_PERMISSION)
            .doit()
            .await
            .map_err(|e| classify_error(e, Some(&request.file_id)))?;
        Ok(permission_from_drive(created)?)
    }

    #[instrument(skip(self, user))]
    async fn permissions(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<Vec<Permission>> {
        let hub = self.hub(user).await?;
        let (_response, list) = hub
            .permissions()
            .list(id.as_str())
            .add_scope(Scope::Full)
            .param("fields", &format!("permissions({})", FIELDS_PERMISSION))
            .doit()
            .await
            .map_err(|e| classify_error(e, Some(id)))?;
        let mut permissions = Vec::new();
        for permission in list.permissions.unwrap_or_default() {
            permissions.push(permission_from_drive(permission)?);
        }
        Ok(permissions)
    }

    #[instrument(skip(self, user))]
    async fn remove_permission(
        &self,
        user: &GoogleUser,
        id: &DriveId,
        permission_id: &str,
    ) -> DriveResult<()> {
        let hub = self.hub(user).await?;
        hub.permissions()
            .delete(id.as_str(), permission_id)
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(|e| classify_error(e, Some(id)))?;
        Ok(())
    }

    #[instrument(skip(self, user))]
    async fn storage_quota(&self, user: &GoogleUser) -> DriveResult<StorageQuota> {
        let hub = self.hub(user).await?;
        let (_response, about) = hub
            .about()
            .get()
            .add_scope(Scope::Full)
            .param("fields", "storageQuota")
            .doit()
            .await
            .map_err(|e| classify_error(e, None))?;
        let quota = about
            .storage_quota
            .ok_or(anyhow!("no storage quota returned"))?;
        let non_negative = |v: Option<i64>| v.and_then(|v| u64::try_from(v).ok());
        Ok(StorageQuota {
            usage: non_negative(quota.usage).unwrap_or(0),
            limit: non_negative(quota.limit),
            usage_in_drive: non_negative(quota.usage_in_drive).unwrap_or(0),
            usage_in_trash: non_negative(quota.usage_in_drive_trash).unwrap_or(0),
        })
    }
}

impl Debug for GoogleDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleDrive")
    }
}

impl Display for GoogleDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleDrive")
    }
}
