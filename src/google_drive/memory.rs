use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::auth::GoogleUser;
use crate::google_drive::helpers::listing_order;
use crate::google_drive::service::ensure_fresh;
use crate::google_drive::{
    DriveEntry, DriveError, DriveId, DriveResult, DriveService, FileContent, NewUpload,
    Permission, ShareRequest, StorageQuota,
};

#[derive(Debug, Default)]
struct MemoryState {
    /// insertion order is kept so listings are deterministic for equal timestamps
    entries: Vec<DriveEntry>,
    content: HashMap<DriveId, Bytes>,
    permissions: HashMap<DriveId, Vec<Permission>>,
    quota: StorageQuota,
    failing: HashSet<DriveId>,
    next_id: u64,
}

impl MemoryState {
    fn position(&self, id: &DriveId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }
    fn entry(&self, id: &DriveId) -> DriveResult<&DriveEntry> {
        self.check_failing(id)?;
        self.entries
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| DriveError::NotFound(id.clone()))
    }
    fn check_failing(&self, id: &DriveId) -> DriveResult<()> {
        if self.failing.contains(id) {
            return Err(DriveError::Api {
                status: 500,
                message: format!("Backend error while accessing {}", id),
            });
        }
        Ok(())
    }
    fn next_id(&mut self, prefix: &str) -> DriveId {
        self.next_id += 1;
        DriveId::new(format!("{}-{}", prefix, self.next_id))
    }
}

/// A [`DriveService`] holding everything in memory.
///
/// Used by the test suites and for running the server without Google
/// credentials. Ids of created entries look like `folder-new-1`, `file-new-2`,
/// `permission-new-3`.
#[derive(Debug, Default)]
pub struct MemoryDrive {
    state: RwLock<MemoryState>,
    calls: AtomicUsize,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = DriveEntry>) -> Self {
        MemoryDrive {
            state: RwLock::new(MemoryState {
                entries: entries.into_iter().collect(),
                ..Default::default()
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_content(&self, id: impl Into<DriveId>, content: impl Into<Bytes>) {
        self.state.write().await.content.insert(id.into(), content.into());
    }

    pub async fn set_permissions(&self, id: impl Into<DriveId>, permissions: Vec<Permission>) {
        self.state.write().await.permissions.insert(id.into(), permissions);
    }

    pub async fn set_quota(&self, quota: StorageQuota) {
        self.state.write().await.quota = quota;
    }

    /// Every later call touching `id` fails with a 500 until [`MemoryDrive::recover`].
    pub async fn fail_for(&self, id: impl Into<DriveId>) {
        self.state.write().await.failing.insert(id.into());
    }

    pub async fn recover(&self, id: &DriveId) {
        self.state.write().await.failing.remove(id);
    }

    pub async fn entry(&self, id: &DriveId) -> Option<DriveEntry> {
        let state = self.state.read().await;
        state.entries.iter().find(|e| &e.id == id).cloned()
    }

    /// Number of service calls made so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, user: &GoogleUser) -> DriveResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure_fresh(user)
    }
}

#[async_trait]
impl DriveService for MemoryDrive {
    #[instrument(skip(self, user))]
    async fn list_folder(&self, user: &GoogleUser, folder: &DriveId) -> DriveResult<Vec<DriveEntry>> {
        self.record_call(user)?;
        let state = self.state.read().await;
        state.check_failing(folder)?;
        let mut entries: Vec<DriveEntry> = state
            .entries
            .iter()
            .filter(|e| e.has_parent(folder))
            .cloned()
            .collect();
        entries.sort_by(listing_order);
        debug!("list_folder: {} entries", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self, user))]
    async fn get_entry(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<DriveEntry> {
        self.record_call(user)?;
        let state = self.state.read().await;
        state.entry(id).cloned()
    }

    #[instrument(skip(self, user))]
    async fn download(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<FileContent> {
        self.record_call(user)?;
        let state = self.state.read().await;
        let entry = state.entry(id)?.clone();
        let content = state.content.get(id).cloned().unwrap_or_default();
        let body = futures::stream::once(async move { Ok(content) });
        Ok(FileContent {
            entry,
            body: Box::pin(body),
        })
    }

    #[instrument(skip(self, user, upload), fields(name = %upload.name))]
    async fn upload(&self, user: &GoogleUser, upload: NewUpload) -> DriveResult<DriveEntry> {
        self.record_call(user)?;
        let mut state = self.state.write().await;
        let parent = upload.parent.unwrap_or_else(DriveId::root);
        state.check_failing(&parent)?;
        let id = state.next_id("file-new");
        let size = upload.data.len() as u64;
        let entry = DriveEntry::new(id.clone(), upload.name, upload.mime_type.to_string())
            .with_size(size)
            .with_parent(parent)
            .with_modified_time(Utc::now());
        state.content.insert(id, upload.data);
        state.quota.usage += size;
        state.quota.usage_in_drive += size;
        state.entries.push(entry.clone());
        Ok(entry)
    }

    #[instrument(skip(self, user))]
    async fn create_folder(
        &self,
        user: &GoogleUser,
        name: &str,
        parent: Option<&DriveId>,
    ) -> DriveResult<DriveEntry> {
        self.record_call(user)?;
        let mut state = self.state.write().await;
        let parent = parent.cloned().unwrap_or_else(DriveId::root);
        state.check_failing(&parent)?;
        let id = state.next_id("folder-new");
        let entry = DriveEntry::folder(id, name)
            .with_parent(parent)
            .with_modified_time(Utc::now());
        state.entries.push(entry.clone());
        Ok(entry)
    }

    #[instrument(skip(self, user))]
    async fn delete(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<()> {
        self.record_call(user)?;
        let mut state = self.state.write().await;
        state.entry(id)?;
        // children of a deleted folder go with it, as they do on Drive
        let mut doomed = vec![id.clone()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor].clone();
            for child in state.entries.iter().filter(|e| e.has_parent(&current)) {
                if !doomed.contains(&child.id) {
                    doomed.push(child.id.clone());
                }
            }
            cursor += 1;
        }
        state.entries.retain(|e| !doomed.contains(&e.id));
        for gone in &doomed {
            state.content.remove(gone);
            state.permissions.remove(gone);
        }
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
        self.record_call(user)?;
        let mut state = self.state.write().await;
        state.check_failing(target)?;
        state.entry(id)?;
        let position = state.position(id).ok_or_else(|| DriveError::NotFound(id.clone()))?;
        let entry = &mut state.entries[position];
        if remove_from_parents {
            entry.parents.clear();
        }
        if !entry.has_parent(target) {
            entry.parents.push(target.clone());
        }
        entry.modified_time = Some(Utc::now());
        Ok(entry.clone())
    }

    #[instrument(skip(self, user))]
    async fn search(&self, user: &GoogleUser, query: &str) -> DriveResult<Vec<DriveEntry>> {
        self.record_call(user)?;
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        let mut entries: Vec<DriveEntry> = state
            .entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        entries.sort_by(listing_order);
        Ok(entries)
    }

    #[instrument(skip(self, user))]
    async fn share(&self, user: &GoogleUser, request: &ShareRequest) -> DriveResult<Permission> {
        self.record_call(user)?;
        let mut state = self.state.write().await;
        state.entry(&request.file_id)?;
        let id = state.next_id("permission-new");
        let permission = Permission {
            id: id.into_string(),
            grantee_type: "user".to_string(),
            email_address: Some(request.email_address.clone()),
            role: request.role.to_string(),
        };
        state
            .permissions
            .entry(request.file_id.clone())
            .or_default()
            .push(permission.clone());
        Ok(permission)
    }

    #[instrument(skip(self, user))]
    async fn permissions(&self, user: &GoogleUser, id: &DriveId) -> DriveResult<Vec<Permission>> {
        self.record_call(user)?;
        let state = self.state.read().await;
        state.entry(id)?;
        Ok(state.permissions.get(id).cloned().unwrap_or_default())
    }

    #[instrument(skip(self, user))]
    async fn remove_permission(
        &self,
        user: &GoogleUser,
        id: &DriveId,
        permission_id: &str,
    ) -> DriveResult<()> {
        self.record_call(user)?;
        let mut state = self.state.write().await;
        state.entry(id)?;
        let permissions = state.permissions.entry(id.clone()).or_default();
        let before = permissions.len();
        permissions.retain(|p| p.id != permission_id);
        if permissions.len() == before {
            return Err(DriveError::Api {
                status: 404,
                message: format!("Permission not found: {}", permission_id),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, user))]
    async fn storage_quota(&self, user: &GoogleUser) -> DriveResult<StorageQuota> {
        self.record_call(user)?;
        Ok(self.state.read().await.quota)
    }
}
