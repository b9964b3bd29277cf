use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::UserProfile;
use crate::client::query::{Invalidate, QueryKey, QueryState};
use crate::client::source::ClientResult;
use crate::client::DataClient;
use crate::google_drive::{DriveEntry, DriveId, NewUpload, Permission, ShareRequest, StorageReport};

/// Progress of the latest mutation a hook ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationState {
    pub is_pending: bool,
    pub is_error: bool,
    pub error: Option<String>,
}

/// Cache entries to drop once the matching mutation has succeeded.
pub mod invalidation {
    use super::*;

    pub fn create_folder(parent: Option<&DriveId>) -> Vec<Invalidate> {
        vec![
            Invalidate::Key(QueryKey::Files(None)),
            Invalidate::Key(QueryKey::files(parent)),
            Invalidate::AllSearches,
        ]
    }

    pub fn upload_file(parent: Option<&DriveId>) -> Vec<Invalidate> {
        vec![
            Invalidate::Key(QueryKey::files(parent)),
            Invalidate::AllSearches,
            Invalidate::Key(QueryKey::Storage),
        ]
    }

    pub fn delete_file(entry: &DriveEntry) -> Vec<Invalidate> {
        let mut rules: Vec<Invalidate> = entry
            .parents
            .iter()
            .map(|parent| Invalidate::Key(QueryKey::files(Some(parent))))
            .collect();
        if rules.is_empty() {
            rules.push(Invalidate::Key(QueryKey::Files(None)));
        }
        rules.extend([
            Invalidate::Key(QueryKey::File(entry.id.clone())),
            Invalidate::Key(QueryKey::Permissions(entry.id.clone())),
            Invalidate::AllSearches,
            Invalidate::Key(QueryKey::Storage),
        ]);
        rules
    }

    pub fn move_file(entry: &DriveEntry, target: &DriveId) -> Vec<Invalidate> {
        let mut rules: Vec<Invalidate> = entry
            .parents
            .iter()
            .map(|parent| Invalidate::Key(QueryKey::files(Some(parent))))
            .collect();
        rules.extend([
            Invalidate::Key(QueryKey::files(Some(target))),
            Invalidate::Key(QueryKey::File(entry.id.clone())),
            Invalidate::AllSearches,
        ]);
        rules
    }

    pub fn permissions_changed(file_id: &DriveId) -> Vec<Invalidate> {
        vec![Invalidate::Key(QueryKey::Permissions(file_id.clone()))]
    }
}

/// Runs one mutation, tracking its state and invalidating only on success.
async fn mutate<T, Fut>(
    client: &DataClient,
    state: &Mutex<MutationState>,
    rules: Vec<Invalidate>,
    operation: Fut,
) -> ClientResult<T>
where
    Fut: Future<Output = ClientResult<T>>,
{
    *state.lock().await = MutationState {
        is_pending: true,
        ..Default::default()
    };
    let result = operation.await;
    let mut state = state.lock().await;
    match &result {
        Ok(_) => {
            client.cache().invalidate(&rules).await;
            *state = MutationState::default();
        }
        Err(e) => {
            warn!("mutation failed, cache left untouched: {}", e);
            *state = MutationState {
                is_pending: false,
                is_error: true,
                error: Some(e.to_string()),
            };
        }
    }
    result
}

/// Listing of one folder plus the mutations that change folders.
#[derive(Debug)]
pub struct FilesHook {
    client: DataClient,
    folder: Option<DriveId>,
    mutation: Mutex<MutationState>,
}

impl FilesHook {
    /// `None` (or the root alias) is the root folder.
    pub fn new(client: DataClient, folder: Option<DriveId>) -> Self {
        FilesHook {
            client,
            folder: folder.filter(|f| !f.is_root()),
            mutation: Mutex::default(),
        }
    }

    pub fn folder(&self) -> Option<&DriveId> {
        self.folder.as_ref()
    }

    pub async fn files(&self) -> QueryState<Vec<DriveEntry>> {
        let source = self.client.source();
        let folder = self.folder.as_ref();
        self.client
            .cache()
            .query(QueryKey::files(folder), move || source.list_files(folder))
            .await
    }

    pub async fn refetch(&self) -> QueryState<Vec<DriveEntry>> {
        let source = self.client.source();
        let folder = self.folder.as_ref();
        self.client
            .cache()
            .refetch(QueryKey::files(folder), move || source.list_files(folder))
            .await
    }

    pub async fn file(&self, id: &DriveId) -> QueryState<DriveEntry> {
        let source = self.client.source();
        self.client
            .cache()
            .query(QueryKey::File(id.clone()), move || source.get_file(id))
            .await
    }

    pub async fn create_folder(&self, name: &str, parent: Option<&DriveId>) -> ClientResult<DriveEntry> {
        let operation = self.client.source().create_folder(name, parent);
        mutate(
            &self.client,
            &self.mutation,
            invalidation::create_folder(parent),
            operation,
        )
        .await
    }

    pub async fn upload_file(&self, upload: NewUpload) -> ClientResult<DriveEntry> {
        let rules = invalidation::upload_file(upload.parent.as_ref());
        let operation = self.client.source().upload_file(upload);
        mutate(&self.client, &self.mutation, rules, operation).await
    }

    pub async fn delete_file(&self, entry: &DriveEntry) -> ClientResult<()> {
        let operation = self.client.source().delete_file(&entry.id);
        mutate(
            &self.client,
            &self.mutation,
            invalidation::delete_file(entry),
            operation,
        )
        .await
    }

    pub async fn move_file(
        &self,
        entry: &DriveEntry,
        target: &DriveId,
        remove_from_parents: bool,
    ) -> ClientResult<DriveEntry> {
        let operation = self
            .client
            .source()
            .move_file(&entry.id, target, remove_from_parents);
        mutate(
            &self.client,
            &self.mutation,
            invalidation::move_file(entry, target),
            operation,
        )
        .await
    }

    pub async fn mutation_state(&self) -> MutationState {
        self.mutation.lock().await.clone()
    }
}

#[derive(Debug)]
pub struct SearchHook {
    client: DataClient,
}

impl SearchHook {
    pub fn new(client: DataClient) -> Self {
        SearchHook { client }
    }

    /// A blank query resolves to an empty result without a request.
    pub async fn search(&self, query: &str) -> QueryState<Vec<DriveEntry>> {
        let query = query.trim();
        if query.is_empty() {
            return QueryState::success(Vec::new());
        }
        let source = self.client.source();
        self.client
            .cache()
            .query(QueryKey::Search(query.to_string()), move || source.search(query))
            .await
    }
}

#[derive(Debug)]
pub struct SharingHook {
    client: DataClient,
    mutation: Mutex<MutationState>,
}

impl SharingHook {
    pub fn new(client: DataClient) -> Self {
        SharingHook {
            client,
            mutation: Mutex::default(),
        }
    }

    pub async fn permissions(&self, file_id: &DriveId) -> QueryState<Vec<Permission>> {
        let source = self.client.source();
        self.client
            .cache()
            .query(QueryKey::Permissions(file_id.clone()), move || {
                source.permissions(file_id)
            })
            .await
    }

    pub async fn share(&self, request: &ShareRequest) -> ClientResult<Permission> {
        debug!("share {} with {}", request.file_id, request.email_address);
        let operation = self.client.source().share(request);
        mutate(
            &self.client,
            &self.mutation,
            invalidation::permissions_changed(&request.file_id),
            operation,
        )
        .await
    }

    pub async fn remove_permission(&self, file_id: &DriveId, permission_id: &str) -> ClientResult<()> {
        let operation = self.client.source().remove_permission(file_id, permission_id);
        mutate(
            &self.client,
            &self.mutation,
            invalidation::permissions_changed(file_id),
            operation,
        )
        .await
    }

    pub async fn mutation_state(&self) -> MutationState {
        self.mutation.lock().await.clone()
    }
}

#[derive(Debug)]
pub struct StorageHook {
    client: DataClient,
}

impl StorageHook {
    pub fn new(client: DataClient) -> Self {
        StorageHook { client }
    }

    pub async fn storage(&self) -> QueryState<StorageReport> {
        let source = self.client.source();
        self.client
            .cache()
            .query(QueryKey::Storage, move || source.storage())
            .await
    }
}

#[derive(Debug)]
pub struct AuthHook {
    client: DataClient,
}

impl AuthHook {
    pub fn new(client: DataClient) -> Self {
        AuthHook { client }
    }

    pub async fn user(&self) -> QueryState<UserProfile> {
        let source = self.client.source();
        self.client
            .cache()
            .query(QueryKey::CurrentUser, move || source.current_user())
            .await
    }

    /// Ends the session; every cached query belonged to it, so all of them go.
    pub async fn logout(&self) -> ClientResult<()> {
        self.client.source().logout().await?;
        self.client.cache().clear().await;
        info!("logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::GoogleUser;
    use crate::client::LocalSource;
    use crate::google_drive::{DriveService, MemoryDrive, Role};

    fn drive() -> Arc<MemoryDrive> {
        Arc::new(MemoryDrive::with_entries(vec![
            DriveEntry::folder("folder-1", "Test Folder 1").with_parent("root"),
            DriveEntry::folder("folder-2", "Test Folder 2").with_parent("root"),
            DriveEntry::new("document-1", "Test Document.docx", "text/plain")
                .with_size(12345)
                .with_parent("folder-1"),
            DriveEntry::new("pdf-1", "Test PDF.pdf", "application/pdf")
                .with_size(98765)
                .with_parent("folder-2"),
        ]))
    }

    fn client(drive: &Arc<MemoryDrive>) -> DataClient {
        let service: Arc<dyn DriveService> = drive.clone();
        DataClient::new(Arc::new(LocalSource::new(service, GoogleUser::for_tests())))
    }

    #[test]
    fn delete_of_a_root_entry_invalidates_the_root_listing() {
        let entry = DriveEntry::folder("folder-1", "Test Folder 1").with_parent("root");
        let rules = invalidation::delete_file(&entry);
        assert!(rules.contains(&Invalidate::Key(QueryKey::Files(None))));
        assert!(rules.contains(&Invalidate::Key(QueryKey::File(DriveId::from("folder-1")))));
        assert!(rules.contains(&Invalidate::Key(QueryKey::Storage)));

        let orphan = DriveEntry::new("x", "x.txt", "text/plain");
        assert!(invalidation::delete_file(&orphan).contains(&Invalidate::Key(QueryKey::Files(None))));
    }

    #[tokio::test]
    async fn top_level_entry_from_drive_invalidates_the_root_listing() {
        let file = google_drive3::api::File {
            id: Some("folder-1".to_string()),
            name: Some("Test Folder 1".to_string()),
            mime_type: Some(crate::google_drive::FOLDER_MIME_TYPE.to_string()),
            parents: Some(vec!["0AAbCdRealRootId".to_string()]),
            ..Default::default()
        };
        let root = DriveId::from("0AAbCdRealRootId");
        let entry = crate::google_drive::helpers::entry_from_drive_file(file, &root).unwrap();

        let cache = crate::client::QueryCache::default();
        cache.put(QueryKey::Files(None), Vec::<DriveEntry>::new()).await;
        assert!(cache.invalidate(&invalidation::delete_file(&entry)).await >= 1);
        assert!(!cache.contains(&QueryKey::Files(None)).await);

        cache.put(QueryKey::Files(None), Vec::<DriveEntry>::new()).await;
        let target = DriveId::from("folder-2");
        cache.invalidate(&invalidation::move_file(&entry, &target)).await;
        assert!(!cache.contains(&QueryKey::Files(None)).await);
    }

    #[tokio::test]
    async fn create_folder_invalidates_root_parent_and_searches() {
        let drive = drive();
        let client = client(&drive);
        let cache = client.cache();
        let parent = DriveId::from("folder-1");
        cache.put(QueryKey::Files(None), Vec::<DriveEntry>::new()).await;
        cache.put(QueryKey::Files(Some(parent.clone())), Vec::<DriveEntry>::new()).await;
        cache.put(QueryKey::Search("Test".to_string()), Vec::<DriveEntry>::new()).await;
        cache.put(QueryKey::Storage, 0u8).await;

        let hook = FilesHook::new(client.clone(), Some(parent.clone()));
        let folder = hook.create_folder("New Folder", Some(&parent)).await.unwrap();
        assert!(folder.is_folder());

        assert_eq!(cache.keys().await, vec![QueryKey::Storage]);
        assert_eq!(hook.mutation_state().await, MutationState::default());
    }

    #[tokio::test]
    async fn rejected_mutations_leave_the_cache_alone() {
        let drive = drive();
        drive.fail_for("folder-2").await;
        let client = client(&drive);
        let cache = client.cache();
        cache.put(QueryKey::Files(None), Vec::<DriveEntry>::new()).await;
        cache.put(QueryKey::Search("Test".to_string()), Vec::<DriveEntry>::new()).await;

        let hook = FilesHook::new(client.clone(), None);
        let parent = DriveId::from("folder-2");
        let result = hook.create_folder("Doomed", Some(&parent)).await;
        assert!(result.is_err());

        assert!(cache.contains(&QueryKey::Files(None)).await);
        assert!(cache.contains(&QueryKey::Search("Test".to_string())).await);
        let state = hook.mutation_state().await;
        assert!(state.is_error);
        assert!(!state.is_pending);
    }

    #[tokio::test]
    async fn rejected_delete_move_and_upload_invalidate_nothing() {
        let drive = drive();
        let client = client(&drive);
        let hook = FilesHook::new(client.clone(), Some(DriveId::from("folder-1")));
        let listing = hook.files().await.data.unwrap();
        let document = listing[0].clone();
        StorageHook::new(client.clone()).storage().await;
        SearchHook::new(client.clone()).search("Test").await;
        let cached = {
            let mut keys = client.cache().keys().await;
            keys.sort_by_key(|k| format!("{:?}", k));
            keys
        };

        drive.fail_for("document-1").await;
        drive.fail_for("folder-2").await;
        assert!(hook.delete_file(&document).await.is_err());
        assert!(hook
            .move_file(&document, &DriveId::from("folder-2"), true)
            .await
            .is_err());
        let upload = NewUpload {
            name: "notes.txt".to_string(),
            mime_type: mime::TEXT_PLAIN,
            parent: Some(DriveId::from("folder-2")),
            data: bytes::Bytes::from_static(b"hello"),
        };
        assert!(hook.upload_file(upload).await.is_err());

        let mut after = client.cache().keys().await;
        after.sort_by_key(|k| format!("{:?}", k));
        assert_eq!(after, cached);
        assert!(hook.mutation_state().await.is_error);
    }

    #[tokio::test]
    async fn listing_is_served_from_cache_until_invalidated() {
        let drive = drive();
        let client = client(&drive);
        let hook = FilesHook::new(client, Some(DriveId::from("folder-1")));

        let first = hook.files().await;
        assert_eq!(first.data.as_ref().map(Vec::len), Some(1));
        let calls = drive.call_count();
        hook.files().await;
        assert_eq!(drive.call_count(), calls);

        let document = first.data.unwrap().remove(0);
        hook.delete_file(&document).await.unwrap();
        let after = hook.files().await;
        assert_eq!(after.data, Some(Vec::new()));
    }

    #[tokio::test]
    async fn failed_listing_is_not_cached_and_refetch_recovers() {
        let drive = drive();
        drive.fail_for("folder-1").await;
        let client = client(&drive);
        let hook = FilesHook::new(client.clone(), Some(DriveId::from("folder-1")));

        let failed = hook.files().await;
        assert!(failed.is_error);
        assert_eq!(failed.error.as_deref(), Some("Backend error while accessing folder-1 (500)"));
        assert!(!client.cache().contains(&QueryKey::files(hook.folder())).await);

        drive.recover(&DriveId::from("folder-1")).await;
        let listing = hook.refetch().await;
        assert_eq!(listing.data.map(|l| l.len()), Some(1));
        assert!(client.cache().contains(&QueryKey::files(hook.folder())).await);
    }

    #[tokio::test]
    async fn blank_search_makes_no_request() {
        let drive = drive();
        let hook = SearchHook::new(client(&drive));
        let result = hook.search("   ").await;
        assert_eq!(result.data, Some(Vec::new()));
        assert_eq!(drive.call_count(), 0);

        let result = hook.search("document").await;
        let names: Vec<String> = result.data.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Test Document.docx".to_string()]);
    }

    #[tokio::test]
    async fn sharing_refreshes_the_permission_list() {
        let drive = drive();
        let hook = SharingHook::new(client(&drive));
        let file = DriveId::from("document-1");
        assert_eq!(hook.permissions(&file).await.data, Some(Vec::new()));

        let request = ShareRequest {
            file_id: file.clone(),
            email_address: "newuser@example.com".to_string(),
            role: Role::Reader,
            send_notification: true,
        };
        let permission = hook.share(&request).await.unwrap();
        let listed = hook.permissions(&file).await.data.unwrap();
        assert_eq!(listed, vec![permission.clone()]);

        hook.remove_permission(&file, &permission.id).await.unwrap();
        assert_eq!(hook.permissions(&file).await.data, Some(Vec::new()));
    }

    #[tokio::test]
    async fn logout_clears_every_cached_query() {
        let drive = drive();
        let client = client(&drive);
        StorageHook::new(client.clone()).storage().await;
        let auth = AuthHook::new(client.clone());
        let user = auth.user().await.data.unwrap();
        assert_eq!(user.email, "test.user@example.com");

        auth.logout().await.unwrap();
        assert!(client.cache().keys().await.is_empty());
    }
}
