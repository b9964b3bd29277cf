//! The data layer a front end sits on: cached queries, mutations with cache
//! invalidation, breadcrumb resolution and the file action contract.

use std::sync::Arc;

use crate::google_drive::DriveId;

pub use actions::{ActionHandler, DownloadRequest, FileAction, FileManager, Modal, UnknownAction, ViewMode};
pub use breadcrumbs::{BreadcrumbResolver, Breadcrumbs, Crumb, LOAD_FAILED_NOTICE, MAX_DEPTH};
pub use hooks::{invalidation, AuthHook, FilesHook, MutationState, SearchHook, SharingHook, StorageHook};
pub use query::{Invalidate, QueryCache, QueryKey, QueryState, STALE_TIME};
pub use source::{download_path, ClientError, ClientResult, FileSource, HttpSource, LocalSource};

mod actions;
mod breadcrumbs;
mod hooks;
mod query;
mod source;

/// A [`FileSource`] and the [`QueryCache`] every hook built on it shares.
#[derive(Clone)]
pub struct DataClient {
    source: Arc<dyn FileSource>,
    cache: Arc<QueryCache>,
}

impl DataClient {
    pub fn new(source: Arc<dyn FileSource>) -> Self {
        DataClient {
            source,
            cache: Arc::new(QueryCache::default()),
        }
    }

    pub fn source(&self) -> &dyn FileSource {
        self.source.as_ref()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn files(&self, folder: Option<DriveId>) -> FilesHook {
        FilesHook::new(self.clone(), folder)
    }

    pub fn search(&self) -> SearchHook {
        SearchHook::new(self.clone())
    }

    pub fn sharing(&self) -> SharingHook {
        SharingHook::new(self.clone())
    }

    pub fn storage(&self) -> StorageHook {
        StorageHook::new(self.clone())
    }

    pub fn auth(&self) -> AuthHook {
        AuthHook::new(self.clone())
    }

    pub fn breadcrumbs(&self) -> BreadcrumbResolver {
        BreadcrumbResolver::new(self.clone())
    }
}

impl std::fmt::Debug for DataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataClient")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
