use async_recursion::async_recursion;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::source::{ClientError, ClientResult};
use crate::client::DataClient;
use crate::google_drive::DriveId;

/// Shown when a level of the trail could not be fetched.
pub const LOAD_FAILED_NOTICE: &str = "Could not load folder details";

/// Chains longer than this are cut off.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub id: DriveId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breadcrumbs {
    /// Nearest the root first, ending with the requested folder.
    pub trail: Vec<Crumb>,
    pub notice: Option<String>,
}

/// Walks up the canonical parents of a folder, one fetch per level.
#[derive(Debug, Clone)]
pub struct BreadcrumbResolver {
    client: DataClient,
}

impl BreadcrumbResolver {
    pub fn new(client: DataClient) -> Self {
        BreadcrumbResolver { client }
    }

    /// Never fails: a broken level ends the walk and sets the notice.
    pub async fn resolve(&self, current_folder: Option<&DriveId>) -> Breadcrumbs {
        let Some(folder) = current_folder else {
            return Breadcrumbs::default();
        };
        let mut path = Vec::new();
        let notice = match self.walk(folder.clone(), &mut path).await {
            Ok(()) => None,
            Err(e) => {
                warn!("breadcrumbs for {} stopped at level {}: {}", folder, path.len(), e);
                Some(LOAD_FAILED_NOTICE.to_string())
            }
        };
        path.reverse();
        Breadcrumbs { trail: path, notice }
    }

    /// `path` collects crumbs from the requested folder upwards.
    #[async_recursion]
    async fn walk(&self, id: DriveId, path: &mut Vec<Crumb>) -> ClientResult<()> {
        let entry = self.client.source().get_file(&id).await?;
        if !entry.is_folder() {
            return Err(ClientError::NotAFolder(id));
        }
        path.push(Crumb {
            id: entry.id.clone(),
            name: entry.name.clone(),
        });
        let Some(parent) = entry.canonical_parent() else {
            return Ok(());
        };
        if parent.is_root() {
            return Ok(());
        }
        if path.iter().any(|crumb| &crumb.id == parent) {
            debug!("cycle at {}, stopping", parent);
            return Ok(());
        }
        if path.len() >= MAX_DEPTH {
            warn!("breadcrumbs deeper than {} levels, cut off", MAX_DEPTH);
            return Ok(());
        }
        self.walk(parent.clone(), path).await
    }
}
