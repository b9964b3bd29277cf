use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::client::source::ClientResult;
use crate::google_drive::DriveId;

/// How long a cached query counts as fresh.
pub const STALE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Listing of a folder; `None` is the root folder.
    Files(Option<DriveId>),
    File(DriveId),
    Search(String),
    Permissions(DriveId),
    Storage,
    CurrentUser,
}

impl QueryKey {
    /// The listing key of `folder`, with the root alias folded into `None`.
    pub fn files(folder: Option<&DriveId>) -> QueryKey {
        QueryKey::Files(folder.filter(|f| !f.is_root()).cloned())
    }

    pub fn is_search(&self) -> bool {
        matches!(self, QueryKey::Search(_))
    }
}

/// One cache change a successful mutation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidate {
    Key(QueryKey),
    AllSearches,
}

impl Invalidate {
    fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Invalidate::Key(k) => k == key,
            Invalidate::AllSearches => key.is_search(),
        }
    }
}

/// What a consumer renders for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_error: bool,
    pub error: Option<String>,
}

impl<T> QueryState<T> {
    pub fn loading() -> Self {
        QueryState {
            data: None,
            is_loading: true,
            is_error: false,
            error: None,
        }
    }

    pub fn success(data: T) -> Self {
        QueryState {
            data: Some(data),
            is_loading: false,
            is_error: false,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        QueryState {
            data: None,
            is_loading: false,
            is_error: true,
            error: Some(error.to_string()),
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        QueryState::loading()
    }
}

struct Slot {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

/// Keyed results of earlier queries, shared by all hooks of one client.
pub struct QueryCache {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    stale_time: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        QueryCache::new(STALE_TIME)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("stale_time", &self.stale_time)
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        QueryCache {
            slots: Mutex::new(HashMap::new()),
            stale_time,
        }
    }

    /// The cached value for `key` if it is still fresh.
    pub async fn fresh<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slots = self.slots.lock().await;
        let slot = slots.get(key)?;
        if slot.fetched_at.elapsed() >= self.stale_time {
            trace!("{:?} is stale", key);
            return None;
        }
        slot.value.downcast_ref::<T>().cloned()
    }

    pub async fn put<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.slots.lock().await.insert(
            key,
            Slot {
                value: Arc::new(value),
                fetched_at: Instant::now(),
            },
        );
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.slots.lock().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<QueryKey> {
        self.slots.lock().await.keys().cloned().collect()
    }

    /// Drops every entry matched by `rules`; returns how many were dropped.
    pub async fn invalidate(&self, rules: &[Invalidate]) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|key, _| !rules.iter().any(|rule| rule.matches(key)));
        let dropped = before - slots.len();
        debug!("invalidated {} cached queries", dropped);
        dropped
    }

    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }

    /// Serves `key` from the cache while fresh, otherwise calls `fetch`.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, fetch: F) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        if let Some(data) = self.fresh::<T>(&key).await {
            trace!("cache hit for {:?}", key);
            return QueryState::success(data);
        }
        self.refetch(key, fetch).await
    }

    /// Always calls `fetch`, retrying a failure once before reporting it.
    pub async fn refetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let result = match fetch().await {
            Ok(data) => Ok(data),
            Err(e) => {
                debug!("query {:?} failed, retrying once: {}", key, e);
                fetch().await
            }
        };
        match result {
            Ok(data) => {
                self.put(key, data.clone()).await;
                QueryState::success(data)
            }
            Err(e) => {
                warn!("query {:?} failed: {}", key, e);
                QueryState::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::client::source::ClientError;

    #[test]
    fn root_alias_folds_into_the_root_listing_key() {
        assert_eq!(QueryKey::files(Some(&DriveId::root())), QueryKey::Files(None));
        assert_eq!(QueryKey::files(None), QueryKey::Files(None));
        assert_eq!(
            QueryKey::files(Some(&DriveId::from("folder-1"))),
            QueryKey::Files(Some(DriveId::from("folder-1")))
        );
    }

    #[tokio::test]
    async fn fresh_results_are_served_from_the_cache() {
        let cache = QueryCache::default();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ClientError>(vec![1, 2, 3])
        };
        let first = cache.query(QueryKey::Storage, fetch).await;
        let second = cache.query(QueryKey::Storage, fetch).await;
        assert_eq!(first.data, Some(vec![1, 2, 3]));
        assert_eq!(second.data, Some(vec![1, 2, 3]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_results_are_fetched_again() {
        let cache = QueryCache::new(Duration::ZERO);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ClientError>("quota".to_string())
        };
        cache.query(QueryKey::Storage, fetch).await;
        cache.query(QueryKey::Storage, fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_failed_fetch_is_retried_once() {
        let cache = QueryCache::default();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let state: QueryState<u32> = cache
            .query(QueryKey::Storage, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Status {
                    status: 500,
                    message: "Backend error".to_string(),
                })
            })
            .await;
        assert!(state.is_error);
        assert_eq!(state.error.as_deref(), Some("Backend error (500)"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.contains(&QueryKey::Storage).await);
    }

    #[tokio::test]
    async fn invalidating_all_searches_keeps_other_keys() {
        let cache = QueryCache::default();
        cache.put(QueryKey::Search("a".to_string()), 1u8).await;
        cache.put(QueryKey::Search("b".to_string()), 2u8).await;
        cache.put(QueryKey::Files(None), 3u8).await;
        let dropped = cache.invalidate(&[Invalidate::AllSearches]).await;
        assert_eq!(dropped, 2);
        assert_eq!(cache.keys().await, vec![QueryKey::Files(None)]);
    }
}
