use parking_lot::RwLock;

use super::fetch::Fetcher;

/// Namespace list shared read-only by every provider
#[derive(Debug, Default)]
pub struct NamespaceCache {
    namespaces: RwLock<Option<Vec<String>>>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that is already filled
    pub fn with_namespaces(namespaces: Vec<String>) -> Self {
        Self {
            namespaces: RwLock::new(Some(namespaces)),
        }
    }

    /// Cached list, if one has been loaded
    pub fn get(&self) -> Option<Vec<String>> {
        self.namespaces.read().clone()
    }

    /// Cached list, fetching it on first use. A failed fetch is logged and
    /// yields None without caching anything.
    pub async fn load(&self, fetcher: &dyn Fetcher) -> Option<Vec<String>> {
        if let Some(cached) = self.get() {
            return Some(cached);
        }

        match fetcher.list_namespaces().await {
            Ok(namespaces) => {
                tracing::debug!("Cached {} namespaces", namespaces.len());
                self.set(namespaces.clone());
                Some(namespaces)
            }
            Err(e) => {
                tracing::warn!("Failed to list namespaces: {}", e);
                None
            }
        }
    }

    pub fn set(&self, namespaces: Vec<String>) {
        *self.namespaces.write() = Some(namespaces);
    }

    /// Forget the cached list; the next `load` fetches again
    pub fn invalidate(&self) {
        *self.namespaces.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fetch::FetchError;
    use crate::resource::{ClusterContext, KindSpec, Resource};
    use fluxview_flux::DependencyTree;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Namespaces {
        answer: Option<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Fetcher for Namespaces {
        async fn list_namespaces(&self) -> Result<Vec<String>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().ok_or_else(|| FetchError::Other("forbidden".into()))
        }

        async fn list(&self, _kind: &KindSpec) -> Result<Vec<Resource>, FetchError> {
            Ok(Vec::new())
        }

        async fn list_contexts(&self) -> Result<Vec<ClusterContext>, FetchError> {
            Ok(Vec::new())
        }

        async fn dependency_tree(&self, kind: &str, _name: &str, _namespace: &str) -> Result<DependencyTree, FetchError> {
            Err(FetchError::NotExpandable { kind: kind.to_string() })
        }
    }

    #[tokio::test]
    async fn test_load_caches_until_invalidated() {
        let fetcher = Namespaces {
            answer: Some(vec!["default".into()]),
            calls: AtomicUsize::new(0),
        };
        let cache = NamespaceCache::new();

        assert_eq!(cache.load(&fetcher).await, Some(vec!["default".to_string()]));
        assert_eq!(cache.load(&fetcher).await, Some(vec!["default".to_string()]));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        assert!(cache.get().is_none());
        cache.load(&fetcher).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let fetcher = Namespaces {
            answer: None,
            calls: AtomicUsize::new(0),
        };
        let cache = NamespaceCache::new();

        assert!(cache.load(&fetcher).await.is_none());
        assert!(cache.load(&fetcher).await.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
