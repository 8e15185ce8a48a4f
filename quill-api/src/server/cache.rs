use lru::LruCache;
use quill_common::{
    csrf::CsrfToken,
    model::{Id, user::UserMarker},
};
use std::{future::Future, num::NonZeroUsize, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tracing::trace;

pub const DEFAULT_PAGE_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(256).unwrap();

/// Signed-in pages carry the viewer's navigation and the browser's CSRF token in the logout
/// form, so they are only shared with that same browser.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum CacheScope {
    Anonymous,
    User(Id<UserMarker>, CsrfToken),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageKey {
    pub scope: CacheScope,
    pub uri: String,
}

#[derive(Clone, Debug)]
struct CachedPage {
    body: String,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<LruCache<PageKey, CachedPage>>,
}

impl PageCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &PageKey) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let cached = entries.get(key)?;

        if cached.stored_at.elapsed() < self.ttl {
            Some(cached.body.clone())
        } else {
            entries.pop(key);
            None
        }
    }

    pub async fn insert(&self, key: PageKey, body: String) {
        if self.ttl.is_zero() {
            return;
        }

        let page = CachedPage {
            body,
            stored_at: Instant::now(),
        };
        self.entries.lock().await.put(key, page);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn get_or_render<F, Fut, E>(&self, key: PageKey, render: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(body) = self.get(&key).await {
            trace!(uri = %key.uri, "Page cache hit");
            return Ok(body);
        }

        let body = render().await?;
        self.insert(key, body.clone()).await;

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use crate::server::cache::{CacheScope, PageCache, PageKey};
    use quill_common::{csrf::CsrfToken, model::Id};
    use std::{num::NonZeroUsize, time::Duration};

    fn key(scope: CacheScope, uri: &str) -> PageKey {
        PageKey {
            scope,
            uri: uri.to_owned(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_the_ttl() {
        let cache = PageCache::new(Duration::from_secs(20), NonZeroUsize::new(8).unwrap());
        cache
            .insert(key(CacheScope::Anonymous, "/"), "first".to_owned())
            .await;

        tokio::time::advance(Duration::from_secs(19)).await;
        assert_eq!(
            cache.get(&key(CacheScope::Anonymous, "/")).await.as_deref(),
            Some("first")
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key(CacheScope::Anonymous, "/")).await, None);
    }

    #[tokio::test]
    async fn keys_separate_queries_and_viewers() {
        let cache = PageCache::new(Duration::from_secs(20), NonZeroUsize::new(8).unwrap());
        cache
            .insert(key(CacheScope::Anonymous, "/"), "anon".to_owned())
            .await;
        let browser = CsrfToken::generate_random();
        let user = CacheScope::User(Id::new(1), browser.clone());
        cache.insert(key(user.clone(), "/"), "user".to_owned()).await;

        assert_eq!(cache.get(&key(CacheScope::Anonymous, "/?page=2")).await, None);
        assert_eq!(cache.get(&key(user, "/")).await.as_deref(), Some("user"));

        let other_browser = CacheScope::User(Id::new(1), CsrfToken::generate_random());
        assert_eq!(cache.get(&key(other_browser, "/")).await, None);

        cache.clear().await;
        assert_eq!(cache.get(&key(CacheScope::Anonymous, "/")).await, None);
    }

    #[tokio::test]
    async fn renders_once_per_window() {
        let cache = PageCache::new(Duration::from_secs(20), NonZeroUsize::new(8).unwrap());
        let mut renders = 0;

        for _ in 0..3 {
            let body = cache
                .get_or_render(key(CacheScope::Anonymous, "/"), || {
                    renders += 1;
                    async { Ok::<_, ()>("rendered".to_owned()) }
                })
                .await
                .unwrap();
            assert_eq!(body, "rendered");
        }

        assert_eq!(renders, 1);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = PageCache::new(Duration::ZERO, NonZeroUsize::new(8).unwrap());
        cache
            .insert(key(CacheScope::Anonymous, "/"), "page".to_owned())
            .await;

        assert_eq!(cache.get(&key(CacheScope::Anonymous, "/")).await, None);
    }
}
