use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use lru::LruCache;
use rdf_relay_api::{Dereference, Dereferencer, QueryContext};
use rdf_relay_common::{EngineError, EngineResult};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Dereference>, String>>>;

enum Entry {
    Ready(Arc<Dereference>),
    /// A fetch for this URL is in flight; later consumers attach to it
    /// instead of fetching again.
    InFlight(SharedFetch),
}

/// A process-wide (per engine instance) LRU cache of dereferenced documents.
///
/// At most one fetch per URL is in flight at a time. Entries are parsed,
/// materialized documents and therefore re-iterable by every pattern that
/// touches the same URL. The HTTP-invalidate surface is
/// [`DereferenceCache::invalidate`] / [`DereferenceCache::invalidate_all`],
/// exposed on the engine so updates can force a re-fetch.
pub struct DereferenceCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl DereferenceCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Dereferences `url` through the cache.
    pub async fn dereference(
        &self,
        url: &str,
        ctx: &QueryContext,
        dereferencer: &Arc<dyn Dereferencer>,
    ) -> EngineResult<Arc<Dereference>> {
        let fetch = {
            let mut entries = self.entries.lock().map_err(poisoned)?;
            match entries.get(url) {
                Some(Entry::Ready(document)) => return Ok(Arc::clone(document)),
                Some(Entry::InFlight(fetch)) => fetch.clone(),
                None => {
                    let fetch = start_fetch(url, ctx, dereferencer);
                    entries.put(url.to_owned(), Entry::InFlight(fetch.clone()));
                    fetch
                }
            }
        };

        let result = fetch.await;
        let mut entries = self.entries.lock().map_err(poisoned)?;
        match result {
            Ok(document) => {
                entries.put(url.to_owned(), Entry::Ready(Arc::clone(&document)));
                Ok(document)
            }
            Err(message) => {
                // Do not cache failures; a later consumer may retry.
                entries.pop(url);
                Err(EngineError::source(url, message))
            }
        }
    }

    /// Drops the entry for `url`, forcing the next consumer to re-fetch.
    pub fn invalidate(&self, url: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(url);
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for DereferenceCache {
    fn default() -> Self {
        Self::new(256)
    }
}

fn start_fetch(
    url: &str,
    ctx: &QueryContext,
    dereferencer: &Arc<dyn Dereferencer>,
) -> SharedFetch {
    let url = url.to_owned();
    let ctx = ctx.clone();
    let dereferencer = Arc::clone(dereferencer);
    async move {
        dereferencer
            .dereference(&url, &ctx)
            .await
            .map(Arc::new)
            // Errors must be Clone to be shared between waiters.
            .map_err(|e| e.to_string())
    }
    .boxed()
    .shared()
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> EngineError {
    EngineError::Internal("dereference cache lock poisoned".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDereferencer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Dereferencer for CountingDereferencer {
        async fn dereference(
            &self,
            url: &str,
            _ctx: &QueryContext,
        ) -> EngineResult<Dereference> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Dereference {
                url: url.to_owned(),
                media_type: None,
                quads: Vec::new(),
                metadata: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn repeated_lookups_fetch_once_until_invalidated() {
        let cache = DereferenceCache::default();
        let counting = Arc::new(CountingDereferencer {
            calls: AtomicUsize::new(0),
        });
        let dereferencer: Arc<dyn Dereferencer> = Arc::clone(&counting) as _;
        let ctx = QueryContext::new();
        for _ in 0..3 {
            cache
                .dereference("http://example.com/data", &ctx, &dereferencer)
                .await
                .expect("dereference succeeds");
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        cache.invalidate("http://example.com/data");
        cache
            .dereference("http://example.com/data", &ctx, &dereferencer)
            .await
            .expect("dereference succeeds");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }
}
