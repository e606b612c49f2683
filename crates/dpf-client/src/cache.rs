//! Process-lifetime cache for administrative code tables.
//!
//! The prefecture table and each per-prefecture municipality table are
//! fetched at most once for the life of the client. Concurrent first
//! callers coalesce onto a single in-flight fetch through a shared
//! future; every caller gets a clone of the same result. A failed fetch
//! is forgotten so a later call can try again.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::error::DpfClientError;
use crate::types::{Municipality, Prefecture};

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<Vec<T>>, DpfClientError>>>;

/// Fetch thunk: only invoked when the cache has no entry in flight.
pub(crate) type Fetch<T> = BoxFuture<'static, Result<Arc<Vec<T>>, DpfClientError>>;

#[derive(Debug, Default)]
pub(crate) struct ReferenceCache {
    prefectures: Mutex<Option<SharedFetch<Prefecture>>>,
    municipalities: Mutex<HashMap<String, SharedFetch<Municipality>>>,
}

impl ReferenceCache {
    /// The prefecture table, fetching through `fetch` on first access.
    pub async fn prefectures<F>(&self, fetch: F) -> Result<Arc<Vec<Prefecture>>, DpfClientError>
    where
        F: FnOnce() -> Fetch<Prefecture>,
    {
        let shared = {
            let mut slot = self.prefectures.lock().await;
            if let Some(existing) = slot.as_ref() {
                existing.clone()
            } else {
                let future = fetch().shared();
                *slot = Some(future.clone());
                future
            }
        };

        let result = shared.clone().await;
        if result.is_err() {
            // Drop the failed entry, unless a newer fetch replaced it.
            let mut slot = self.prefectures.lock().await;
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
                *slot = None;
            }
        }
        result
    }

    /// One prefecture's municipality table, fetching on first access.
    pub async fn municipalities<F>(
        &self,
        pref_code: &str,
        fetch: F,
    ) -> Result<Arc<Vec<Municipality>>, DpfClientError>
    where
        F: FnOnce() -> Fetch<Municipality>,
    {
        let shared = {
            let mut map = self.municipalities.lock().await;
            if let Some(existing) = map.get(pref_code) {
                existing.clone()
            } else {
                let future = fetch().shared();
                map.insert(pref_code.to_string(), future.clone());
                future
            }
        };

        let result = shared.clone().await;
        if result.is_err() {
            let mut map = self.municipalities.lock().await;
            if map
                .get(pref_code)
                .is_some_and(|current| current.ptr_eq(&shared))
            {
                map.remove(pref_code);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counted_fetch(
        counter: Arc<AtomicUsize>,
        result: Result<Vec<Prefecture>, DpfClientError>,
    ) -> impl FnOnce() -> Fetch<Prefecture> {
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                // Force callers to overlap on the same in-flight fetch.
                tokio::time::sleep(Duration::from_millis(20)).await;
                result.map(Arc::new)
            }
            .boxed()
        }
    }

    fn table() -> Vec<Prefecture> {
        vec![Prefecture {
            code: "13".into(),
            name: "東京都".into(),
        }]
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_to_one_fetch() {
        let cache = Arc::new(ReferenceCache::default());
        let fetches = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            cache.prefectures(counted_fetch(fetches.clone(), Ok(table()))),
            cache.prefectures(counted_fetch(fetches.clone(), Ok(table()))),
            cache.prefectures(counted_fetch(fetches.clone(), Ok(table()))),
        );

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        let a = a.unwrap();
        assert!(Arc::ptr_eq(&a, &b.unwrap()));
        assert!(Arc::ptr_eq(&a, &c.unwrap()));
    }

    #[tokio::test]
    async fn success_is_never_refetched() {
        let cache = ReferenceCache::default();
        let fetches = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache
                .prefectures(counted_fetch(fetches.clone(), Ok(table())))
                .await
                .unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_forgotten() {
        let cache = ReferenceCache::default();
        let fetches = Arc::new(AtomicUsize::new(0));

        let failed = cache
            .prefectures(counted_fetch(
                fetches.clone(),
                Err(DpfClientError::Envelope {
                    message: "boom".into(),
                }),
            ))
            .await;
        assert!(failed.is_err());

        let recovered = cache
            .prefectures(counted_fetch(fetches.clone(), Ok(table())))
            .await;
        assert!(recovered.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn municipality_tables_are_keyed_by_prefecture() {
        let cache = ReferenceCache::default();
        let fetches = Arc::new(AtomicUsize::new(0));

        let fetch = |counter: Arc<AtomicUsize>, code: &str| {
            let code = code.to_string();
            move || {
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(vec![Municipality {
                        code: format!("{code}101"),
                        prefecture_code: code,
                        name: "somewhere".into(),
                    }]))
                }
                .boxed()
            }
        };

        let tokyo = cache
            .municipalities("13", fetch(fetches.clone(), "13"))
            .await
            .unwrap();
        let osaka = cache
            .municipalities("27", fetch(fetches.clone(), "27"))
            .await
            .unwrap();
        let tokyo_again = cache
            .municipalities("13", fetch(fetches.clone(), "13"))
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&tokyo, &tokyo_again));
        assert_eq!(osaka[0].prefecture_code, "27");
    }
}
