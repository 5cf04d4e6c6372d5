use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use intake_types::{Dataset, ResourceKey};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct CacheEntry {
    dataset: Dataset,
    produced_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.produced_at.elapsed() < ttl
    }
}

type Slot = Arc<AsyncMutex<Option<CacheEntry>>>;

/// Time-bounded memo of datasets keyed by [`ResourceKey`].
///
/// Each key owns a slot guarded by an async mutex that is held while the
/// producer runs, so concurrent callers for one key share a single producer
/// execution and observe its result. Expiry is purely age based and checked
/// lazily on access. A producer that fails or is abandoned leaves the slot
/// as it was.
#[derive(Default)]
pub struct DatasetCache {
    slots: Mutex<HashMap<ResourceKey, Slot>>,
}

impl fmt::Debug for DatasetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetCache").field("keys", &self.slot_count()).finish()
    }
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &ResourceKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the cached dataset for `key` when younger than `ttl`;
    /// otherwise runs `producer` and stores its result, replacing any
    /// previous entry.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &ResourceKey, ttl: Duration, producer: F) -> Result<Dataset, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Dataset, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        match entry.as_ref() {
            Some(cached) if cached.is_fresh(ttl) => {
                debug!(resource = %key, rows = cached.dataset.len(), "dataset cache hit");
                return Ok(cached.dataset.clone());
            }
            Some(_) => debug!(resource = %key, "dataset cache entry expired"),
            None => debug!(resource = %key, "dataset cache miss"),
        }

        let dataset = producer().await?;
        *entry = Some(CacheEntry {
            dataset: dataset.clone(),
            produced_at: Instant::now(),
        });
        info!(resource = %key, rows = dataset.len(), "dataset cached");
        Ok(dataset)
    }

    /// Drops the entry for `key`, waiting for an in-flight producer first.
    /// The slot itself goes too unless another caller still holds it.
    pub async fn invalidate(&self, key: &ResourceKey) {
        let Some(slot) = self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned() else {
            return;
        };
        if slot.lock().await.take().is_some() {
            info!(resource = %key, "dataset cache entry invalidated");
        }
        drop(slot);
        self.prune_idle(|candidate| candidate == key);
    }

    /// Drops every entry and every slot nobody is waiting on.
    pub async fn clear(&self) {
        let slots: Vec<Slot> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for slot in slots {
            slot.lock().await.take();
        }
        self.prune_idle(|_| true);
        debug!(remaining_slots = self.slot_count(), "dataset cache cleared");
    }

    /// Removes empty slots matching `select` that only the map references.
    /// Clones are handed out under the map lock, so a count of one cannot
    /// race with a new waiter.
    fn prune_idle(&self, select: impl Fn(&ResourceKey) -> bool) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, slot| {
                let idle = select(key)
                    && Arc::strong_count(slot) == 1
                    && slot.try_lock().map(|entry| entry.is_none()).unwrap_or(false);
                !idle
            });
    }

    /// The dataset currently stored for `key`, if still younger than `ttl`.
    /// Never runs a producer and never waits for one.
    pub fn peek(&self, key: &ResourceKey, ttl: Duration) -> Option<Dataset> {
        let slot = self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()?;
        let entry = slot.try_lock().ok()?;
        entry
            .as_ref()
            .filter(|cached| cached.is_fresh(ttl))
            .map(|cached| cached.dataset.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use intake_types::CanonicalRow;
    use serde_json::json;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn key(list: &str) -> ResourceKey {
        ResourceKey::new("contoso.sharepoint.com", "/sites/Intake", list)
    }

    fn dataset(marker: usize) -> Dataset {
        let row: CanonicalRow = [("marker".to_string(), json!(marker))].into_iter().collect();
        Dataset::new(vec![row])
    }

    fn marker(dataset: &Dataset) -> Option<u64> {
        dataset.rows().first().and_then(|row| row.get("marker")).and_then(|value| value.as_u64())
    }

    async fn counted(cache: &DatasetCache, key: &ResourceKey, ttl: Duration, calls: &AtomicUsize) -> Dataset {
        cache
            .get_or_fetch(key, ttl, || async {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, std::convert::Infallible>(dataset(call))
            })
            .await
            .expect("infallible producer")
    }

    #[tokio::test]
    async fn producer_runs_once_within_ttl() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);

        let first = counted(&cache, &key("Survey"), HOUR, &calls).await;
        let second = counted(&cache, &key("Survey"), HOUR, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(first.shares_rows_with(&second));
    }

    #[tokio::test]
    async fn expired_entry_is_replaced() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);

        let first = counted(&cache, &key("Survey"), Duration::ZERO, &calls).await;
        let second = counted(&cache, &key("Survey"), Duration::ZERO, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(marker(&first), Some(1));
        assert_eq!(marker(&second), Some(2));
        assert_eq!(cache.peek(&key("Survey"), HOUR).as_ref().and_then(marker), Some(2));
    }

    #[tokio::test]
    async fn keys_are_cached_independently() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("Survey"), HOUR, &calls).await;
        counted(&cache, &key("Other"), HOUR, &calls).await;
        counted(&cache, &key("Survey").with_projection(["Title"]), HOUR, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_producer_caches_nothing() {
        let cache = DatasetCache::new();
        let result = cache
            .get_or_fetch(&key("Survey"), HOUR, || async { Err::<Dataset, _>("boom") })
            .await;
        assert_eq!(result.expect_err("producer failed"), "boom");
        assert!(cache.peek(&key("Survey"), HOUR).is_none());

        let calls = AtomicUsize::new(0);
        counted(&cache, &key("Survey"), HOUR, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_producer() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);
        let slow = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::convert::Infallible>(dataset(7))
        };

        let (key_a, key_b) = (key("Survey"), key("Survey"));
        let (first, second) = tokio::join!(
            cache.get_or_fetch(&key_a, HOUR, slow),
            cache.get_or_fetch(&key_b, HOUR, slow)
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (first, second) = (first.expect("first"), second.expect("second"));
        assert!(first.shares_rows_with(&second));
    }

    #[tokio::test]
    async fn abandoned_producer_leaves_slot_empty() {
        let cache = DatasetCache::new();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_fetch(&key("Survey"), HOUR, || async {
                std::future::pending::<()>().await;
                Ok::<_, std::convert::Infallible>(dataset(1))
            }),
        )
        .await;
        assert!(abandoned.is_err());

        let calls = AtomicUsize::new(0);
        let fresh = counted(&cache, &key("Survey"), HOUR, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(marker(&fresh), Some(1));
    }

    #[tokio::test]
    async fn invalidate_and_clear_force_new_production() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("Survey"), HOUR, &calls).await;
        cache.invalidate(&key("Survey")).await;
        counted(&cache, &key("Survey"), HOUR, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.clear().await;
        assert!(cache.peek(&key("Survey"), HOUR).is_none());
        counted(&cache, &key("Survey"), HOUR, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn idle_slots_are_released() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);

        counted(&cache, &key("Survey"), HOUR, &calls).await;
        counted(&cache, &key("Other"), HOUR, &calls).await;
        assert_eq!(cache.slot_count(), 2);

        cache.invalidate(&key("Survey")).await;
        assert_eq!(cache.slot_count(), 1);

        cache.clear().await;
        assert_eq!(cache.slot_count(), 0);

        cache.invalidate(&key("Never cached")).await;
        assert_eq!(cache.slot_count(), 0);
    }

    #[tokio::test]
    async fn slot_in_use_survives_invalidation() {
        let cache = DatasetCache::new();
        let calls = AtomicUsize::new(0);
        counted(&cache, &key("Survey"), HOUR, &calls).await;

        let held = cache.slot(&key("Survey"));
        cache.invalidate(&key("Survey")).await;
        assert_eq!(cache.slot_count(), 1);
        assert!(held.lock().await.is_none());

        drop(held);
        cache.clear().await;
        assert_eq!(cache.slot_count(), 0);
    }
}
