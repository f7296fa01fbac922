//! Top stories use case - cache lookup, single-flight refresh, and fetch pipeline

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    model::{FetchStats, Origin, ResultSet, TopStories},
    ports::{CacheLookup, ItemSource, ResultCache, UpstreamError},
    usecases::fetch_pool::{FetchPool, FetchPoolConfig},
};

/// Cache key holding the current top stories
pub const STORIES_CACHE_KEY: &str = "stories";

/// Configuration for the top stories service
#[derive(Debug, Clone, Default)]
pub struct TopStoriesConfig {
    pub fetch: FetchPoolConfig,
}

/// Errors from a top stories request
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] UpstreamError),
}

enum Cached {
    Fresh(ResultSet),
    Stale(ResultSet),
    Miss,
}

/// Serves top stories from the cache, refreshing from the item source on a miss
pub struct TopStoriesService<S, C>
where
    S: ItemSource + ?Sized + 'static,
    C: ResultCache + ?Sized,
{
    source: Arc<S>,
    cache: Arc<C>,
    pool: FetchPool<S>,
    refresh_lock: Mutex<()>,
}

impl<S, C> TopStoriesService<S, C>
where
    S: ItemSource + ?Sized + 'static,
    C: ResultCache + ?Sized,
{
    pub fn new(source: Arc<S>, cache: Arc<C>, config: TopStoriesConfig) -> Self {
        let pool = FetchPool::new(Arc::clone(&source), config.fetch);
        Self {
            source,
            cache,
            pool,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn fetch_config(&self) -> &FetchPoolConfig {
        self.pool.config()
    }

    /// Return the current top stories
    pub async fn top_stories(&self) -> Result<TopStories, PipelineError> {
        let stale = match self.lookup().await {
            Cached::Fresh(stories) => {
                tracing::debug!(count = stories.len(), "Serving top stories from cache");
                return Ok(TopStories {
                    stories,
                    origin: Origin::Cache,
                    stats: None,
                });
            }
            Cached::Stale(stories) => Some(stories),
            Cached::Miss => None,
        };

        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(stories) = stale {
                    tracing::debug!(
                        count = stories.len(),
                        "Refresh in flight, serving stale top stories"
                    );
                    return Ok(TopStories {
                        stories,
                        origin: Origin::Stale,
                        stats: None,
                    });
                }
                self.refresh_lock.lock().await
            }
        };

        // Another caller may have refreshed while we waited for the lock
        if let Cached::Fresh(stories) = self.lookup().await {
            tracing::debug!(
                count = stories.len(),
                "Serving top stories refreshed by another caller"
            );
            return Ok(TopStories {
                stories,
                origin: Origin::Cache,
                stats: None,
            });
        }

        let span = tracing::info_span!(
            "refresh",
            run_id = %Uuid::new_v4(),
            dropped = tracing::field::Empty
        );
        let (stories, stats) = self.refresh().instrument(span).await?;

        Ok(TopStories {
            stories,
            origin: Origin::Upstream,
            stats: Some(stats),
        })
    }

    async fn refresh(&self) -> Result<(ResultSet, FetchStats), PipelineError> {
        let started = tokio::time::Instant::now();

        let ids = self.source.list_top_ids().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch top story listing");
            e
        })?;

        tracing::info!(listed = ids.len(), "Fetched top story listing");

        let (stories, stats) = self.pool.run(&ids).await;
        tracing::Span::current().record("dropped", stats.dropped as u64);

        self.store(&stories).await;

        tracing::info!(
            count = stories.len(),
            completed = stats.completed,
            filtered = stats.filtered,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refreshed top stories"
        );

        Ok((stories, stats))
    }

    async fn lookup(&self) -> Cached {
        let lookup = match self.cache.get(STORIES_CACHE_KEY).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                return Cached::Miss;
            }
        };

        let (bytes, fresh) = match lookup {
            CacheLookup::Fresh(bytes) => (bytes, true),
            CacheLookup::Stale(bytes) => (bytes, false),
            CacheLookup::Miss => return Cached::Miss,
        };

        match serde_json::from_slice::<ResultSet>(&bytes) {
            Ok(stories) if fresh => Cached::Fresh(stories),
            Ok(stories) => Cached::Stale(stories),
            Err(e) => {
                tracing::warn!(error = %e, "Cached top stories are unreadable, treating as miss");
                Cached::Miss
            }
        }
    }

    async fn store(&self, stories: &ResultSet) {
        let bytes = match serde_json::to_vec(stories) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize top stories for cache");
                return;
            }
        };

        if let Err(e) = self.cache.set(STORIES_CACHE_KEY, bytes).await {
            tracing::warn!(error = %e, "Failed to cache top stories");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawItem, StoryId};
    use crate::ports::CacheError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        ids: Vec<StoryId>,
        failing: Vec<StoryId>,
        delay: Duration,
        fail_listing: AtomicBool,
        list_calls: AtomicUsize,
        item_calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(n: u64) -> Self {
            Self {
                ids: (1..=n).map(StoryId).collect(),
                failing: Vec::new(),
                delay: Duration::ZERO,
                fail_listing: AtomicBool::new(false),
                list_calls: AtomicUsize::new(0),
                item_calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn with_failing(mut self, ids: &[u64]) -> Self {
            self.failing = ids.iter().copied().map(StoryId).collect();
            self
        }

        fn item_calls(&self) -> usize {
            self.item_calls.load(Ordering::SeqCst)
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ItemSource for CountingSource {
        async fn list_top_ids(&self) -> Result<Vec<StoryId>, UpstreamError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(UpstreamError::Network("connection refused".to_string()));
            }
            Ok(self.ids.clone())
        }

        async fn get_item(&self, id: StoryId) -> Result<RawItem, UpstreamError> {
            self.item_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(&id) {
                return Err(UpstreamError::Status {
                    status: 500,
                    context: format!("item {}", id),
                });
            }
            Ok(RawItem {
                id,
                item_type: "story".to_string(),
                url: format!("https://example.com/{}", id),
                title: format!("Story {}", id),
                ..Default::default()
            })
        }
    }

    /// Cache whose freshness is set by the test
    #[derive(Default)]
    struct FakeCache {
        value: std::sync::Mutex<Option<Vec<u8>>>,
        stale: AtomicBool,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    impl FakeCache {
        fn put_raw(&self, bytes: &[u8]) {
            *self.value.lock().unwrap() = Some(bytes.to_vec());
        }
    }

    #[async_trait]
    impl ResultCache for FakeCache {
        async fn get(&self, _key: &str) -> Result<CacheLookup, CacheError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("down".to_string()));
            }
            let value = self.value.lock().unwrap().clone();
            Ok(match value {
                Some(bytes) if self.stale.load(Ordering::SeqCst) => CacheLookup::Stale(bytes),
                Some(bytes) => CacheLookup::Fresh(bytes),
                None => CacheLookup::Miss,
            })
        }

        async fn set(&self, _key: &str, value: Vec<u8>) -> Result<(), CacheError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("down".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.stale.store(false, Ordering::SeqCst);
            *self.value.lock().unwrap() = Some(value);
            Ok(())
        }
    }

    fn config(num_wanted: usize) -> TopStoriesConfig {
        TopStoriesConfig {
            fetch: FetchPoolConfig {
                num_workers: 3,
                num_wanted,
                job_timeout: Duration::from_secs(2),
            },
        }
    }

    #[tokio::test]
    async fn test_cold_start_fetches_and_populates_cache() {
        let source = Arc::new(CountingSource::new(6));
        let cache = Arc::new(FakeCache::default());
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(4));

        let result = service.top_stories().await.unwrap();

        assert_eq!(result.origin, Origin::Upstream);
        assert_eq!(result.stories.ranks(), vec![0, 1, 2, 3]);
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_skips_upstream() {
        let source = Arc::new(CountingSource::new(6));
        let cache = Arc::new(FakeCache::default());
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(4));

        let first = service.top_stories().await.unwrap();
        let calls_after_first = source.item_calls();

        let second = service.top_stories().await.unwrap();

        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(second.stories, first.stories);
        assert_eq!(source.item_calls(), calls_after_first);
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_reports_dropped_items() {
        let source = Arc::new(CountingSource::new(4).with_failing(&[2]));
        let cache = Arc::new(FakeCache::default());
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(4));

        let first = service.top_stories().await.unwrap();

        assert_eq!(first.stories.ranks(), vec![0, 2, 3]);
        let stats = first.stats.expect("upstream refresh carries stats");
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.completed, 4);

        let second = service.top_stories().await.unwrap();
        assert_eq!(second.origin, Origin::Cache);
        assert!(second.stats.is_none());
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal_and_not_cached() {
        let source = Arc::new(CountingSource::new(3));
        source.fail_listing.store(true, Ordering::SeqCst);
        let cache = Arc::new(FakeCache::default());
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(3));

        let result = service.top_stories().await;

        assert!(matches!(
            result,
            Err(PipelineError::Upstream(UpstreamError::Network(_)))
        ));
        assert_eq!(cache.writes.load(Ordering::SeqCst), 0);
        assert_eq!(source.item_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_read_failure_falls_back_to_upstream() {
        let source = Arc::new(CountingSource::new(2));
        let cache = Arc::new(FakeCache::default());
        cache.fail_reads.store(true, Ordering::SeqCst);
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(2));

        let result = service.top_stories().await.unwrap();

        assert_eq!(result.origin, Origin::Upstream);
        assert_eq!(result.stories.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_stories() {
        let source = Arc::new(CountingSource::new(2));
        let cache = Arc::new(FakeCache::default());
        cache.fail_writes.store(true, Ordering::SeqCst);
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(2));

        let result = service.top_stories().await.unwrap();

        assert_eq!(result.stories.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_treated_as_miss() {
        let source = Arc::new(CountingSource::new(2));
        let cache = Arc::new(FakeCache::default());
        cache.put_raw(b"{not json");
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(2));

        let result = service.top_stories().await.unwrap();

        assert_eq!(result.origin, Origin::Upstream);
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refreshed_by_lone_caller() {
        let source = Arc::new(CountingSource::new(3));
        let cache = Arc::new(FakeCache::default());
        let service = TopStoriesService::new(source.clone(), cache.clone(), config(3));

        service.top_stories().await.unwrap();
        cache.stale.store(true, Ordering::SeqCst);

        let result = service.top_stories().await.unwrap();

        assert_eq!(result.origin, Origin::Upstream);
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_refresh() {
        let source = Arc::new(CountingSource::new(5).with_delay(Duration::from_millis(30)));
        let cache = Arc::new(FakeCache::default());
        let service = Arc::new(TopStoriesService::new(
            source.clone(),
            cache.clone(),
            config(5),
        ));

        let calls = (0..4).map(|_| {
            let service = Arc::clone(&service);
            async move { service.top_stories().await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(source.list_calls(), 1);
        let upstream = results
            .iter()
            .filter(|r| r.as_ref().unwrap().origin == Origin::Upstream)
            .count();
        assert_eq!(upstream, 1);
        for result in results {
            assert_eq!(result.unwrap().stories.ranks(), vec![0, 1, 2, 3, 4]);
        }
    }

    #[tokio::test]
    async fn test_stale_served_while_refresh_in_flight() {
        let source = Arc::new(CountingSource::new(3).with_delay(Duration::from_millis(50)));
        let cache = Arc::new(FakeCache::default());
        let service = Arc::new(TopStoriesService::new(
            source.clone(),
            cache.clone(),
            config(3),
        ));

        service.top_stories().await.unwrap();
        cache.stale.store(true, Ordering::SeqCst);

        let refresher = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.top_stories().await })
        };
        // Let the refresher take the lock and start fetching
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reader = service.top_stories().await.unwrap();
        assert_eq!(reader.origin, Origin::Stale);
        assert_eq!(reader.stories.ranks(), vec![0, 1, 2]);

        let refreshed = refresher.await.unwrap().unwrap();
        assert_eq!(refreshed.origin, Origin::Upstream);
        assert_eq!(source.list_calls(), 2);
    }
}
