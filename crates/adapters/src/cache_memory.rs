//! In-memory result cache with a soft TTL and a hard expiry

use async_trait::async_trait;
use quiet_hn_domain::{CacheEntry, CacheError, CacheLookup, Clock, Freshness, ResultCache};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Expiry settings for the in-memory cache
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Entries younger than this are served as fresh
    pub ttl: Duration,
    /// Entries older than this are never served
    pub hard_expiry: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            hard_expiry: Duration::from_secs(10 * 60),
        }
    }
}

/// Process-local cache; contents do not survive a restart
pub struct InMemoryResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl InMemoryResultCache {
    pub fn new(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        // Hard expiry below the TTL would make fresh entries unservable
        let policy = CachePolicy {
            ttl: policy.ttl,
            hard_expiry: policy.hard_expiry.max(policy.ttl),
        };

        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let now = self.clock.now();
        {
            let entries = self
                .entries
                .read()
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;

            let Some(entry) = entries.get(key) else {
                return Ok(CacheLookup::Miss);
            };
            match entry.freshness(now) {
                Freshness::Fresh => return Ok(CacheLookup::Fresh(entry.payload.clone())),
                Freshness::Stale => {
                    tracing::debug!(
                        key = %key,
                        age_secs = entry.age(now).whole_seconds(),
                        "Cache entry past ttl"
                    );
                    return Ok(CacheLookup::Stale(entry.payload.clone()));
                }
                Freshness::Expired => {}
            }
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        // Re-check under the write lock; a writer may have replaced it
        if entries
            .get(key)
            .is_some_and(|entry| entry.freshness(now) == Freshness::Expired)
        {
            entries.remove(key);
            tracing::debug!(key = %key, "Evicted expired cache entry");
        }

        Ok(CacheLookup::Miss)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let now = self.clock.now();
        let entry = CacheEntry {
            payload: value,
            stored_at: now,
            fresh_until: now + self.policy.ttl,
            expires_at: now + self.policy.hard_expiry,
        };

        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        entries.retain(|_, existing| existing.freshness(now) != Freshness::Expired);
        entries.insert(key.to_string(), entry);

        tracing::debug!(
            key = %key,
            ttl_secs = self.policy.ttl.as_secs(),
            hard_expiry_secs = self.policy.hard_expiry.as_secs(),
            "Cached value"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    struct ManualClock {
        now: Mutex<OffsetDateTime>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(OffsetDateTime::UNIX_EPOCH + time::Duration::days(20_000)),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

    fn cache(clock: &Arc<ManualClock>) -> InMemoryResultCache {
        InMemoryResultCache::new(
            CachePolicy {
                ttl: Duration::from_secs(300),
                hard_expiry: Duration::from_secs(600),
            },
            clock.clone(),
        )
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        assert_eq!(cache.get("stories").await.unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_fresh_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.set("stories", b"[1]".to_vec()).await.unwrap();
        clock.advance(Duration::from_secs(299));

        assert_eq!(
            cache.get("stories").await.unwrap(),
            CacheLookup::Fresh(b"[1]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_stale_between_ttl_and_hard_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.set("stories", b"[1]".to_vec()).await.unwrap();
        clock.advance(Duration::from_secs(300));

        assert_eq!(
            cache.get("stories").await.unwrap(),
            CacheLookup::Stale(b"[1]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.set("stories", b"[1]".to_vec()).await.unwrap();
        clock.advance(Duration::from_secs(600));

        assert_eq!(cache.get("stories").await.unwrap(), CacheLookup::Miss);
        assert!(cache.entries.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_replaces_whole_value_and_resets_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.set("stories", b"[1]".to_vec()).await.unwrap();
        clock.advance(Duration::from_secs(400));
        cache.set("stories", b"[2]".to_vec()).await.unwrap();

        assert_eq!(
            cache.get("stories").await.unwrap(),
            CacheLookup::Fresh(b"[2]".to_vec())
        );
    }

    #[tokio::test]
    async fn test_set_sweeps_only_expired_entries() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);

        cache.set("old", b"a".to_vec()).await.unwrap();
        cache.set("recent", b"c".to_vec()).await.unwrap();
        clock.advance(Duration::from_secs(500));
        cache.set("recent", b"c".to_vec()).await.unwrap();
        clock.advance(Duration::from_secs(200));
        cache.set("new", b"b".to_vec()).await.unwrap();

        let keys: Vec<String> = {
            let mut keys: Vec<_> = cache.entries.read().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        };
        assert_eq!(keys, vec!["new".to_string(), "recent".to_string()]);
        assert_eq!(
            cache.get("new").await.unwrap(),
            CacheLookup::Fresh(b"b".to_vec())
        );
    }

    #[test]
    fn test_hard_expiry_never_below_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = InMemoryResultCache::new(
            CachePolicy {
                ttl: Duration::from_secs(60),
                hard_expiry: Duration::from_secs(10),
            },
            clock,
        );

        assert_eq!(cache.policy().hard_expiry, Duration::from_secs(60));
    }
}
