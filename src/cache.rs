use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::news::FeedEntry;

/// How long parsed feed entries are served before the feed is fetched again.
pub const FEED_CACHE_TTL: Duration = Duration::from_secs(600);

struct CachedFeed {
    entries: Arc<Vec<FeedEntry>>,
    fetched_at: Instant,
}

/// Parsed entries keyed by feed URL, each valid for `ttl` after it was stored.
pub struct FeedCache {
    ttl: Duration,
    feeds: HashMap<String, CachedFeed>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            feeds: HashMap::new(),
        }
    }

    /// Returns the entries stored for `url` if they are younger than the TTL.
    /// An expired entry is dropped.
    pub fn get(&mut self, url: &str, now: Instant) -> Option<Arc<Vec<FeedEntry>>> {
        let fresh = match self.feeds.get(url) {
            Some(cached) => now.saturating_duration_since(cached.fetched_at) < self.ttl,
            None => return None,
        };

        if fresh {
            self.feeds.get(url).map(|cached| Arc::clone(&cached.entries))
        } else {
            self.feeds.remove(url);
            None
        }
    }

    pub fn insert(&mut self, url: impl Into<String>, entries: Arc<Vec<FeedEntry>>, now: Instant) {
        self.feeds.insert(
            url.into(),
            CachedFeed {
                entries,
                fetched_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(FEED_CACHE_TTL)
    }
}
