//! Short-lived response cache for the fallback strategy
//!
//! Successful responses observed during retries are cached by request URL.
//! When a later request to the same URL fails and no custom handler is
//! registered, the fallback strategy serves the cached body if it is still
//! inside the freshness window.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;

/// Freshness window for cached responses (5 minutes)
const FRESHNESS_WINDOW_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedResponse {
    body: Value,
    stored_at: DateTime<Utc>,
}

/// URL-keyed cache of recently seen response bodies
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
}

impl ResponseCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Stores a response body for `url`
    pub fn store(&self, url: &str, body: Value) {
        self.entries.insert(
            url.to_string(),
            CachedResponse {
                body,
                stored_at: Utc::now(),
            },
        );
    }

    /// Returns the cached body for `url` if still fresh
    ///
    /// Stale entries are evicted on lookup.
    pub fn lookup(&self, url: &str) -> Option<Value> {
        let fresh_after = Utc::now() - Duration::seconds(FRESHNESS_WINDOW_SECS);

        // The read guard must drop before the remove below.
        match self.entries.get(url) {
            None => return None,
            Some(entry) if entry.stored_at >= fresh_after => return Some(entry.body.clone()),
            Some(_) => {}
        }

        self.entries.remove(url);
        None
    }

    /// Number of cached entries, stale included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
