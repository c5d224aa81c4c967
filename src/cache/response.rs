//! Bounded prompt → response cache.
//!
//! [`PromptCache`] maps the rendered prompt text to the last response
//! computed for it, so repeated prompts skip the remote call (and its retry
//! loop) entirely.
//!
//! # Eviction policy
//!
//! Least recently used. A `get` hit and a `put` both count as a use,
//! including a `put` that overwrites an existing key. When an insert pushes
//! the cache over capacity, exactly one least-recently-used entry is
//! evicted before `put` returns.
//!
//! moka applies eviction during housekeeping, which it batches by default;
//! `put` runs pending housekeeping eagerly so the capacity bound and the
//! recency order hold at every call boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::telemetry;
use crate::types::ResponseState;

/// Default number of cached prompts.
pub const DEFAULT_CACHE_SIZE: u64 = 200;

/// Thread-safe, bounded LRU cache of model responses keyed on prompt text.
pub struct PromptCache {
    entries: Cache<String, ResponseState>,
    capacity: u64,
    evictions: Arc<AtomicU64>,
}

impl PromptCache {
    /// Create an empty cache holding at most `capacity` prompts.
    pub fn new(capacity: u64) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);

        let entries = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |key: Arc<String>, _value, cause| {
                if matches!(cause, RemovalCause::Size) {
                    counter.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
                    debug!(prompt_chars = key.len(), "evicted cached response");
                }
            })
            .build();

        Self {
            entries,
            capacity,
            evictions,
        }
    }

    /// Look up the response cached for `prompt`.
    ///
    /// Returns `None` on cache miss. Emits cache hit/miss metrics.
    pub fn get(&self, prompt: &str) -> Option<ResponseState> {
        match self.entries.get(prompt) {
            Some(state) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(prompt_chars = prompt.len(), "prompt cache hit");
                Some(state)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(prompt_chars = prompt.len(), "prompt cache miss");
                None
            }
        }
    }

    /// Insert (or overwrite) the response for `prompt`.
    pub fn put(&self, prompt: impl Into<String>, response: ResponseState) {
        self.entries.insert(prompt.into(), response);
        self.entries.run_pending_tasks();
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of entries currently in the cache.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries evicted for capacity since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Evict all entries. Not counted as capacity evictions.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }
}

impl Default for PromptCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> ResponseState {
        ResponseState::new(text, None)
    }

    #[test]
    fn miss_returns_none() {
        let cache = PromptCache::new(4);
        assert!(cache.get("absent").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = PromptCache::new(4);
        cache.put("prompt", state("answer"));
        assert_eq!(cache.get("prompt"), Some(state("answer")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites_existing_key() {
        let cache = PromptCache::new(4);
        cache.put("prompt", state("first"));
        cache.put("prompt", state("second"));
        assert_eq!(cache.get("prompt"), Some(state("second")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evictions(), 0);
    }

    #[test]
    fn default_capacity() {
        assert_eq!(PromptCache::default().capacity(), DEFAULT_CACHE_SIZE);
    }
}
