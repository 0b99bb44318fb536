//! Component D: the bounded, byte-budgeted LRU memory cache, paired with an
//! expiration timer queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use proxycache_types::CacheEntry;
use tokio::time::Instant;

use crate::tasks::TimerQueue;

/// Default byte budget for the memory tier: 10 MiB.
pub const DEFAULT_BUDGET_BYTES: usize = 10 * 1024 * 1024;

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
    generation: u64,
}

struct State {
    lru: LruCache<String, Slot>,
    size: usize,
    next_generation: u64,
}

/// A size-bounded LRU mapping request fingerprints to memory entries, with
/// best-effort expiration driven by a [`TimerQueue`].
#[derive(Clone)]
pub struct MemoryCache {
    budget: usize,
    state: Arc<Mutex<State>>,
    timers: TimerQueue,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("MemoryCache")
            .field("budget", &self.budget)
            .field("size", &state.size)
            .field("entries", &state.lru.len())
            .finish()
    }
}

impl MemoryCache {
    /// Builds an empty memory cache with the given byte budget, driven by
    /// `timers` for expiration.
    pub fn new(budget: usize, timers: TimerQueue) -> Self {
        Self {
            budget,
            state: Arc::new(Mutex::new(State {
                // Capacity is unbounded by item count; eviction is driven
                // entirely by the byte budget below.
                lru: LruCache::unbounded(),
                size: 0,
                next_generation: 0,
            })),
            timers,
        }
    }

    /// Looks up `hash`. A hit updates recency. An entry found past its
    /// `expiresAt` is treated as a miss (the timer queue removes it
    /// best-effort; this is a defensive check against timer latency).
    pub fn load(&self, hash: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let hit = state.lru.get(hash).map(|slot| (slot.expires_at, slot.entry.clone()));
        match hit {
            Some((expires_at, entry)) if expires_at > now => Some(entry),
            Some(_) => {
                // Expired but not yet reaped by the timer; evict it now.
                if let Some(slot) = state.lru.pop(hash) {
                    state.size = state.size.saturating_sub(slot.entry.size());
                }
                None
            }
            None => None,
        }
    }

    /// Inserts `entry` with the given `max_age`, scheduling its expiration.
    /// An entry larger than the configured budget is silently dropped, not
    /// an error. Eviction (LRU, to respect the budget) is atomic with
    /// respect to concurrent lookups — both happen under the same lock.
    pub fn store(&self, hash: &str, max_age: Duration, entry: CacheEntry) {
        let size = entry.size();
        if size > self.budget {
            return;
        }
        let generation = {
            let mut state = self.state.lock().unwrap();
            let generation = state.next_generation;
            state.next_generation += 1;

            if let Some(old) = state.lru.pop(hash) {
                state.size = state.size.saturating_sub(old.entry.size());
            }
            state.size += size;
            state.lru.put(
                hash.to_string(),
                Slot { entry, expires_at: Instant::now() + max_age, generation },
            );

            while state.size > self.budget {
                match state.lru.pop_lru() {
                    Some((_, evicted)) => {
                        state.size = state.size.saturating_sub(evicted.entry.size());
                    }
                    None => break,
                }
            }
            generation
        };

        let hash = hash.to_string();
        let state = self.state.clone();
        self.timers.schedule(max_age, move || {
            let mut state = state.lock().unwrap();
            let stale = matches!(state.lru.peek(&hash), Some(slot) if slot.generation == generation);
            if stale {
                if let Some(slot) = state.lru.pop(&hash) {
                    state.size = state.size.saturating_sub(slot.entry.size());
                }
            }
        });
    }

    /// Current total accounted size across all entries, for tests.
    #[cfg(test)]
    fn total_size(&self) -> usize {
        self.state.lock().unwrap().size
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use proxycache_types::HeaderEntries;

    fn entry(body: &str) -> CacheEntry {
        CacheEntry { headers: HeaderEntries::new(), body: Bytes::copy_from_slice(body.as_bytes()) }
    }

    #[tokio::test(start_paused = true)]
    async fn hit_then_miss_on_unknown_key() {
        let cache = MemoryCache::new(DEFAULT_BUDGET_BYTES, TimerQueue::new());
        cache.store("h1", Duration::from_secs(30), entry("hello"));
        assert_eq!(cache.load("h1").unwrap().body, Bytes::from_static(b"hello"));
        assert!(cache.load("nope").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_insert_is_silently_dropped() {
        let cache = MemoryCache::new(4, TimerQueue::new());
        cache.store("h1", Duration::from_secs(30), entry("hello"));
        assert!(cache.load("h1").is_none());
        assert_eq!(cache.total_size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_is_respected_via_lru_eviction() {
        let cache = MemoryCache::new(10, TimerQueue::new());
        cache.store("a", Duration::from_secs(30), entry("12345"));
        cache.store("b", Duration::from_secs(30), entry("67890"));
        // Inserting a third causes "a" (least recently used) to be evicted.
        cache.store("c", Duration::from_secs(30), entry("abcde"));
        assert!(cache.total_size() <= 10);
        assert!(cache.load("a").is_none());
        assert!(cache.load("b").is_some());
        assert!(cache.load("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_max_age() {
        let cache = MemoryCache::new(DEFAULT_BUDGET_BYTES, TimerQueue::new());
        cache.store("h1", Duration::from_secs(30), entry("v1"));
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(cache.load("h1").is_some());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cache.load("h1").is_none());
        assert_eq!(cache.total_size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_on_replaced_entry_is_a_no_op() {
        let cache = MemoryCache::new(DEFAULT_BUDGET_BYTES, TimerQueue::new());
        cache.store("h1", Duration::from_secs(10), entry("old"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        // Replace before the first timer fires; the stale timer must not
        // evict the replacement.
        cache.store("h1", Duration::from_secs(30), entry("new"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cache.load("h1").unwrap().body, Bytes::from_static(b"new"));
    }
}
