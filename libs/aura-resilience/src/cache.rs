//! In-memory response cache keyed on a payload fingerprint.
//!
//! Entries expire `ttl` after insertion and are purged lazily by the lookup
//! that finds them stale. The map never holds more than `capacity` entries:
//! inserting a new key into a full cache first evicts the oldest insertion.

use crate::clock::{Clock, SystemClock};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const CACHE_TTL: Duration = Duration::from_secs(90);
pub const CACHE_MAX: usize = 300;

/// Short deterministic key for a payload: `scope:sha256[..12]:len`.
/// The full payload is never stored.
pub fn fingerprint(payload: &str, scope: &str) -> String {
    let digest = hex::encode(Sha256::digest(payload.as_bytes()));
    format!("{}:{}:{}", scope, &digest[..12], payload.len())
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    // insertion order, oldest first; always the same key set as `entries`
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self.order.pop_front()?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(CACHE_TTL, CACHE_MAX, clock)
    }

    pub fn with_limits(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            capacity: capacity.max(1),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, payload: &str, scope: &str) -> Option<String> {
        let key = fingerprint(payload, scope);
        let now = self.clock.now();
        let mut state = self.lock();

        match state.entries.get(&key) {
            None => {
                debug!(scope, "Response cache miss");
                return None;
            }
            Some(entry) if now <= entry.expires_at => {
                debug!(scope, "Response cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }

        state.remove(&key);
        debug!(scope, "Response cache entry expired");
        None
    }

    pub fn put(&self, payload: &str, value: impl Into<String>, scope: &str) {
        let key = fingerprint(payload, scope);
        let entry = CacheEntry {
            value: value.into(),
            expires_at: self.clock.now() + self.ttl,
        };
        let mut state = self.lock();

        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        if state.entries.len() >= self.capacity {
            if let Some(evicted) = state.evict_oldest() {
                debug!(evicted = %evicted, capacity = self.capacity, "Response cache full, evicted oldest entry");
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
