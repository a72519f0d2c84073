//! Per-key cooldown guard.
//!
//! `allow` is a pure rate gate: it records the call time whether or not the
//! caller's work later succeeds. Records are never removed, so the map holds
//! one entry per distinct key for the life of the process.

use crate::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
pub struct CooldownGuard {
    last_call: Mutex<HashMap<String, Instant>>,
    clock: Arc<dyn Clock>,
}

impl Default for CooldownGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownGuard {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            last_call: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Returns true and records now if `key` has not been allowed within the
    /// last `min_gap`. Returns false, without touching the record, otherwise.
    pub fn allow(&self, key: &str, min_gap: Duration) -> bool {
        let now = self.clock.now();
        let mut last_call = self.last_call.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = last_call.get(key) {
            let since = now.saturating_duration_since(*last);
            if since < min_gap {
                debug!(key, since_ms = since.as_millis() as u64, "Cooldown active");
                return false;
            }
        }

        last_call.insert(key.to_string(), now);
        true
    }

    pub fn tracked_keys(&self) -> usize {
        self.last_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
