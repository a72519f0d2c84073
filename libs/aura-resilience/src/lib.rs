//! Fault tolerance for calls to remote AI services.
//!
//! Three independent primitives, each an explicit service object that is
//! built once at start-up and shared by reference:
//! - [`RetryPolicy`]: exponential backoff for rate-limit/quota errors
//! - [`ResponseCache`]: bounded TTL cache keyed by a payload fingerprint
//! - [`CooldownGuard`]: per-key minimum interval between calls

pub mod cache;
pub mod clock;
pub mod cooldown;
pub mod retry;

pub use cache::ResponseCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::CooldownGuard;
pub use retry::{is_transient, RetryPolicy};
