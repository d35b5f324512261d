//! Injectable time source.

use crate::Timestamp;

/// Source of "now" for TTL and sync bookkeeping.
///
/// Production code uses [`SystemClock`]; tests swap in a controllable
/// clock so expiry can be exercised without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
