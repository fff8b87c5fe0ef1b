use std::thread;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

/// Time source for delays and polling. Swapped out in tests so waits are
/// virtual.
pub trait Clock {
    /// Monotonic instant used for deadline checks.
    fn now(&self) -> Instant;
    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
    /// Wall-clock time used to stamp clone names.
    fn wall_clock(&self) -> OffsetDateTime;
}

/// Real clock backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn wall_clock(&self) -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}
