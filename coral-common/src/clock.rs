//! Monotonic millisecond clock consumed by the event loop.

use std::time::Instant;

/// Millisecond clock anchored at construction time.
///
/// Keyspace and idle-list code take `now_ms` as a plain argument, so the clock itself stays at
/// the event-loop boundary and tests can drive time directly.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero point is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::MonotonicClock;
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    fn clock_never_runs_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert_that!(second >= first, eq(true));
    }
}
