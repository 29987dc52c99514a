//! Monotonic time source behind the frame driver

use std::time::{Duration, Instant};

/// A monotonic clock the frame driver reads once per tick decision point.
///
/// The seam exists so tests can script wall-clock progression; production
/// code uses [`MonotonicClock`].
pub trait TimeSource {
    /// Time elapsed since an arbitrary fixed origin. Must never decrease.
    fn now(&mut self) -> Duration;
}

/// Production time source backed by `std::time::Instant`.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_decreases() {
        let mut clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
