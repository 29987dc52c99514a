//! Per-update time snapshot

use std::time::Duration;

/// Snapshot of simulation time handed to every update and draw callback.
///
/// A fresh value is produced for each update call; callbacks cannot mutate
/// the scheduler's notion of time through it. For the draw phase of a
/// fixed-step tick, `elapsed` is the aggregate of all update steps the tick
/// performed, even though each individual update saw a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTime {
    /// Duration covered by the current update.
    pub elapsed: Duration,
    /// Accumulated simulation time since the loop started. Never decreases.
    pub total: Duration,
    /// Sustained (not momentary) inability to keep the target update cadence.
    pub running_slowly: bool,
}

impl FrameTime {
    pub fn new(elapsed: Duration, total: Duration, running_slowly: bool) -> Self {
        Self {
            elapsed,
            total,
            running_slowly,
        }
    }

    /// A zero-length snapshot at the start of simulation time.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Elapsed time in seconds, for simulation arithmetic.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Total time in seconds.
    pub fn total_secs(&self) -> f64 {
        self.total.as_secs_f64()
    }
}
