//! Platform hooks consumed by the frame driver
//!
//! The windowing/device backend sits behind this trait; the scheduler only
//! ever calls out through it. Every method has a default so a platform
//! implements just what it needs.

use cadence_core::FrameTime;
use std::time::Duration;

/// Hooks the frame driver fires around each phase of a tick.
pub trait Platform {
    /// Whether the platform currently has focus. While inactive, the driver
    /// sleeps its configured inactive delay at the top of each tick.
    fn is_active(&self) -> bool {
        true
    }

    /// Gate before the update phase of one step. Returning `false` skips
    /// the updates for this step only; it is not an error.
    fn before_update(&mut self, _time: &FrameTime) -> bool {
        true
    }

    /// Gate before the draw phase of one tick. Returning `false` skips the
    /// draw traversal and present for this tick only.
    fn before_draw(&mut self, _time: &FrameTime) -> bool {
        true
    }

    /// Presents the frame produced by the draw traversal.
    fn present(&mut self) {}

    /// Blocking delay used to pace a fixed step and to idle while inactive.
    /// Coarse, millisecond-granularity sleeping is acceptable here.
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Fired just before the target step changes, with the current and
    /// pending values.
    fn target_step_changing(&mut self, _current: Duration, _pending: Duration) {}

    /// Fired after the target step has changed.
    fn target_step_changed(&mut self, _current: Duration) {}

    /// Teardown notification, fired once after the run loop unwinds
    /// following an exit request.
    fn exiting(&mut self) {}
}

/// Platform with no window or device behind it. Used by tests and headless
/// runs; every hook keeps its default behavior.
#[derive(Debug, Default)]
pub struct HeadlessPlatform;

impl Platform for HeadlessPlatform {}
