//! Timestep accumulator and frame driver
//!
//! `GameLoop` turns repeated `tick()` calls into a correct, bounded
//! sequence of update and draw invocations. In fixed-step mode it paces the
//! calling thread to the target cadence, runs catch-up steps bounded by
//! `max_step`, and tracks a hysteresis-filtered running-slowly signal; in
//! variable-step mode each tick performs exactly one update covering the
//! real elapsed time.

use crate::clock::{MonotonicClock, TimeSource};
use crate::component::{Components, Drawable, Updateable};
use crate::platform::Platform;
use crate::registry::{DrawRegistry, SortedRegistry, UpdateRegistry};
use cadence_core::{CadenceError, FrameTime, Result};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Consecutive lagging frames needed to trip the running-slowly signal.
const LAG_THRESHOLD: u32 = 5;

/// Default fixed step: 60 updates per second.
pub const DEFAULT_TARGET_STEP: Duration = Duration::from_nanos(16_666_667);
/// Default upper bound on catch-up work after a stall.
pub const DEFAULT_MAX_STEP: Duration = Duration::from_millis(500);
/// Default pacing delay while the platform is inactive.
pub const DEFAULT_INACTIVE_SLEEP: Duration = Duration::from_millis(20);

/// Lifecycle of the frame driver. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Initialized,
    Running,
    Exiting,
    Disposed,
}

/// How `run` drives the loop. Only synchronous driving is supported; an
/// unrecognized behavior is a fatal configuration error, not a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBehavior {
    Synchronous,
    Asynchronous,
}

/// Cloneable flag callbacks use to request that the run loop exit, without
/// holding a reference to the driver itself.
///
/// The driver consumes the signal at its next decision point: future ticks
/// stop and the next draw is suppressed once.
#[derive(Clone, Default)]
pub struct ExitSignal(Rc<Cell<bool>>);

impl ExitSignal {
    pub fn request_exit(&self) {
        self.0.set(true);
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

pub(crate) fn update_key(item: &dyn Updateable) -> i32 {
    item.update_order()
}

pub(crate) fn update_active(item: &dyn Updateable) -> bool {
    item.enabled()
}

pub(crate) fn draw_key(item: &dyn Drawable) -> i32 {
    item.draw_order()
}

pub(crate) fn draw_active(item: &dyn Drawable) -> bool {
    item.visible()
}

/// The frame driver: owns the clock, the accumulator state, and both
/// component registries. Single-threaded; callbacks re-enter the registries
/// through `Rc` clones, never through the driver.
pub struct GameLoop<P: Platform> {
    platform: P,
    clock: Box<dyn TimeSource>,
    state: LoopState,

    target_step: Duration,
    max_step: Duration,
    fixed_step: bool,
    inactive_sleep: Duration,

    accumulated: Duration,
    previous: Duration,
    total: Duration,
    lag_counter: u32,
    running_slowly: bool,
    suppress_next_draw: bool,

    updateables: Rc<UpdateRegistry>,
    drawables: Rc<DrawRegistry>,
    components: Rc<Components>,
    exit_signal: ExitSignal,
}

impl<P: Platform> GameLoop<P> {
    /// Creates a driver over the real monotonic clock.
    pub fn new(platform: P) -> Self {
        Self::with_clock(platform, Box::new(MonotonicClock::new()))
    }

    /// Creates a driver with an explicit time source. Tests script the
    /// clock through this.
    pub fn with_clock(platform: P, clock: Box<dyn TimeSource>) -> Self {
        let updateables = Rc::new(SortedRegistry::new(
            update_key as fn(&dyn Updateable) -> i32,
            update_active as fn(&dyn Updateable) -> bool,
        ));
        let drawables = Rc::new(SortedRegistry::new(
            draw_key as fn(&dyn Drawable) -> i32,
            draw_active as fn(&dyn Drawable) -> bool,
        ));
        let components = Rc::new(Components::new(updateables.clone(), drawables.clone()));
        Self {
            platform,
            clock,
            state: LoopState::Uninitialized,
            target_step: DEFAULT_TARGET_STEP,
            max_step: DEFAULT_MAX_STEP,
            fixed_step: true,
            inactive_sleep: DEFAULT_INACTIVE_SLEEP,
            accumulated: Duration::ZERO,
            previous: Duration::ZERO,
            total: Duration::ZERO,
            lag_counter: 0,
            running_slowly: false,
            suppress_next_draw: false,
            updateables,
            drawables,
            components,
            exit_signal: ExitSignal::default(),
        }
    }

    /// The component source callbacks and applications register with.
    /// Clone the `Rc` to add or remove components from inside a callback.
    pub fn components(&self) -> &Rc<Components> {
        &self.components
    }

    /// Direct access to the updateable registry, e.g. for order/active
    /// change notifications.
    pub fn updateables(&self) -> &Rc<UpdateRegistry> {
        &self.updateables
    }

    /// Direct access to the drawable registry.
    pub fn drawables(&self) -> &Rc<DrawRegistry> {
        &self.drawables
    }

    /// A cloneable handle for requesting exit from anywhere.
    pub fn exit_signal(&self) -> ExitSignal {
        self.exit_signal.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn target_step(&self) -> Duration {
        self.target_step
    }

    pub fn max_step(&self) -> Duration {
        self.max_step
    }

    pub fn is_fixed_step(&self) -> bool {
        self.fixed_step
    }

    pub fn inactive_sleep(&self) -> Duration {
        self.inactive_sleep
    }

    /// Total accumulated simulation time.
    pub fn total_time(&self) -> Duration {
        self.total
    }

    /// Hysteresis-filtered signal: sustained inability to keep the target
    /// cadence. A single catch-up frame does not trip it.
    pub fn is_running_slowly(&self) -> bool {
        self.running_slowly
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Sets the fixed-step duration. Rejects zero; on rejection the
    /// previous valid value is retained. Fires the platform's
    /// changing/changed hooks around an actual change.
    pub fn set_target_step(&mut self, step: Duration) -> Result<()> {
        if step.is_zero() {
            return Err(CadenceError::InvalidTargetStep);
        }
        if step != self.target_step {
            self.platform.target_step_changing(self.target_step, step);
            self.target_step = step;
            self.platform.target_step_changed(step);
        }
        Ok(())
    }

    /// Sets the clamp applied to accumulated time before each decision
    /// point. Rejects values below the target step. (Negative durations are
    /// unrepresentable; raw config values are validated in `LoopConfig`.)
    pub fn set_max_step(&mut self, step: Duration) -> Result<()> {
        if step < self.target_step {
            return Err(CadenceError::InvalidMaxStep);
        }
        self.max_step = step;
        Ok(())
    }

    pub fn set_fixed_step(&mut self, fixed: bool) {
        self.fixed_step = fixed;
    }

    /// Sets the pacing delay applied while the platform is inactive.
    pub fn set_inactive_sleep(&mut self, duration: Duration) {
        self.inactive_sleep = duration;
    }

    /// Raises the one-shot flag that skips the next draw phase. Consumed
    /// and cleared by the tick that would have drawn.
    pub fn suppress_draw(&mut self) {
        self.suppress_next_draw = true;
    }

    /// Requests the run loop to stop. Future ticks are prevented and the
    /// next draw is suppressed once; an in-flight update or draw is never
    /// cancelled.
    pub fn exit(&mut self) {
        self.assert_not_disposed();
        if self.state != LoopState::Exiting {
            log::debug!("exit requested");
        }
        self.state = LoopState::Exiting;
        self.suppress_next_draw = true;
    }

    /// Discards unconsumed wall-clock time so the next tick sees a near-zero
    /// delta. Call after a long blocking operation (loading, debugger pause)
    /// that should not be treated as lag.
    pub fn reset_elapsed_time(&mut self) {
        self.previous = self.clock.now();
        self.accumulated = Duration::ZERO;
        self.lag_counter = 0;
        self.running_slowly = false;
    }

    /// Runs deferred component initialization and anchors the clock.
    /// Called implicitly by the first `run`/`tick`; calling it earlier
    /// pins the start of simulation time to now.
    pub fn initialize(&mut self) -> Result<()> {
        self.assert_not_disposed();
        self.ensure_initialized()
    }

    /// Idempotent teardown: unsubscribes every resident item from both
    /// registries, discards all registrations, and moves to `Disposed`.
    /// Any tick/run attempt afterwards fails fast.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::Disposed {
            return;
        }
        self.components.clear();
        self.state = LoopState::Disposed;
        log::debug!("frame loop disposed");
    }

    /// Drives the loop until a component or the platform requests exit.
    ///
    /// Initializes on first use, performs one zero-length update before the
    /// first draw, then ticks until `Exiting`; finally fires the platform's
    /// teardown notification. Callback errors propagate out immediately.
    pub fn run(&mut self, behavior: RunBehavior) -> Result<()> {
        self.assert_not_disposed();
        match behavior {
            RunBehavior::Synchronous => {}
            other => {
                return Err(CadenceError::UnsupportedRunBehavior(format!("{other:?}")));
            }
        }

        self.ensure_initialized()?;
        self.state = LoopState::Running;
        log::debug!(
            "run loop starting: target_step={:?} fixed_step={}",
            self.target_step,
            self.fixed_step
        );

        // Components see one zero-length update before anything is drawn.
        let warmup = FrameTime::new(Duration::ZERO, self.total, false);
        self.do_update(&warmup)?;

        while self.state == LoopState::Running {
            self.tick()?;
        }

        self.platform.exiting();
        log::debug!("run loop exited after {:?} simulated", self.total);
        Ok(())
    }

    /// Initializes on first use and performs exactly one tick.
    pub fn run_one_frame(&mut self) -> Result<()> {
        self.tick()
    }

    /// One frame: zero or more fixed update steps (or one variable step),
    /// then at most one draw pass.
    pub fn tick(&mut self) -> Result<()> {
        self.assert_not_disposed();
        self.ensure_initialized()?;
        if self.state == LoopState::Initialized {
            self.state = LoopState::Running;
        }
        self.poll_exit();
        if self.state != LoopState::Running {
            return Ok(());
        }

        // Pace down while the platform does not have focus.
        if !self.platform.is_active() && !self.inactive_sleep.is_zero() {
            self.platform.sleep(self.inactive_sleep);
        }

        loop {
            let now = self.clock.now();
            let delta = now.saturating_sub(self.previous);
            self.previous = now;
            self.accumulated += delta;
            if !self.fixed_step || self.accumulated >= self.target_step {
                break;
            }
            // Not yet time for the next fixed step; block for the
            // remainder. Sleep granularity is coarse, so the loop re-reads
            // the clock rather than trusting the request was honored.
            self.platform.sleep(self.target_step - self.accumulated);
        }

        // Bound catch-up work after a stall (debugger pause, OS suspend).
        if self.accumulated > self.max_step {
            log::trace!(
                "clamping accumulated {:?} to max step {:?}",
                self.accumulated,
                self.max_step
            );
            self.accumulated = self.max_step;
        }

        let draw_time = if self.fixed_step {
            let mut step_count: u32 = 0;
            while self.accumulated >= self.target_step {
                self.poll_exit();
                if self.state != LoopState::Running {
                    break;
                }
                self.total += self.target_step;
                self.accumulated -= self.target_step;
                step_count += 1;
                let frame = FrameTime::new(self.target_step, self.total, self.running_slowly);
                self.do_update(&frame)?;
            }

            // Every step beyond the first this frame is lag; a single
            // on-pace frame earns one recovery credit back.
            self.lag_counter += step_count.saturating_sub(1);
            if self.running_slowly && self.lag_counter == 0 {
                self.running_slowly = false;
                log::debug!("caught back up to target cadence");
            } else if self.lag_counter >= LAG_THRESHOLD && !self.running_slowly {
                self.running_slowly = true;
                log::debug!("running slowly: lag counter {}", self.lag_counter);
            }
            if step_count == 1 && self.lag_counter > 0 {
                self.lag_counter -= 1;
            }

            // The draw phase sees the aggregate of this frame's steps.
            FrameTime::new(self.target_step * step_count, self.total, self.running_slowly)
        } else {
            let elapsed = self.accumulated;
            self.accumulated = Duration::ZERO;
            self.total += elapsed;
            let frame = FrameTime::new(elapsed, self.total, false);
            self.do_update(&frame)?;
            frame
        };

        // An exit requested by an update callback suppresses this frame's
        // draw, not just a later one.
        self.poll_exit();

        if self.suppress_next_draw {
            self.suppress_next_draw = false;
        } else {
            self.do_draw(&draw_time)?;
        }
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.state == LoopState::Uninitialized {
            self.components.initialize_all()?;
            self.previous = self.clock.now();
            self.state = LoopState::Initialized;
            log::debug!("frame loop initialized");
        }
        Ok(())
    }

    fn poll_exit(&mut self) {
        if self.exit_signal.take() {
            self.exit();
        }
    }

    fn do_update(&mut self, time: &FrameTime) -> Result<()> {
        if !self.platform.before_update(time) {
            return Ok(());
        }
        self.updateables
            .for_each_active(|item| item.borrow_mut().update(time))
    }

    fn do_draw(&mut self, time: &FrameTime) -> Result<()> {
        if !self.platform.before_draw(time) {
            return Ok(());
        }
        self.drawables
            .for_each_active(|item| item.borrow_mut().draw(time))?;
        self.platform.present();
        Ok(())
    }

    fn assert_not_disposed(&self) {
        assert!(
            self.state != LoopState::Disposed,
            "frame loop used after shutdown"
        );
    }
}
