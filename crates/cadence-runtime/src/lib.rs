//! Cadence Runtime - Frame scheduling infrastructure
//!
//! Provides the frame loop building blocks:
//! - `GameLoop` — fixed/variable timestep accumulator and frame driver
//! - `SortedRegistry` — ordered, filtered registry that tolerates mutation
//!   from inside its own traversal
//! - `Updateable` / `Drawable` / `Initializable` — component capability traits
//! - `Platform` — hooks into the windowing/device backend
//! - `LoopConfig` — TOML-loadable scheduler configuration

mod clock;
mod component;
mod config;
mod driver;
mod platform;
mod registry;

pub use clock::{MonotonicClock, TimeSource};
pub use component::{Component, Components, Drawable, Initializable, Updateable};
pub use config::LoopConfig;
pub use driver::{
    ExitSignal, GameLoop, LoopState, RunBehavior, DEFAULT_INACTIVE_SLEEP, DEFAULT_MAX_STEP,
    DEFAULT_TARGET_STEP,
};
pub use platform::{HeadlessPlatform, Platform};
pub use registry::{DrawRegistry, Handle, SortedRegistry, UpdateRegistry};
