//! Cadence Core - Foundational types for the Cadence frame scheduler
//!
//! This crate provides the types that all other Cadence crates depend on:
//! - `FrameTime` - Immutable per-update time snapshot
//! - Error types and Result alias

mod error;
mod time;

pub use error::{CadenceError, Result};
pub use time::FrameTime;
