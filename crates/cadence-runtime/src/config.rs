//! Scheduler configuration loaded from TOML
//!
//! Raw numeric fields are validated before use: this is the one boundary
//! where negative or non-finite values can appear, since the driver's own
//! setters deal in `Duration`.

use crate::driver::GameLoop;
use crate::platform::Platform;
use cadence_core::{CadenceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Frame loop configuration.
///
/// ```toml
/// target_hz = 60.0
/// max_step_ms = 500.0
/// fixed_timestep = true
/// inactive_sleep_ms = 20.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Fixed update rate in Hz.
    pub target_hz: f64,
    /// Upper bound on catch-up work per tick, in milliseconds. Must cover
    /// at least one target step.
    pub max_step_ms: f64,
    /// Fixed timestep when true, variable when false.
    pub fixed_timestep: bool,
    /// Pacing delay while the platform is inactive, in milliseconds.
    pub inactive_sleep_ms: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_hz: 60.0,
            max_step_ms: 500.0,
            fixed_timestep: true,
            inactive_sleep_ms: 20.0,
        }
    }
}

impl LoopConfig {
    /// Loads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the driver cannot represent or that would violate
    /// its invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.target_hz.is_finite() || self.target_hz <= 0.0 {
            return Err(CadenceError::ConfigError(format!(
                "target_hz must be positive, got {}",
                self.target_hz
            )));
        }
        if !self.max_step_ms.is_finite() || self.max_step_ms < 0.0 {
            return Err(CadenceError::ConfigError(format!(
                "max_step_ms must be non-negative, got {}",
                self.max_step_ms
            )));
        }
        let target_ms = 1000.0 / self.target_hz;
        if self.max_step_ms < target_ms {
            return Err(CadenceError::ConfigError(format!(
                "max_step_ms ({}) must cover at least one target step ({target_ms:.3} ms)",
                self.max_step_ms
            )));
        }
        if !self.inactive_sleep_ms.is_finite() || self.inactive_sleep_ms < 0.0 {
            return Err(CadenceError::ConfigError(format!(
                "inactive_sleep_ms must be non-negative, got {}",
                self.inactive_sleep_ms
            )));
        }
        Ok(())
    }

    pub fn target_step(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_hz)
    }

    pub fn max_step(&self) -> Duration {
        Duration::from_secs_f64(self.max_step_ms / 1000.0)
    }

    pub fn inactive_sleep(&self) -> Duration {
        Duration::from_secs_f64(self.inactive_sleep_ms / 1000.0)
    }

    /// Validates and applies every setting to the driver.
    pub fn apply<P: Platform>(&self, game: &mut GameLoop<P>) -> Result<()> {
        self.validate()?;
        game.set_target_step(self.target_step())?;
        game.set_max_step(self.max_step())?;
        game.set_fixed_step(self.fixed_timestep);
        game.set_inactive_sleep(self.inactive_sleep());
        Ok(())
    }
}
