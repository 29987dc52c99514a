//! Cadence Demo - Headless frame loop driver
//!
//! Runs the scheduler with a couple of toy components and logs what the
//! loop is doing. Useful for eyeballing pacing, catch-up, and the
//! running-slowly signal without a window or GPU behind it.
//!
//! Usage:
//!   cadence-demo [--frames <n>] [--config <loop.toml>] [--variable]

use anyhow::{Context, Result};
use cadence_core::FrameTime;
use cadence_runtime::{
    Component, Drawable, ExitSignal, GameLoop, HeadlessPlatform, LoopConfig, RunBehavior,
    Updateable,
};
use clap::Parser;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cadence-demo")]
#[command(about = "Cadence demo - run the frame scheduler headless")]
struct Args {
    /// Number of frames to run before exiting
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Path to a loop config TOML file
    #[arg(long)]
    config: Option<String>,

    /// Use a variable timestep instead of the fixed default
    #[arg(long)]
    variable: bool,
}

/// Integrates a spinning angle each update step.
struct Spinner {
    angle: f64,
    turns_per_sec: f64,
}

impl Updateable for Spinner {
    fn update(&mut self, time: &FrameTime) -> cadence_core::Result<()> {
        self.angle = (self.angle + self.turns_per_sec * time.elapsed_secs()).fract();
        Ok(())
    }
}

/// Logs frame stats roughly once per simulated second.
struct StatsDrawer {
    frames: u64,
    last_report: Duration,
}

impl Drawable for StatsDrawer {
    fn draw(&mut self, time: &FrameTime) -> cadence_core::Result<()> {
        self.frames += 1;
        if time.total - self.last_report >= Duration::from_secs(1) {
            log::info!(
                "t={:.2}s frames={} slow={}",
                time.total_secs(),
                self.frames,
                time.running_slowly
            );
            self.last_report = time.total;
        }
        Ok(())
    }

    fn draw_order(&self) -> i32 {
        100
    }
}

/// Requests exit once the frame budget is spent.
struct FrameBudget {
    remaining: u64,
    signal: ExitSignal,
}

impl Updateable for FrameBudget {
    fn update(&mut self, _time: &FrameTime) -> cadence_core::Result<()> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.signal.request_exit();
        }
        Ok(())
    }

    fn update_order(&self) -> i32 {
        // Run after the simulation components.
        100
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut game = GameLoop::new(HeadlessPlatform);

    let config = match &args.config {
        Some(path) => LoopConfig::load(path).context("Failed to load loop config")?,
        None => LoopConfig::default(),
    };
    config.apply(&mut game).context("Invalid loop config")?;
    if args.variable {
        game.set_fixed_step(false);
    }

    let spinner = Rc::new(RefCell::new(Spinner {
        angle: 0.0,
        turns_per_sec: 0.5,
    }));
    game.components()
        .add(Component::updateable(spinner.clone()))?;

    let stats = Rc::new(RefCell::new(StatsDrawer {
        frames: 0,
        last_report: Duration::ZERO,
    }));
    game.components().add(Component::drawable(stats))?;

    let budget = Rc::new(RefCell::new(FrameBudget {
        remaining: args.frames,
        signal: game.exit_signal(),
    }));
    game.components().add(Component::updateable(budget))?;

    game.run(RunBehavior::Synchronous)?;

    log::info!(
        "done: {:?} simulated, final angle {:.3}",
        game.total_time(),
        spinner.borrow().angle
    );
    game.shutdown();
    Ok(())
}
