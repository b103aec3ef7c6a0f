//! [`SimulationLoop`] – fixed-step clock driving a world and its sensors.
//!
//! Each step every plugin observes the world at the current simulation time,
//! then the world and the clock advance by `step_size`.  The loop is
//! single-threaded and run-to-completion per step; the only way to stop it
//! early is the shared shutdown flag checked between steps.

use std::sync::atomic::{AtomicBool, Ordering};

use odosim_hal::SimWorld;
use odosim_middleware::MeasurementSink;
use odosim_types::{OdomError, Stamp};
use tracing::{info, info_span};

use crate::plugin::{OdometryPlugin, OdometryPluginConfig, Release};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub steps: u64,
    pub released: u64,
    /// Deliveries that failed at the publish boundary.
    pub publish_failures: u64,
}

pub struct SimulationLoop<S> {
    world: SimWorld,
    plugins: Vec<OdometryPlugin<S>>,
    step_size: f64,
    stats: LoopStats,
}

impl<S: MeasurementSink> SimulationLoop<S> {
    /// # Errors
    ///
    /// [`OdomError::Config`] when `step_size` is not a positive finite number.
    pub fn new(world: SimWorld, step_size: f64) -> Result<Self, OdomError> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(OdomError::Config(format!(
                "step_size must be finite and > 0, got {step_size}"
            )));
        }
        Ok(Self {
            world,
            plugins: Vec::new(),
            step_size,
            stats: LoopStats::default(),
        })
    }

    /// Load an odometry plugin against this loop's world.
    pub fn add_plugin(&mut self, config: &OdometryPluginConfig, sink: S) -> Result<(), OdomError> {
        let plugin = OdometryPlugin::load(config, &self.world, sink)?;
        self.plugins.push(plugin);
        Ok(())
    }

    /// Current simulation time.
    pub fn sim_time(&self) -> Stamp {
        Stamp::from_secs_f64(self.stats.steps as f64 * self.step_size)
    }

    /// Run every plugin once, then advance the world.  Returns the
    /// measurements released this step.
    pub fn step(&mut self) -> Result<Vec<Release>, OdomError> {
        let now = self.sim_time();
        let mut released = Vec::new();
        for plugin in &mut self.plugins {
            if let Some(release) = plugin.on_update(&self.world, now)? {
                self.stats.publish_failures += release.report.failed.len() as u64;
                released.push(release);
            }
        }
        self.stats.released += released.len() as u64;

        self.world.step(self.step_size);
        self.stats.steps += 1;
        Ok(released)
    }

    /// Step up to `iterations` times, stopping early once `shutdown` is set.
    pub fn run(&mut self, iterations: u64, shutdown: &AtomicBool) -> Result<LoopStats, OdomError> {
        let _span = info_span!("simulation", iterations, step_size = self.step_size).entered();
        info!(plugins = self.plugins.len(), "simulation started");
        for _ in 0..iterations {
            if shutdown.load(Ordering::Relaxed) {
                info!(steps = self.stats.steps, "shutdown requested");
                break;
            }
            self.step()?;
        }
        info!(
            steps = self.stats.steps,
            released = self.stats.released,
            "simulation finished"
        );
        Ok(self.stats)
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    pub fn plugins(&self) -> &[OdometryPlugin<S>] {
        &self.plugins
    }
}
