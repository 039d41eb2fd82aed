//! Fixed-timestep simulation system
//!
//! Converts variable frame times into a whole number of fixed physics steps:
//! - Frame time capping
//! - Accumulation of leftover time
//! - Physics stepping

use tumble_physics::PhysicsWorld;

/// What a call to [`SimulationSystem::update`] did
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Physics steps taken this frame
    pub steps: u32,
    /// Frame time that was discarded by the cap
    pub dropped_time: f64,
}

/// Drives a physics world at a fixed timestep
pub struct SimulationSystem {
    timestep: f64,
    max_frame_time: f64,
    accumulator: f64,
    total_steps: u64,
}

impl SimulationSystem {
    /// Create a new simulation system
    ///
    /// Frames longer than `max_frame_time` are clamped to prevent a spiral
    /// of death after a stall.
    pub fn new(timestep: f64, max_frame_time: f64) -> Self {
        Self {
            timestep,
            max_frame_time: max_frame_time.max(timestep),
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Physics steps taken since creation
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Simulated time covered by the steps taken so far
    pub fn simulated_time(&self) -> f64 {
        self.total_steps as f64 * self.timestep
    }

    /// Advance `world` by a frame lasting `frame_time` seconds
    pub fn update(&mut self, world: &mut PhysicsWorld, frame_time: f64) -> StepReport {
        if !(self.timestep > 0.0) {
            log::warn!("Simulation timestep {} is not positive; not stepping", self.timestep);
            return StepReport::default();
        }

        let frame_time = frame_time.max(0.0);
        let dt = frame_time.min(self.max_frame_time);
        self.accumulator += dt;

        let mut steps = 0;
        while self.accumulator >= self.timestep {
            world.step(self.timestep);
            self.accumulator -= self.timestep;
            steps += 1;
        }
        self.total_steps += u64::from(steps);

        StepReport {
            steps,
            dropped_time: frame_time - dt,
        }
    }
}

impl Default for SimulationSystem {
    fn default() -> Self {
        Self::new(1.0 / 60.0, 0.25)
    }
}
