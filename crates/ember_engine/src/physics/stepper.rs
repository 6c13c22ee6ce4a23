//! Fixed-timestep driver

use super::backend::PhysicsBackend;
use crate::config::PhysicsConfig;

/// Turns variable frame deltas into fixed simulation steps
///
/// Time left over after the last whole step carries into the next frame.
/// When a frame would need more than `max_substeps` steps the excess is
/// dropped, so a long hitch slows the simulation down instead of spiralling.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    timestep: f32,
    max_substeps: u32,
    accumulator: f32,
}

impl FixedStepper {
    /// Stepper issuing steps of `timestep` seconds, at most `max_substeps` per frame
    pub fn new(timestep: f32, max_substeps: u32) -> Self {
        Self {
            timestep: timestep.max(f32::EPSILON),
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
        }
    }

    /// Stepper configured from [`PhysicsConfig`]
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self::new(config.fixed_timestep, config.max_substeps)
    }

    /// Add `delta` seconds and run the steps that became due; returns how many ran
    pub fn advance(&mut self, backend: &mut dyn PhysicsBackend, delta: f32) -> u32 {
        self.accumulator += delta.max(0.0);
        let mut steps = 0;
        while self.accumulator >= self.timestep && steps < self.max_substeps {
            backend.update(self.timestep);
            self.accumulator -= self.timestep;
            steps += 1;
        }
        if self.accumulator >= self.timestep {
            log::debug!(
                "Physics fell behind, dropping {:.3}s",
                self.accumulator - self.accumulator % self.timestep
            );
            self.accumulator %= self.timestep;
        }
        steps
    }

    /// Fraction of a step left in the accumulator, for interpolation
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.timestep
    }

    /// Step length in seconds
    pub fn timestep(&self) -> f32 {
        self.timestep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BasicBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_accumulates_partial_steps() {
        let mut backend = BasicBackend::default();
        let mut stepper = FixedStepper::new(0.01, 8);
        assert_eq!(stepper.advance(&mut backend, 0.004), 0);
        assert_eq!(stepper.advance(&mut backend, 0.004), 0);
        assert_eq!(stepper.advance(&mut backend, 0.004), 1);
        assert_relative_eq!(stepper.alpha(), 0.2, epsilon = 1e-3);
    }

    #[test]
    fn test_substep_limit_drops_backlog() {
        let mut backend = BasicBackend::default();
        let mut stepper = FixedStepper::new(0.01, 4);
        assert_eq!(stepper.advance(&mut backend, 1.0), 4);
        assert!(stepper.alpha() < 1.0);
        assert_eq!(stepper.advance(&mut backend, 0.0), 0);
    }
}
