//! Per-particle integration step

use crate::constants::POINTER_FORCE_GAIN;
use crate::forces::{anchor_force, pointer_force};
use crate::particle::Particle;
use glam::Vec2;

/// Advances particles one timestep at a time.
///
/// Owns the force accumulator reused across particles, so one integrator
/// belongs to one worker and is never shared.
#[derive(Debug, Default)]
pub struct Integrator {
    force: Vec2,
}

impl Integrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last force written to the accumulator
    pub fn force(&self) -> Vec2 {
        self.force
    }

    /// Integrate one particle over `dt` seconds with the given pointers active.
    ///
    /// Velocity decays by `1 / (1 + dt)`, then every pointer adds its force
    /// (contributions compound per pointer), then the anchor force is
    /// applied and the position advances by the new velocity. The anchor
    /// is left untouched.
    pub fn advance(&mut self, particle: &mut Particle, dt: f32, pointers: &[Vec2]) {
        let position = particle.position();
        let decay = 1.0 / (1.0 + dt);
        let mut velocity = particle.velocity() * decay;

        for &pointer in pointers {
            self.force = pointer_force(pointer, position);
            velocity += self.force * dt * POINTER_FORCE_GAIN;
        }

        self.force = anchor_force(particle.anchor(), position);
        velocity += self.force * dt;

        particle.set_position(position + velocity * dt);
        particle.set_velocity(velocity);
    }
}
