//! Particle record and its flat `f32` layout

use crate::constants::PARTICLE_STRIDE;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// One particle as stored in the shared particle buffer.
///
/// Laid out as `PARTICLE_STRIDE` consecutive `f32` values with no padding;
/// the `Pod` derive rejects any field change that would break that.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    /// Rest position, fixed at spawn
    pub anchor_x: f32,
    pub anchor_y: f32,
}

const _: () = assert!(std::mem::size_of::<Particle>() == PARTICLE_STRIDE * 4);

impl Particle {
    /// Create a particle resting at its own anchor
    pub fn spawn(position: Vec2, velocity: Vec2) -> Self {
        Self {
            x: position.x,
            y: position.y,
            dx: velocity.x,
            dy: velocity.y,
            anchor_x: position.x,
            anchor_y: position.y,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }

    pub fn anchor(&self) -> Vec2 {
        Vec2::new(self.anchor_x, self.anchor_y)
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.dx = velocity.x;
        self.dy = velocity.y;
    }

    /// Pixel the particle covers on a `width × height` canvas, if it is on it.
    ///
    /// Particles outside `[0, width) × [0, height)` keep simulating and may
    /// re-enter later; they just aren't painted.
    pub fn pixel(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let on_canvas = self.x >= 0.0
            && self.x < width as f32
            && self.y >= 0.0
            && self.y < height as f32;

        on_canvas.then(|| (self.x.floor() as u32, self.y.floor() as u32))
    }
}
