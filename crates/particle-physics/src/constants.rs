//! Simulation constants
//!
//! Tuned for a screen-space canvas measured in pixels and a timestep in
//! seconds. These are fixed at compile time; there is no runtime tuning.

/// Number of `f32` values stored per particle: `[x, y, dx, dy, anchor_x, anchor_y]`
pub const PARTICLE_STRIDE: usize = 6;

/// Numerator of the pointer inverse-square force (`m / r²`)
pub const POINTER_FORCE_STRENGTH: f32 = 25_830_000.0 * 15.0;

/// Upper bound on the pointer force magnitude
pub const POINTER_FORCE_CAP: f32 = 1200.0;

/// Velocity gain applied to each pointer's force
pub const POINTER_FORCE_GAIN: f32 = 3.0;

/// Distance from the anchor below which the restoring force is zero
pub const ANCHOR_THRESHOLD: f32 = 0.5;

/// Upper bound on the restoring force magnitude
pub const ANCHOR_FORCE_CAP: f32 = 12_000.0;

/// Largest timestep handed to the workers (seconds)
pub const MAX_DT: f32 = 0.1;

/// Spawn velocity range per axis, `[-SPAWN_VELOCITY, SPAWN_VELOCITY]`
pub const SPAWN_VELOCITY: f32 = 30.0;

/// RGB added to a pixel for every particle that lands on it
pub const PARTICLE_COLOR: [u8; 3] = [30, 40, 65];
