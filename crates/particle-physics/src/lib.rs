//! # Particle Physics
//!
//! Particle layout, fixed constants, force helpers and the per-particle
//! integration step run by every simulation worker.

pub mod constants;
pub mod forces;
pub mod integrate;
pub mod particle;

pub use constants::*;
pub use forces::*;
pub use integrate::*;
pub use particle::*;
