//! Force calculations for pointer interaction and anchor restoration
//!
//! Both helpers return `Vec2::ZERO` instead of dividing by a zero or
//! non-finite distance, so a degenerate configuration can never push
//! `NaN`/`Inf` into the particle buffer.

use crate::constants::*;
use glam::Vec2;

/// Inverse-square force a pointer exerts on a particle.
///
/// Directed along the pointer→particle vector with magnitude
/// `min(POINTER_FORCE_CAP, POINTER_FORCE_STRENGTH / r²)`.
pub fn pointer_force(pointer: Vec2, particle: Vec2) -> Vec2 {
    let offset = particle - pointer;
    let distance_sq = offset.length_squared();

    // Also rejects NaN, which fails every comparison.
    if !(distance_sq > 0.0 && distance_sq.is_finite()) {
        return Vec2::ZERO;
    }

    let magnitude = POINTER_FORCE_CAP.min(POINTER_FORCE_STRENGTH / distance_sq);
    offset / distance_sq.sqrt() * magnitude
}

/// Restoring force pulling a particle back toward its anchor.
///
/// Zero inside `ANCHOR_THRESHOLD`; beyond it the magnitude grows with the
/// square of the distance up to `ANCHOR_FORCE_CAP`.
pub fn anchor_force(anchor: Vec2, particle: Vec2) -> Vec2 {
    let offset = anchor - particle;
    let distance = offset.length();

    if !(distance >= ANCHOR_THRESHOLD && distance.is_finite()) {
        return Vec2::ZERO;
    }

    let magnitude = ANCHOR_FORCE_CAP.min(distance * distance);
    offset / distance * magnitude
}
