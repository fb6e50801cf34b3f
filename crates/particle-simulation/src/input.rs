//! Pointer and touch input

use crate::params::MAX_POINTERS;
use glam::Vec2;

/// Pointer event in canvas pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { id: u64, x: f32, y: f32 },
    Move { id: u64, x: f32, y: f32 },
    Up { id: u64 },
}

/// Tracks the pointers currently pressed, in press order.
///
/// The coordinator copies [`PointerTracker::positions`] into the
/// frame-parameter buffer at the start of every frame.
#[derive(Debug, Default)]
pub struct PointerTracker {
    active: Vec<(u64, Vec2)>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { id, x, y } => {
                let position = Vec2::new(x, y);
                if let Some(entry) = self.active.iter_mut().find(|(active, _)| *active == id) {
                    entry.1 = position;
                } else if self.active.len() < MAX_POINTERS {
                    self.active.push((id, position));
                } else {
                    log::debug!("ignoring pointer {id}: {MAX_POINTERS} pointers already down");
                }
            }
            PointerEvent::Move { id, x, y } => {
                // Moves of a pointer that isn't pressed (hover) don't exert force.
                if let Some(entry) = self.active.iter_mut().find(|(active, _)| *active == id) {
                    entry.1 = Vec2::new(x, y);
                }
            }
            PointerEvent::Up { id } => self.active.retain(|(active, _)| *active != id),
        }
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.active.iter().map(|&(_, position)| position).collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
