//! Frame-parameter buffer shared by the coordinator and the workers
//!
//! Layout (`f32` slots):
//! - `[0]` dt in seconds
//! - `[1]` canvas width, `[2]` canvas height
//! - `[3]` active pointer count
//! - `[4..]` interleaved `(x, y)` per active pointer
//!
//! The coordinator writes it between frames; workers only read it while a
//! frame is in flight.

use glam::Vec2;
use std::sync::{PoisonError, RwLock};

/// Total number of `f32` slots in the buffer
pub const FRAME_PARAMS_LEN: usize = 256;

pub mod param_index {
    //! Indices into the frame-parameter buffer.

    pub const DT: usize = 0;
    pub const WIDTH: usize = 1;
    pub const HEIGHT: usize = 2;
    pub const POINTER_COUNT: usize = 3;
    pub const POINTERS: usize = 4;
}

/// Pointers that fit in the buffer after the header
pub const MAX_POINTERS: usize = (FRAME_PARAMS_LEN - param_index::POINTERS) / 2;

/// Coherent copy of the frame parameters a worker needs for one step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameInputs {
    pub dt: f32,
    pub width: u32,
    pub height: u32,
    pub pointers: Vec<Vec2>,
}

pub struct FrameParamBuffer {
    values: RwLock<[f32; FRAME_PARAMS_LEN]>,
}

impl Default for FrameParamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParamBuffer {
    pub fn new() -> Self {
        Self {
            values: RwLock::new([0.0; FRAME_PARAMS_LEN]),
        }
    }

    /// Record the canvas dimensions workers must match before painting
    pub fn set_dimensions(&self, width: u32, height: u32) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values[param_index::WIDTH] = width as f32;
        values[param_index::HEIGHT] = height as f32;
    }

    /// Publish the timestep and pointer snapshot for the next frame.
    ///
    /// Pointers past `MAX_POINTERS` are dropped.
    pub fn begin_frame(&self, dt: f32, pointers: &[Vec2]) {
        let count = pointers.len().min(MAX_POINTERS);
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);

        values[param_index::DT] = dt;
        values[param_index::POINTER_COUNT] = count as f32;
        for (i, pointer) in pointers[..count].iter().enumerate() {
            values[param_index::POINTERS + i * 2] = pointer.x;
            values[param_index::POINTERS + i * 2 + 1] = pointer.y;
        }
    }

    pub fn read(&self) -> FrameInputs {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);

        let count = (values[param_index::POINTER_COUNT].max(0.0) as usize).min(MAX_POINTERS);
        let pointers = (0..count)
            .map(|i| {
                Vec2::new(
                    values[param_index::POINTERS + i * 2],
                    values[param_index::POINTERS + i * 2 + 1],
                )
            })
            .collect();

        FrameInputs {
            dt: values[param_index::DT],
            width: values[param_index::WIDTH] as u32,
            height: values[param_index::HEIGHT] as u32,
            pointers,
        }
    }
}
