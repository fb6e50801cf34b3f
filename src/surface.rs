//! Presentation surface backed by the window

use crossbeam::channel::Sender;
use particle_simulation::{CanvasSnapshot, PresentationSurface};
use std::sync::Arc;
use winit::window::Window;

/// Queues finished canvases for the render loop and wakes it up.
///
/// Runs on the worker thread that released the frame.
pub struct WindowSurface {
    frames: Sender<CanvasSnapshot>,
    window: Arc<Window>,
}

impl WindowSurface {
    pub fn new(frames: Sender<CanvasSnapshot>, window: Arc<Window>) -> Self {
        Self { frames, window }
    }
}

impl PresentationSurface for WindowSurface {
    fn present(&self, snapshot: CanvasSnapshot) {
        self.frames.present(snapshot);
        self.window.request_redraw();
    }
}
