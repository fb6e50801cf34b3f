//! # Particle Renderer
//!
//! Displays finished simulation canvases with wgpu.

pub mod canvas_renderer;

pub use canvas_renderer::*;
