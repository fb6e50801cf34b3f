//! # Particle Simulation Engine
//!
//! CPU simulation split across a fixed pool of worker threads. Each frame the
//! [`FrameCoordinator`] fans a step out to every [`Worker`], the workers
//! integrate their partition of the shared particle buffer and paint into the
//! active [`Canvas`], and the last worker to finish releases the
//! [`FrameBarrier`], which hands the finished canvas to the
//! [`PresentationSurface`].

pub mod barrier;
pub mod buffers;
pub mod canvas;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod input;
pub mod params;
pub mod partition;
pub mod surface;
pub mod worker;

pub use barrier::*;
pub use buffers::*;
pub use canvas::*;
pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use input::*;
pub use params::*;
pub use partition::*;
pub use surface::*;
pub use worker::*;
