//! Error types for the simulation engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the engine needs at least one worker")]
    NoWorkers,

    #[error("canvas dimensions must be non-zero, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("failed to spawn worker thread: {0}")]
    SpawnWorker(#[from] std::io::Error),
}
