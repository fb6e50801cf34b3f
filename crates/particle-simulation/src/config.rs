//! Engine configuration

use std::num::NonZeroUsize;

/// Settings fixed for the lifetime of a [`crate::FrameCoordinator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of worker threads; defaults to the hardware concurrency
    pub worker_count: usize,
    /// Seed for particle spawning. `None` draws a fresh seed on every configure.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_workers() {
        let config = EngineConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default().with_worker_count(3).with_seed(42);
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.seed, Some(42));
    }
}
