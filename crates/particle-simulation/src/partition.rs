//! Splitting the particle buffer between workers

use std::ops::Range;

/// Half-open range `[start, end)` of particle indices owned by one worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Split `particle_count` particles into `worker_count` contiguous partitions.
///
/// Worker `i` gets `[i * chunk, (i + 1) * chunk)` with
/// `chunk = particle_count / worker_count`; the last worker also takes the
/// `particle_count % worker_count` remainder so every particle is simulated.
pub fn partition(particle_count: usize, worker_count: usize) -> Vec<Partition> {
    if worker_count == 0 {
        return Vec::new();
    }

    let chunk = particle_count / worker_count;
    (0..worker_count)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == worker_count {
                particle_count
            } else {
                start + chunk
            };
            Partition::new(start, end)
        })
        .collect()
}
