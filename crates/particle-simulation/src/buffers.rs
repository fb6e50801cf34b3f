//! Shared simulation memory
//!
//! The particle buffer is split into fixed partitions, one per worker. A
//! partition is claimed through an atomic flag and handed out as an
//! exclusive `&mut [Particle]`; partitions never overlap, so no lock is
//! needed for the particle data itself.

use crate::canvas::{Canvas, CanvasSlot};
use crate::params::FrameParamBuffer;
use crate::partition::{partition, Partition};
use glam::Vec2;
use particle_physics::{Particle, SPAWN_VELOCITY};
use rand::Rng;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ParticleBuffer {
    cells: Box<[UnsafeCell<Particle>]>,
    partitions: Box<[Partition]>,
    claimed: Box<[AtomicBool]>,
}

// SAFETY: particle data is only reached through `PartitionGuard`s. Each guard
// covers one partition, partitions are disjoint (built by `partition()` over
// exactly `cells.len()` particles), and a partition's flag admits a single
// guard at a time.
unsafe impl Sync for ParticleBuffer {}

impl ParticleBuffer {
    /// Take ownership of `particles`, split between `worker_count` partitions.
    ///
    /// A `worker_count` of zero is treated as one, so every particle always
    /// belongs to some partition.
    pub fn new(particles: Vec<Particle>, worker_count: usize) -> Self {
        let partitions: Box<[Partition]> = partition(particles.len(), worker_count.max(1)).into();
        let claimed = partitions.iter().map(|_| AtomicBool::new(false)).collect();

        Self {
            cells: particles.into_iter().map(UnsafeCell::new).collect(),
            partitions,
            claimed,
        }
    }

    /// Spawn `count` particles uniformly over a `width × height` canvas,
    /// each at rest on its own anchor with a random velocity in
    /// `[-SPAWN_VELOCITY, SPAWN_VELOCITY]` per axis.
    ///
    /// `width` and `height` must be non-zero.
    pub fn spawn(
        count: usize,
        width: u32,
        height: u32,
        worker_count: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let (w, h) = (width as f32, height as f32);
        let particles = (0..count)
            .map(|_| {
                let position = Vec2::new(rng.random_range(0.0..w), rng.random_range(0.0..h));
                let velocity = Vec2::new(
                    rng.random_range(-SPAWN_VELOCITY..=SPAWN_VELOCITY),
                    rng.random_range(-SPAWN_VELOCITY..=SPAWN_VELOCITY),
                );
                Particle::spawn(position, velocity)
            })
            .collect();

        Self::new(particles, worker_count)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Exclusive access to partition `index`, or `None` if it is already
    /// claimed or does not exist.
    pub fn claim(&self, index: usize) -> Option<PartitionGuard<'_>> {
        let partition = *self.partitions.get(index)?;
        let claimed = &self.claimed[index];
        claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;

        let cells = &self.cells[partition.range()];
        // SAFETY: the flag above makes this the only live guard for the
        // partition and no other partition overlaps it. `UnsafeCell<T>` has
        // the same layout as `T`.
        let particles = unsafe {
            std::slice::from_raw_parts_mut(UnsafeCell::raw_get(cells.as_ptr()), cells.len())
        };

        Some(PartitionGuard {
            claimed,
            partition,
            particles,
        })
    }

    /// Copy of every particle, or `None` while any partition is claimed
    pub fn snapshot(&self) -> Option<Vec<Particle>> {
        let guards = (0..self.partitions.len())
            .map(|index| self.claim(index))
            .collect::<Option<Vec<_>>>()?;

        let mut particles = Vec::with_capacity(self.len());
        for guard in &guards {
            particles.extend_from_slice(guard);
        }
        Some(particles)
    }
}

pub struct PartitionGuard<'a> {
    claimed: &'a AtomicBool,
    partition: Partition,
    particles: &'a mut [Particle],
}

impl PartitionGuard<'_> {
    pub fn partition(&self) -> Partition {
        self.partition
    }
}

impl Deref for PartitionGuard<'_> {
    type Target = [Particle];

    fn deref(&self) -> &Self::Target {
        self.particles
    }
}

impl DerefMut for PartitionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.particles
    }
}

impl Drop for PartitionGuard<'_> {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
    }
}

/// Everything one configuration's workers share: particles, frame
/// parameters and the canvas pair.
///
/// A resize builds a fresh set under a new epoch; workers still finishing a
/// frame on the old set keep it alive until they drop their handle.
pub struct SharedSimulationBuffers {
    epoch: u64,
    particles: ParticleBuffer,
    params: Arc<FrameParamBuffer>,
    canvases: [Canvas; 2],
}

impl SharedSimulationBuffers {
    pub fn new(
        epoch: u64,
        particles: ParticleBuffer,
        params: Arc<FrameParamBuffer>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            epoch,
            particles,
            params,
            canvases: [Canvas::new(width, height), Canvas::new(width, height)],
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn particles(&self) -> &ParticleBuffer {
        &self.particles
    }

    pub fn params(&self) -> &FrameParamBuffer {
        &self.params
    }

    pub fn canvas(&self, slot: CanvasSlot) -> &Canvas {
        &self.canvases[slot.index()]
    }
}
