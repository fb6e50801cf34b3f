//! Frame coordinator
//!
//! Owns the worker pool and drives the frame cadence: `configure` lays out
//! particles and canvases, `step` opens the barrier and fans a frame out to
//! every worker. The frame is finished by whichever worker reports last, on
//! its own thread; the coordinator never waits for it.

use crate::barrier::{BarrierState, FrameBarrier, StepTicket};
use crate::buffers::{ParticleBuffer, SharedSimulationBuffers};
use crate::canvas::CanvasSlot;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::input::{PointerEvent, PointerTracker};
use crate::params::FrameParamBuffer;
use crate::partition::Partition;
use crate::surface::PresentationSurface;
use crate::worker::{Worker, WorkerHandle, WorkerMessage, WorkerSetup};
use particle_physics::{Particle, MAX_DT};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Frame `frame` was sent to every worker
    Dispatched { frame: u64 },
    /// The previous frame is still stepping or presenting
    Busy,
    /// `configure` has not succeeded yet
    Unconfigured,
}

pub struct FrameCoordinator {
    config: EngineConfig,
    barrier: Arc<FrameBarrier>,
    workers: Vec<WorkerHandle>,
    params: Arc<FrameParamBuffer>,
    pointers: PointerTracker,
    buffers: Option<Arc<SharedSimulationBuffers>>,
    epoch: u64,
    last_time: Option<f64>,
}

impl FrameCoordinator {
    /// Start `config.worker_count` worker threads presenting to `surface`
    pub fn new(
        config: EngineConfig,
        surface: Arc<dyn PresentationSurface>,
    ) -> Result<Self, EngineError> {
        if config.worker_count == 0 {
            return Err(EngineError::NoWorkers);
        }

        let barrier = Arc::new(FrameBarrier::new(surface));
        let workers = (0..config.worker_count)
            .map(|id| Worker::new(id, barrier.clone()).spawn())
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("started {} simulation workers", workers.len());

        Ok(Self {
            config,
            barrier,
            workers,
            params: Arc::new(FrameParamBuffer::new()),
            pointers: PointerTracker::new(),
            buffers: None,
            epoch: 0,
            last_time: None,
        })
    }

    /// Spawn `particle_count` particles over a fresh `width × height` canvas
    /// pair and hand every worker its partition.
    ///
    /// A frame still in flight is abandoned: it finishes on the old buffers
    /// and is never presented. On error the previous configuration stays
    /// live.
    pub fn configure(
        &mut self,
        particle_count: usize,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            log::warn!("dropping configuration for empty {width}x{height} canvas");
            return Err(EngineError::EmptyCanvas { width, height });
        }

        self.epoch += 1;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.epoch)),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let particles =
            ParticleBuffer::spawn(particle_count, width, height, self.workers.len(), &mut rng);
        self.params.set_dimensions(width, height);
        let buffers = Arc::new(SharedSimulationBuffers::new(
            self.epoch,
            particles,
            self.params.clone(),
            width,
            height,
        ));

        self.barrier.invalidate();
        for (partition_index, worker) in self.workers.iter().enumerate() {
            worker.send(WorkerMessage::Setup(WorkerSetup {
                buffers: buffers.clone(),
                partition_index,
            }));
        }

        self.buffers = Some(buffers);
        // Restart the clock: the first frame on new buffers steps with dt = 0.
        self.last_time = None;

        log::info!(
            "configured {particle_count} particles on {width}x{height} (epoch {})",
            self.epoch
        );
        Ok(())
    }

    /// Dispatch one frame at `current_time` seconds.
    ///
    /// The timestep is the time since the previous dispatched frame, clamped
    /// to `[0, MAX_DT]`; the first frame after a configure uses zero.
    pub fn step(&mut self, current_time: f64) -> StepOutcome {
        let Some(buffers) = self.buffers.as_ref() else {
            return StepOutcome::Unconfigured;
        };

        let Some(ticket) = self.barrier.try_begin(self.workers.len()) else {
            log::warn!(
                "rejecting step: frame {} still {:?}",
                self.barrier.frames_completed(),
                self.barrier.state()
            );
            return StepOutcome::Busy;
        };

        let dt = self
            .last_time
            .map_or(0.0, |last| (current_time - last).max(0.0).min(MAX_DT as f64));
        self.last_time = Some(current_time);
        self.params.begin_frame(dt as f32, &self.pointers.positions());

        let step = StepTicket {
            ticket,
            epoch: buffers.epoch(),
            frame: self.barrier.frames_completed(),
        };

        let delivered = self
            .workers
            .iter()
            .filter(|worker| worker.send(WorkerMessage::Step(step)))
            .count();
        if delivered != self.workers.len() {
            // A dead worker would hold the barrier closed forever.
            self.barrier.invalidate();
            return StepOutcome::Busy;
        }

        log::trace!("dispatched frame {} (dt {dt:.4})", step.frame);
        StepOutcome::Dispatched { frame: step.frame }
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.pointers.apply(event);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn frames_completed(&self) -> u64 {
        self.barrier.frames_completed()
    }

    pub fn active_slot(&self) -> CanvasSlot {
        self.barrier.active_slot()
    }

    pub fn state(&self) -> BarrierState {
        self.barrier.state()
    }

    pub fn is_frame_in_flight(&self) -> bool {
        self.barrier.state() != BarrierState::Idle
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.buffers.as_ref().map(|buffers| {
            let canvas = buffers.canvas(CanvasSlot::A);
            (canvas.width(), canvas.height())
        })
    }

    /// Copy of the particle state, or `None` when unconfigured or while a
    /// frame is in flight
    pub fn particles(&self) -> Option<Vec<Particle>> {
        if self.is_frame_in_flight() {
            return None;
        }
        self.buffers.as_ref()?.particles().snapshot()
    }

    pub fn partitions(&self) -> Vec<Partition> {
        self.buffers
            .as_ref()
            .map(|buffers| buffers.particles().partitions().to_vec())
            .unwrap_or_default()
    }
}

impl Drop for FrameCoordinator {
    fn drop(&mut self) {
        // Queued steps run before the shutdown message is seen.
        for worker in &self.workers {
            worker.send(WorkerMessage::Shutdown);
        }
        self.workers.clear();
        log::debug!("simulation workers joined");
    }
}
