//! Worker threads
//!
//! Each worker owns one partition of the particle buffer and sits on a
//! channel waiting for messages from the coordinator. A step integrates the
//! partition, paints it into the frame's canvas and reports to the barrier.

use crate::barrier::{FrameBarrier, StepTicket};
use crate::buffers::{ParticleBuffer, PartitionGuard, SharedSimulationBuffers};
use crate::canvas::CanvasSlot;
use crossbeam::channel::{unbounded, Receiver, Sender};
use particle_physics::{Integrator, PARTICLE_COLOR};
use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub enum WorkerMessage {
    /// Adopt a new configuration
    Setup(WorkerSetup),
    /// Simulate one frame
    Step(StepTicket),
    Shutdown,
}

/// What a worker needs to know about the current configuration
#[derive(Clone)]
pub struct WorkerSetup {
    pub buffers: Arc<SharedSimulationBuffers>,
    pub partition_index: usize,
}

pub struct Worker {
    id: usize,
    barrier: Arc<FrameBarrier>,
    setup: Option<WorkerSetup>,
    integrator: Integrator,
    active_slot: CanvasSlot,
}

impl Worker {
    pub fn new(id: usize, barrier: Arc<FrameBarrier>) -> Self {
        Self {
            id,
            barrier,
            setup: None,
            integrator: Integrator::new(),
            active_slot: CanvasSlot::A,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Canvas the last step painted into
    pub fn active_slot(&self) -> CanvasSlot {
        self.active_slot
    }

    pub fn handle(&mut self, message: WorkerMessage) -> ControlFlow<()> {
        match message {
            WorkerMessage::Setup(setup) => {
                log::trace!(
                    "worker {} adopting epoch {} partition {}",
                    self.id,
                    setup.buffers.epoch(),
                    setup.partition_index
                );
                self.setup = Some(setup);
            }
            WorkerMessage::Step(step) => self.on_step(&step),
            WorkerMessage::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Simulate the partition for `step`, then report completion.
    ///
    /// Completion is reported exactly once per step, whether or not the
    /// step still belongs to the current configuration.
    pub fn on_step(&mut self, step: &StepTicket) {
        let Some(setup) = self.setup.clone() else {
            log::error!("worker {} got frame {} before any setup", self.id, step.frame);
            self.barrier.abandon(step);
            return;
        };

        if setup.buffers.epoch() == step.epoch {
            self.simulate(step, &setup);
        } else {
            log::trace!(
                "worker {} skipping frame {} from epoch {} (now {})",
                self.id,
                step.frame,
                step.epoch,
                setup.buffers.epoch()
            );
        }

        self.barrier.complete(step, &setup.buffers);
    }

    fn simulate(&mut self, step: &StepTicket, setup: &WorkerSetup) {
        let buffers = &setup.buffers;
        let inputs = buffers.params().read();
        self.active_slot = step.slot();
        let canvas = buffers.canvas(self.active_slot);

        let Some(mut particles) = claim_partition(buffers.particles(), setup.partition_index)
        else {
            log::error!(
                "worker {} has no partition {}",
                self.id,
                setup.partition_index
            );
            return;
        };

        for particle in particles.iter_mut() {
            self.integrator.advance(particle, inputs.dt, &inputs.pointers);
            if let Some((x, y)) = particle.pixel(inputs.width, inputs.height) {
                canvas.paint(inputs.width, inputs.height, x, y, PARTICLE_COLOR);
            }
        }

        log::trace!(
            "worker {} stepped {} particles for frame {}",
            self.id,
            particles.len(),
            step.frame
        );
    }

    /// Run the worker on its own named thread until it receives
    /// [`WorkerMessage::Shutdown`] or the sender goes away.
    pub fn spawn(mut self) -> io::Result<WorkerHandle> {
        let (sender, receiver): (Sender<WorkerMessage>, Receiver<WorkerMessage>) = unbounded();
        let id = self.id;

        let thread = thread::Builder::new()
            .name(format!("particle-worker-{id}"))
            .spawn(move || {
                for message in receiver.iter() {
                    if self.handle(message).is_break() {
                        break;
                    }
                }
                log::trace!("worker {} exiting", self.id);
            })?;

        Ok(WorkerHandle {
            id,
            sender,
            thread: Some(thread),
        })
    }
}

/// The only other holder of a partition claim is a particle snapshot, which
/// lets go immediately.
fn claim_partition(particles: &ParticleBuffer, index: usize) -> Option<PartitionGuard<'_>> {
    if index >= particles.partitions().len() {
        return None;
    }
    loop {
        if let Some(guard) = particles.claim(index) {
            return Some(guard);
        }
        thread::yield_now();
    }
}

/// Coordinator-side end of a worker thread; joins the thread on drop
pub struct WorkerHandle {
    id: usize,
    sender: Sender<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns `false` if the worker thread is gone.
    pub fn send(&self, message: WorkerMessage) -> bool {
        if self.sender.send(message).is_err() {
            log::error!("worker {} channel is closed", self.id);
            return false;
        }
        true
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("worker {} panicked", self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::BarrierState;
    use crate::canvas::CanvasSnapshot;
    use crate::params::FrameParamBuffer;
    use crate::surface::PresentationSurface;
    use crossbeam::channel::bounded;
    use glam::Vec2;
    use particle_physics::Particle;
    use std::time::Duration;

    fn setup(particles: Vec<Particle>, workers: usize) -> WorkerSetup {
        let params = Arc::new(FrameParamBuffer::new());
        params.set_dimensions(8, 8);
        params.begin_frame(0.0, &[]);
        WorkerSetup {
            buffers: Arc::new(SharedSimulationBuffers::new(
                1,
                ParticleBuffer::new(particles, workers),
                params,
                8,
                8,
            )),
            partition_index: 0,
        }
    }

    fn ticket(barrier: &FrameBarrier, participants: usize, epoch: u64) -> StepTicket {
        StepTicket {
            ticket: barrier.try_begin(participants).unwrap(),
            epoch,
            frame: barrier.frames_completed(),
        }
    }

    #[test]
    fn test_step_paints_and_presents() {
        let (sender, receiver) = bounded::<CanvasSnapshot>(4);
        let barrier = Arc::new(FrameBarrier::new(Arc::new(sender)));
        let mut worker = Worker::new(0, barrier.clone());

        let particles = vec![Particle::spawn(Vec2::new(2.5, 3.5), Vec2::ZERO)];
        worker.handle(WorkerMessage::Setup(setup(particles, 1)));
        let step = ticket(&barrier, 1, 1);
        worker.handle(WorkerMessage::Step(step));

        let snapshot = receiver.try_recv().unwrap();
        assert_eq!(snapshot.frame, 0);
        assert_eq!(snapshot.pixel(2, 3), Some([30, 40, 65, 255]));
        assert_eq!(snapshot.painted_pixels(), 1);
        assert_eq!(worker.active_slot(), CanvasSlot::A);
        assert_eq!(barrier.state(), BarrierState::Idle);
    }

    #[test]
    fn test_off_canvas_particles_are_not_painted() {
        let (sender, receiver) = bounded::<CanvasSnapshot>(4);
        let barrier = Arc::new(FrameBarrier::new(Arc::new(sender)));
        let mut worker = Worker::new(0, barrier.clone());

        let particles = vec![Particle::spawn(Vec2::new(-1.0, 3.0), Vec2::ZERO)];
        worker.handle(WorkerMessage::Setup(setup(particles, 1)));
        worker.handle(WorkerMessage::Step(ticket(&barrier, 1, 1)));

        assert_eq!(receiver.try_recv().unwrap().painted_pixels(), 0);
    }

    #[test]
    fn test_stale_epoch_still_reports() {
        let (sender, receiver) = bounded::<CanvasSnapshot>(4);
        let barrier = Arc::new(FrameBarrier::new(Arc::new(sender)));
        let mut worker = Worker::new(0, barrier.clone());

        let particles = vec![Particle::spawn(Vec2::new(1.0, 1.0), Vec2::ZERO)];
        worker.handle(WorkerMessage::Setup(setup(particles, 1)));
        worker.handle(WorkerMessage::Step(ticket(&barrier, 1, 0)));

        // The frame is released but nothing was painted for it.
        assert_eq!(receiver.try_recv().unwrap().painted_pixels(), 0);
        assert_eq!(barrier.frames_completed(), 1);
    }

    #[test]
    fn test_step_without_setup_still_reports() {
        let (sender, receiver) = bounded::<CanvasSnapshot>(4);
        let barrier = Arc::new(FrameBarrier::new(Arc::new(sender)));
        let mut worker = Worker::new(0, barrier.clone());

        assert!(worker
            .handle(WorkerMessage::Step(ticket(&barrier, 1, 0)))
            .is_continue());

        // Released and reopened, with nothing to present.
        assert_eq!(barrier.state(), BarrierState::Idle);
        assert_eq!(barrier.frames_completed(), 1);
        assert!(receiver.try_recv().is_err());
        assert!(barrier.try_begin(1).is_some());
    }

    #[test]
    fn test_shutdown_breaks() {
        let surface: Arc<dyn PresentationSurface> = Arc::new(bounded::<CanvasSnapshot>(1).0);
        let mut worker = Worker::new(3, Arc::new(FrameBarrier::new(surface)));
        assert!(worker.handle(WorkerMessage::Shutdown).is_break());
        assert_eq!(worker.id(), 3);
    }

    #[test]
    fn test_spawned_worker_runs_and_joins() {
        let (sender, receiver) = bounded::<CanvasSnapshot>(4);
        let barrier = Arc::new(FrameBarrier::new(Arc::new(sender)));
        let handle = Worker::new(0, barrier.clone()).spawn().unwrap();

        let particles = vec![Particle::spawn(Vec2::new(4.0, 4.0), Vec2::ZERO)];
        assert!(handle.send(WorkerMessage::Setup(setup(particles, 1))));
        assert!(handle.send(WorkerMessage::Step(ticket(&barrier, 1, 1))));

        let snapshot = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(snapshot.pixel(4, 4), Some([30, 40, 65, 255]));
        drop(handle);
    }
}
