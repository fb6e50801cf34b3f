//! End-to-end frame cycles through real worker threads.

use crossbeam::channel::{unbounded, Receiver, Sender};
use glam::Vec2;
use particle_physics::{Integrator, Particle};
use particle_simulation::{
    BarrierState, CanvasSnapshot, EngineConfig, FrameCoordinator, PointerEvent,
    PresentationSurface, StepOutcome,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);

fn engine(workers: usize, seed: u64) -> (FrameCoordinator, Receiver<CanvasSnapshot>) {
    let (sender, receiver) = unbounded();
    let config = EngineConfig::default()
        .with_worker_count(workers)
        .with_seed(seed);
    let coordinator = FrameCoordinator::new(config, Arc::new(sender)).unwrap();
    (coordinator, receiver)
}

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn wait_until_idle(coordinator: &FrameCoordinator) {
    wait_for("idle barrier", || !coordinator.is_frame_in_flight());
}

/// Present a frame, then wait for the barrier to reopen
fn run_frame(
    coordinator: &mut FrameCoordinator,
    frames: &Receiver<CanvasSnapshot>,
    time: f64,
) -> CanvasSnapshot {
    assert!(matches!(
        coordinator.step(time),
        StepOutcome::Dispatched { .. }
    ));
    let snapshot = frames.recv_timeout(TIMEOUT).unwrap();
    wait_until_idle(coordinator);
    snapshot
}

fn advanced(particles: &[Particle], dt: f32, pointers: &[Vec2]) -> Vec<Particle> {
    let mut integrator = Integrator::new();
    particles
        .iter()
        .map(|particle| {
            let mut particle = *particle;
            integrator.advance(&mut particle, dt, pointers);
            particle
        })
        .collect()
}

/// Brightness each pixel should have after painting `particles` once
fn expected_pixels(particles: &[Particle], width: u32, height: u32) -> HashMap<(u32, u32), [u8; 4]> {
    let mut hits: HashMap<(u32, u32), u32> = HashMap::new();
    for particle in particles {
        if let Some(pixel) = particle.pixel(width, height) {
            *hits.entry(pixel).or_default() += 1;
        }
    }

    hits.into_iter()
        .map(|(pixel, n)| {
            let channel = |c: u32| (c * n).min(255) as u8;
            (pixel, [channel(30), channel(40), channel(65), 255])
        })
        .collect()
}

fn assert_painted(snapshot: &CanvasSnapshot, particles: &[Particle]) {
    let expected = expected_pixels(particles, snapshot.width, snapshot.height);
    assert_eq!(snapshot.painted_pixels(), expected.len());
    for (&(x, y), rgba) in &expected {
        assert_eq!(snapshot.pixel(x, y).as_ref(), Some(rgba), "pixel ({x}, {y})");
    }
}

#[test]
fn first_frame_after_configure_has_zero_dt() {
    let (mut coordinator, frames) = engine(4, 7);
    coordinator.configure(2_000, 64, 48).unwrap();
    let before = coordinator.particles().unwrap();

    let snapshot = run_frame(&mut coordinator, &frames, 123.0);

    assert_eq!(snapshot.frame, 0);
    assert_eq!((snapshot.width, snapshot.height), (64, 48));
    assert_eq!(coordinator.particles().unwrap(), before);
    assert_painted(&snapshot, &before);
}

#[test]
fn reconfigure_restarts_the_clock() {
    let (mut coordinator, frames) = engine(2, 13);
    coordinator.configure(400, 32, 32).unwrap();
    run_frame(&mut coordinator, &frames, 0.0);
    run_frame(&mut coordinator, &frames, 0.02);

    coordinator.configure(400, 24, 24).unwrap();
    let before = coordinator.particles().unwrap();
    run_frame(&mut coordinator, &frames, 0.05);
    assert_eq!(coordinator.particles().unwrap(), before);

    run_frame(&mut coordinator, &frames, 0.07);
    assert_eq!(
        coordinator.particles().unwrap(),
        advanced(&before, (0.07_f64 - 0.05) as f32, &[])
    );
}

#[test]
fn frames_match_single_threaded_integration() {
    let (mut coordinator, frames) = engine(3, 11);
    coordinator.configure(1_001, 40, 30).unwrap();
    let mut expected = coordinator.particles().unwrap();

    run_frame(&mut coordinator, &frames, 0.0);

    for (i, time) in [0.016, 0.05, 0.3].into_iter().enumerate() {
        // 0.3 - 0.05 exceeds the cap and is clamped.
        let dt = match i {
            0 => 0.016_f64,
            1 => 0.05 - 0.016,
            _ => 0.1,
        };
        expected = advanced(&expected, dt as f32, &[]);

        let snapshot = run_frame(&mut coordinator, &frames, time);
        assert_eq!(snapshot.frame, i as u64 + 1);
        assert_eq!(coordinator.particles().unwrap(), expected);
        assert_painted(&snapshot, &expected);
    }

    assert_eq!(coordinator.frames_completed(), 4);
}

#[test]
fn pressed_pointer_pushes_particles() {
    let (mut coordinator, frames) = engine(2, 5);
    coordinator.configure(500, 32, 32).unwrap();
    run_frame(&mut coordinator, &frames, 0.0);

    let pointer = Vec2::new(16.0, 16.0);
    coordinator.handle_pointer(PointerEvent::Down {
        id: 0,
        x: pointer.x,
        y: pointer.y,
    });

    let before = coordinator.particles().unwrap();
    run_frame(&mut coordinator, &frames, 0.02);
    let after = coordinator.particles().unwrap();
    assert_eq!(after, advanced(&before, 0.02, &[pointer]));

    coordinator.handle_pointer(PointerEvent::Up { id: 0 });
    let before = after;
    run_frame(&mut coordinator, &frames, 0.04);
    assert_eq!(coordinator.particles().unwrap(), advanced(&before, 0.02, &[]));
}

#[test]
fn canvases_alternate_and_come_back_cleared() {
    let (mut coordinator, frames) = engine(4, 3);
    coordinator.configure(300, 16, 16).unwrap();

    for frame in 0..12u64 {
        let snapshot = run_frame(&mut coordinator, &frames, frame as f64 * 0.01);

        assert_eq!(snapshot.frame, frame);
        assert_eq!(coordinator.active_slot().index() as u64, (frame + 1) % 2);
        // Paint left over from two frames ago would show up as extra hits.
        assert_painted(&snapshot, &coordinator.particles().unwrap());
    }
}

#[test]
fn seeded_configuration_is_reproducible() {
    let (mut first, _first_frames) = engine(2, 42);
    let (mut second, _second_frames) = engine(5, 42);
    let (mut other, _other_frames) = engine(2, 43);

    first.configure(1_000, 100, 100).unwrap();
    second.configure(1_000, 100, 100).unwrap();
    other.configure(1_000, 100, 100).unwrap();

    assert_eq!(first.particles(), second.particles());
    assert_ne!(first.particles(), other.particles());
}

/// Blocks inside `present` until the test opens the gate
struct GatedSurface {
    gate: Receiver<()>,
    frames: Sender<CanvasSnapshot>,
}

impl PresentationSurface for GatedSurface {
    fn present(&self, snapshot: CanvasSnapshot) {
        // A closed gate channel means the test is done holding frames.
        let _ = self.gate.recv();
        let _ = self.frames.send(snapshot);
    }
}

fn gated_engine(workers: usize) -> (FrameCoordinator, Sender<()>, Receiver<CanvasSnapshot>) {
    let (gate, gate_receiver) = unbounded();
    let (sender, frames) = unbounded();
    let surface = GatedSurface {
        gate: gate_receiver,
        frames: sender,
    };
    let config = EngineConfig::default().with_worker_count(workers).with_seed(9);
    let coordinator = FrameCoordinator::new(config, Arc::new(surface)).unwrap();
    (coordinator, gate, frames)
}

#[test]
fn step_while_frame_in_flight_is_rejected() {
    let (mut coordinator, gate, frames) = gated_engine(4);
    coordinator.configure(200, 16, 16).unwrap();

    assert_eq!(coordinator.step(0.0), StepOutcome::Dispatched { frame: 0 });
    assert_eq!(coordinator.step(0.01), StepOutcome::Busy);

    wait_for("presenting", || coordinator.state() == BarrierState::Presenting);
    assert_eq!(coordinator.step(0.02), StepOutcome::Busy);
    assert_eq!(coordinator.frames_completed(), 1);

    gate.send(()).unwrap();
    assert_eq!(frames.recv_timeout(TIMEOUT).unwrap().frame, 0);
    wait_until_idle(&coordinator);

    assert_eq!(coordinator.step(0.03), StepOutcome::Dispatched { frame: 1 });
    drop(gate);
    assert_eq!(frames.recv_timeout(TIMEOUT).unwrap().frame, 1);
    wait_until_idle(&coordinator);
    assert_eq!(coordinator.frames_completed(), 2);
}

#[test]
fn reconfigure_abandons_in_flight_frame() {
    let (mut coordinator, gate, frames) = gated_engine(3);
    coordinator.configure(200, 16, 16).unwrap();
    assert_eq!(coordinator.step(0.0), StepOutcome::Dispatched { frame: 0 });
    wait_for("presenting", || coordinator.state() == BarrierState::Presenting);

    coordinator.configure(50, 8, 4).unwrap();
    assert_eq!(coordinator.epoch(), 2);
    assert_eq!(coordinator.state(), BarrierState::Idle);
    assert_eq!(coordinator.dimensions(), Some((8, 4)));

    assert_eq!(coordinator.step(0.0), StepOutcome::Dispatched { frame: 1 });
    drop(gate);

    let mut snapshots = vec![
        frames.recv_timeout(TIMEOUT).unwrap(),
        frames.recv_timeout(TIMEOUT).unwrap(),
    ];
    snapshots.sort_by_key(|snapshot| snapshot.frame);
    assert_eq!((snapshots[0].width, snapshots[0].height), (16, 16));
    assert_eq!((snapshots[1].width, snapshots[1].height), (8, 4));

    wait_until_idle(&coordinator);
    let particles = coordinator.particles().unwrap();
    assert_eq!(particles.len(), 50);
    assert_painted(&snapshots[1], &particles);
}

#[test]
fn dropping_the_coordinator_joins_workers() {
    let (mut coordinator, frames) = engine(8, 1);
    coordinator.configure(10_000, 50, 50).unwrap();
    coordinator.step(0.0);
    drop(coordinator);

    // Every worker finished its step before shutting down.
    assert!(frames.recv_timeout(TIMEOUT).is_ok());
}
