use glam::Vec2;
use particle_physics::Particle;
use particle_simulation::{partition, ParticleBuffer};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]
    #[test]
    fn partitions_tile_the_particle_range(count in 0usize..2_000_000, workers in 1usize..128) {
        let partitions = partition(count, workers);
        prop_assert_eq!(partitions.len(), workers);

        let chunk = count / workers;
        let mut next = 0;
        for (i, p) in partitions.iter().enumerate() {
            prop_assert_eq!(p.start, next);
            prop_assert!(p.start <= p.end);
            if i + 1 < workers {
                prop_assert_eq!(p.len(), chunk);
            } else {
                prop_assert_eq!(p.len(), chunk + count % workers);
            }
            next = p.end;
        }
        prop_assert_eq!(next, count);
    }

    #[test]
    fn every_particle_is_claimable_exactly_once(count in 0usize..500, workers in 1usize..16) {
        let particles = (0..count)
            .map(|i| Particle::spawn(Vec2::new(i as f32, 0.0), Vec2::ZERO))
            .collect();
        let buffer = ParticleBuffer::new(particles, workers);

        let guards = (0..workers)
            .map(|i| buffer.claim(i))
            .collect::<Option<Vec<_>>>();
        prop_assert!(guards.is_some());

        let seen: Vec<f32> = guards
            .unwrap()
            .iter()
            .flat_map(|guard| guard.iter().map(|p| p.x))
            .collect();
        let expected: Vec<f32> = (0..count).map(|i| i as f32).collect();
        prop_assert_eq!(seen, expected);
    }
}

#[test]
fn million_particles_over_eight_workers() {
    let partitions = partition(1_000_000, 8);
    assert!(partitions.iter().all(|p| p.len() == 125_000));
    assert_eq!(partitions.last().map(|p| p.end), Some(1_000_000));
}
