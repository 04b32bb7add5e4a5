//! Initial particle distribution

use crate::constants::{SEED_MASS_MAX, SEED_MASS_MIN};
use crate::particle::Particle;
use glam::Vec2;
use rand::Rng;

/// Seed `count` particles at rest, uniformly spread over
/// `[0, width) × [0, height)` with mass in `[SEED_MASS_MIN, SEED_MASS_MAX)`.
///
/// A degenerate canvas (minimised window) is treated as one pixel wide/high.
pub fn seed_particles<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    width: f32,
    height: f32,
) -> Vec<Particle> {
    let width = width.max(1.0);
    let height = height.max(1.0);

    (0..count)
        .map(|_| {
            let position = Vec2::new(rng.random_range(0.0..width), rng.random_range(0.0..height));
            let mass = rng.random_range(SEED_MASS_MIN..SEED_MASS_MAX);
            Particle::at_rest(position, mass)
        })
        .collect()
}

/// Same as [`seed_particles`] using the thread-local generator.
pub fn seed_particles_random(count: usize, width: f32, height: f32) -> Vec<Particle> {
    seed_particles(&mut rand::rng(), count, width, height)
}
