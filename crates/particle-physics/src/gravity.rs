//! Host-side gravity step
//!
//! NOTE: This mirrors the compute kernel for documentation and testing.
//! The actual simulation runs on the GPU.

use crate::particle::Particle;
use glam::Vec2;

/// Acceleration on `particles[index]` from every other particle.
///
/// a_i = Σ G · m_j · r_ij / (|r_ij|² + ε²)^(3/2)
pub fn gravitational_acceleration(
    particles: &[Particle],
    index: usize,
    gravity: f32,
    softening: f32,
) -> Vec2 {
    let own = particles[index].position();
    let softening_sq = softening * softening;

    particles
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .fold(Vec2::ZERO, |acc, (_, other)| {
            let r = other.position() - own;
            let dist_sq = r.length_squared() + softening_sq;
            let inv_dist = dist_sq.sqrt().recip();
            acc + r * (gravity * other.mass * inv_dist * inv_dist * inv_dist)
        })
}

/// Advance every particle by one semi-implicit Euler step.
///
/// Velocity is updated first and the new velocity moves the position.
/// Mass and padding are carried through untouched.
pub fn reference_step(particles: &[Particle], dt: f32, gravity: f32, softening: f32) -> Vec<Particle> {
    (0..particles.len())
        .map(|i| {
            let p = particles[i];
            let acceleration = gravitational_acceleration(particles, i, gravity, softening);
            let velocity = p.velocity() + acceleration * dt;
            let position = p.position() + velocity * dt;
            Particle {
                position: position.to_array(),
                velocity: velocity.to_array(),
                ..p
            }
        })
        .collect()
}
