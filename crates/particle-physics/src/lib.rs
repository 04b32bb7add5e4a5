//! # Particle Physics
//!
//! The particle record shared by host and compute kernel, its packed layout,
//! initial seeding and a host-side reference of the gravity step.

pub mod constants;
pub mod gravity;
pub mod particle;
pub mod seed;

pub use constants::*;
pub use gravity::*;
pub use particle::*;
pub use seed::*;
