//! # Particle Renderer
//!
//! 2D visualization of the simulation's per-frame particle snapshot.

pub mod renderer;

pub use renderer::*;
