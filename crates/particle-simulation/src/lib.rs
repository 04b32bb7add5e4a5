//! # Particle Simulation Engine
//!
//! GPU particle simulation with a once-per-frame readback of the full state.

pub mod buffers;
pub mod compute;
pub mod context;
pub mod error;
pub mod kernel;
pub mod params;
pub mod simulation;

#[cfg(test)]
mod test_support;

pub use buffers::*;
pub use compute::*;
pub use context::*;
pub use error::*;
pub use kernel::*;
pub use params::*;
pub use simulation::*;
