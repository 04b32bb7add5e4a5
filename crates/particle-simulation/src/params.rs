//! Kernel parameters and host-side run configuration

use crate::kernel::KernelSource;
use bytemuck::{Pod, Zeroable};
use particle_physics::{GRAVITY, MIN_SOFTENING, SOFTENING, TIME_STEP};
use std::time::Duration;

/// Uniform block bound at binding 2 of the compute stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    /// Number of live records; work-items at or past this index do nothing
    pub particle_count: u32,
    pub dt: f32,
    pub gravity: f32,
    pub softening: f32,
}

impl SimParams {
    pub const WGSL_STRUCT: &'static str = "\
struct SimParams {
    particle_count: u32,
    dt: f32,
    gravity: f32,
    softening: f32,
}
";

    /// Same parameters with gravity switched off
    pub fn without_gravity(self) -> Self {
        Self {
            gravity: 0.0,
            ..self
        }
    }

    /// The values actually uploaded for a buffer set of `particle_count` records.
    ///
    /// `softening` is raised to [`MIN_SOFTENING`]; NaN also maps there.
    pub fn effective(self, particle_count: u32) -> Self {
        Self {
            particle_count,
            softening: self.softening.max(MIN_SOFTENING),
            ..self
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            particle_count: 0, // filled in by the simulation
            dt: TIME_STEP,
            gravity: GRAVITY,
            softening: SOFTENING,
        }
    }
}

/// Host-side settings fixed for the lifetime of a simulation.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub particle_count: usize,
    pub params: SimParams,
    pub kernel: KernelSource,
    /// Upper bound on the staging-map wait; `None` waits indefinitely
    pub readback_timeout: Option<Duration>,
}

impl SimulationConfig {
    pub fn new(particle_count: usize) -> Self {
        Self {
            particle_count,
            params: SimParams::default(),
            kernel: KernelSource::gravity(),
            readback_timeout: None,
        }
    }

    pub fn with_params(mut self, params: SimParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelSource) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_readback_timeout(mut self, timeout: Duration) -> Self {
        self.readback_timeout = Some(timeout);
        self
    }
}
