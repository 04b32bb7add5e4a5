//! Compute kernel sources
//!
//! Kernel files only contain bindings and entry points. The record layouts
//! and the workgroup size are prepended from their Rust definitions, so a
//! field added on the host side cannot silently drift from the WGSL side.

use crate::{SimParams, SimulationError};
use particle_physics::{Particle, WORKGROUP_SIZE};
use std::borrow::Cow;
use std::path::Path;

/// Kernel body plus the entry point the pipeline is built from.
#[derive(Clone, Debug)]
pub struct KernelSource {
    pub label: Cow<'static, str>,
    pub body: Cow<'static, str>,
    pub entry_point: Cow<'static, str>,
}

impl KernelSource {
    pub fn new(label: impl Into<Cow<'static, str>>, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
            entry_point: Cow::Borrowed("main"),
        }
    }

    /// All-pairs softened gravity with a semi-implicit Euler step.
    pub fn gravity() -> Self {
        Self::new("Gravity Kernel", include_str!("shaders/gravity.wgsl"))
    }

    /// Load a kernel body from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|source| SimulationError::KernelLoad {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded kernel source from {}", path.display());

        Ok(Self::new(path.display().to_string(), body))
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<Cow<'static, str>>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Full WGSL module: shared prelude followed by the kernel body.
    pub fn assemble(&self) -> String {
        format!(
            "const WORKGROUP_SIZE: u32 = {WORKGROUP_SIZE}u;\n\n{}\n{}\n{}",
            Particle::WGSL_STRUCT,
            SimParams::WGSL_STRUCT,
            self.body
        )
    }
}
