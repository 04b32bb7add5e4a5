use particle_physics::LayoutError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the simulation. All of them are fatal: a failed frame
/// would desynchronise the input/output feedback loop, so nothing retries.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no compatible GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create logical device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to load kernel source from {path}: {source}")]
    KernelLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compute pipeline '{label}' rejected by the backend: {message}")]
    PipelineCreation { label: String, message: String },

    #[error("particle count must be at least 1")]
    EmptySimulation,

    #[error("{requested} particles exceed the device limit of {max}")]
    ParticleCountTooLarge { requested: usize, max: usize },

    #[error("particle buffers rejected by the backend: {message}")]
    BufferAllocation { message: String },

    #[error("seed holds {actual} particles but the buffers were sized for {expected}")]
    SeedSizeMismatch { expected: usize, actual: usize },

    #[error("staging buffer could not be mapped: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("staging buffer mapping was dropped before it resolved")]
    MapAbandoned,

    #[error("staging buffer was not mapped within {0:?}")]
    ReadbackTimeout(Duration),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("GPU device lost: {reason}")]
    DeviceLost { reason: String },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
