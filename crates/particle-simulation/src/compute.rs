//! Compute stage: one dispatch advances every particle by one step

use crate::{DeviceBufferSet, KernelSource, SimulationError};
use particle_physics::WORKGROUP_SIZE;

/// Number of workgroups needed to give every particle one work-item.
pub fn workgroup_count(particle_count: u32) -> u32 {
    particle_count.div_ceil(WORKGROUP_SIZE)
}

pub struct ComputeStage {
    pipeline: wgpu::ComputePipeline,
    label: String,
}

impl ComputeStage {
    /// Compile `kernel` against the buffer set's binding layout.
    ///
    /// Shader compilation and layout validation failures are captured and
    /// returned as `PipelineCreation` instead of reaching the uncaptured
    /// error handler.
    pub fn new(
        device: &wgpu::Device,
        buffers: &DeviceBufferSet,
        kernel: &KernelSource,
    ) -> Result<Self, SimulationError> {
        let label = kernel.label.to_string();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label.as_str()),
            source: wgpu::ShaderSource::Wgsl(kernel.assemble().into()),
        });

        log::debug!("Creating compute pipeline layout...");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[buffers.bind_group_layout()],
            push_constant_ranges: &[],
        });

        log::debug!("Creating compute pipeline...");
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label.as_str()),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(kernel.entry_point.as_ref()),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(SimulationError::PipelineCreation {
                label,
                message: error.to_string(),
            });
        }

        log::info!("✓ Compute pipeline '{label}' created");

        Ok(Self { pipeline, label })
    }

    /// Record a single dispatch covering `buffers.particle_count()` work-items.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, buffers: &DeviceBufferSet) {
        let workgroups = workgroup_count(buffers.particle_count());

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label.as_str()),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, buffers.bind_group(), &[]);
        compute_pass.dispatch_workgroups(workgroups, 1, 1);
    }
}
