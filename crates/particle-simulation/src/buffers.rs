//! Device-resident particle buffers and the binding that exposes them to the kernel
//!
//! Three buffers of identical size `N * PARTICLE_STRIDE`:
//! - `input`: read-only to the kernel; seeded once, then refilled by copy-back
//! - `output`: written by the kernel, only read by copies
//! - `staging`: host-mappable copy of `output`, the only buffer the host reads

use crate::{SimParams, SimulationError};
use particle_physics::{Particle, ParticleBuffer, PARTICLE_STRIDE, WORKGROUP_SIZE};
use std::sync::mpsc;
use std::time::Duration;
use wgpu::util::DeviceExt;

/// Largest particle count `limits` can hold in one binding and dispatch in one pass.
pub fn max_particle_count(limits: &wgpu::Limits) -> usize {
    let stride = PARTICLE_STRIDE as u64;
    let by_binding = limits.max_storage_buffer_binding_size as u64 / stride;
    let by_buffer = limits.max_buffer_size / stride;
    let by_dispatch =
        limits.max_compute_workgroups_per_dimension as u64 * u64::from(WORKGROUP_SIZE);

    by_binding.min(by_buffer).min(by_dispatch).min(u64::from(u32::MAX)) as usize
}

pub struct DeviceBufferSet {
    input: wgpu::Buffer,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
    params: wgpu::Buffer,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,

    particle_count: u32,
    byte_size: u64,
}

impl DeviceBufferSet {
    /// Allocate all buffers for `particle_count` records and build the binding.
    ///
    /// Uploads [`SimParams::effective`] of `params`. Counts beyond
    /// [`max_particle_count`] are rejected before anything is allocated, and
    /// backend rejections are captured instead of reaching the uncaptured
    /// error handler.
    pub fn new(
        device: &wgpu::Device,
        particle_count: usize,
        params: SimParams,
    ) -> Result<Self, SimulationError> {
        if particle_count == 0 {
            return Err(SimulationError::EmptySimulation);
        }

        let max = max_particle_count(&device.limits());
        if particle_count > max {
            return Err(SimulationError::ParticleCountTooLarge {
                requested: particle_count,
                max,
            });
        }

        let byte_size = (particle_count * PARTICLE_STRIDE) as u64;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let input = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Input Buffer"),
            size: byte_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let output = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Output Buffer"),
            size: byte_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Staging Buffer"),
            size: byte_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = params.effective(particle_count as u32);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // Binding 0 is read-only at the layout level, so the kernel cannot
        // write `input` even by mistake.
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(byte_size),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(byte_size),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<SimParams>() as u64
                        ),
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(SimulationError::BufferAllocation {
                message: error.to_string(),
            });
        }

        log::info!(
            "Buffers created ({} particles × {} bytes = {} bytes each)",
            particle_count,
            PARTICLE_STRIDE,
            byte_size
        );

        Ok(Self {
            input,
            output,
            staging,
            params: params_buffer,
            bind_group_layout,
            bind_group,
            particle_count: particle_count as u32,
            byte_size,
        })
    }

    /// Upload the initial state into `input`. Called once, before the first dispatch.
    pub fn write_seed(&self, queue: &wgpu::Queue, seed: &[Particle]) -> Result<(), SimulationError> {
        if seed.len() != self.particle_count as usize {
            return Err(SimulationError::SeedSizeMismatch {
                expected: self.particle_count as usize,
                actual: seed.len(),
            });
        }

        queue.write_buffer(&self.input, 0, bytemuck::cast_slice(seed));
        Ok(())
    }

    /// Overwrite the kernel parameters and return the values actually uploaded.
    pub fn write_params(&self, queue: &wgpu::Queue, params: &SimParams) -> SimParams {
        let params = params.effective(self.particle_count);
        queue.write_buffer(&self.params, 0, bytemuck::cast_slice(&[params]));
        params
    }

    /// Record `output → staging` and `output → input`.
    ///
    /// The second copy is the state swap: next frame's input is this frame's
    /// output. Both only read `output`, so their relative order is irrelevant;
    /// they must just follow the dispatch on the same encoder.
    pub fn record_copy_back(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(&self.output, 0, &self.staging, 0, self.byte_size);
        encoder.copy_buffer_to_buffer(&self.output, 0, &self.input, 0, self.byte_size);
    }

    /// Map `staging` for reading and block until the device resolves the request.
    ///
    /// Taking `&mut self` means at most one mapping exists at a time, and the
    /// returned guard unmaps on drop, so the next map always follows an unmap.
    pub fn map_staging(
        &mut self,
        device: &wgpu::Device,
        timeout: Option<Duration>,
    ) -> Result<MappedStaging<'_>, SimulationError> {
        let slice = self.staging.slice(..self.byte_size);

        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });

        match device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout,
        }) {
            Ok(_) => {}
            Err(wgpu::PollError::Timeout) => {
                // Cancel the pending request so the buffer is not left half-mapped.
                self.staging.unmap();
                return Err(SimulationError::ReadbackTimeout(timeout.unwrap_or_default()));
            }
            Err(err) => {
                self.staging.unmap();
                return Err(err.into());
            }
        }

        match receiver.recv() {
            Ok(Ok(())) => Ok(MappedStaging {
                buffer: &self.staging,
                byte_size: self.byte_size,
            }),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(SimulationError::MapAbandoned),
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn input(&self) -> &wgpu::Buffer {
        &self.input
    }

    pub fn output(&self) -> &wgpu::Buffer {
        &self.output
    }

    pub fn staging(&self) -> &wgpu::Buffer {
        &self.staging
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Size of each particle buffer in bytes (`N * PARTICLE_STRIDE`)
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

/// Host-visible view of the staging buffer.
///
/// Only obtainable once the map request has resolved. Dropping it unmaps
/// the buffer; decoded snapshots are copies and stay valid afterwards.
pub struct MappedStaging<'a> {
    buffer: &'a wgpu::Buffer,
    byte_size: u64,
}

impl MappedStaging<'_> {
    pub fn decode(&self) -> Result<ParticleBuffer, SimulationError> {
        let view = self.buffer.slice(..self.byte_size).get_mapped_range();
        let snapshot = ParticleBuffer::from_bytes(&view)?;
        Ok(snapshot)
    }
}

impl Drop for MappedStaging<'_> {
    fn drop(&mut self) {
        self.buffer.unmap();
    }
}
