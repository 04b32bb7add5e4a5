//! Particle rendering system
//!
//! Draws each particle as a filled circle on a cleared background. Geometry
//! is rebuilt on the CPU from the frame's snapshot, two triangles per
//! particle, in canvas pixel coordinates (origin top-left, y down).

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use particle_physics::{Particle, RADIUS_PER_MASS};

/// Quad corners in local space, two counter-clockwise triangles.
const QUAD_CORNERS: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CircleVertex {
    /// Normalised device coordinates
    pub position: [f32; 2],
    /// Position inside the circle's bounding quad, [-1, 1] on both axes
    pub local: [f32; 2],
}

impl CircleVertex {
    pub const fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: &[wgpu::VertexAttribute] = &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
        ];

        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CircleVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRIBUTES,
        }
    }
}

/// Fill colour uniform
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CircleUniform {
    fill: [f32; 4],
}

/// Colours and sizing for the 2D view
#[derive(Clone, Copy, Debug)]
pub struct CircleStyle {
    pub background: wgpu::Color,
    pub fill: [f32; 4],
    /// Circle radius in pixels per unit of mass
    pub radius_per_mass: f32,
}

impl Default for CircleStyle {
    fn default() -> Self {
        Self {
            // Yellow canvas, black bodies
            background: wgpu::Color {
                r: 1.0,
                g: 1.0,
                b: 0.0,
                a: 1.0,
            },
            fill: [0.0, 0.0, 0.0, 1.0],
            radius_per_mass: RADIUS_PER_MASS,
        }
    }
}

/// Build the triangle list for `particles` on a canvas of `canvas_size` pixels.
pub fn circle_vertices(
    particles: &[Particle],
    canvas_size: Vec2,
    radius_per_mass: f32,
) -> Vec<CircleVertex> {
    let canvas_size = canvas_size.max(Vec2::ONE);
    let mut vertices = Vec::with_capacity(particles.len() * QUAD_CORNERS.len());

    for particle in particles {
        let center = particle.position();
        let radius = radius_per_mass * particle.mass;

        for corner in QUAD_CORNERS {
            let local = Vec2::from_array(corner);
            let pixel = center + local * radius;
            let ndc = Vec2::new(
                pixel.x / canvas_size.x * 2.0 - 1.0,
                1.0 - pixel.y / canvas_size.y * 2.0,
            );
            vertices.push(CircleVertex {
                position: ndc.to_array(),
                local: corner,
            });
        }
    }

    vertices
}

pub struct ParticleRenderer {
    render_pipeline: wgpu::RenderPipeline,
    style_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    style: CircleStyle,
}

impl ParticleRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, style: CircleStyle) -> Self {
        let style_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Circle Style Buffer"),
            size: std::mem::size_of::<CircleUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Circle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/circle.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Circle Bind Group Layout"),
            entries: &[
                // Style (Uniform) - Binding 0
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Circle Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: style_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Circle Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Circle Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vertex"),
                buffers: &[CircleVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fragment"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertex_capacity = QUAD_CORNERS.len();
        let vertex_buffer = Self::create_vertex_buffer(device, vertex_capacity);

        log::info!("✓ Circle renderer initialized ({format:?})");

        Self {
            render_pipeline,
            style_buffer,
            bind_group,
            vertex_buffer,
            vertex_capacity,
            style,
        }
    }

    fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Circle Vertex Buffer"),
            size: (capacity * std::mem::size_of::<CircleVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Clear `view` to the background colour and draw one circle per particle.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        canvas_size: Vec2,
        particles: &[Particle],
    ) {
        let vertices = circle_vertices(particles, canvas_size, self.style.radius_per_mass);

        if vertices.len() > self.vertex_capacity {
            self.vertex_capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = Self::create_vertex_buffer(device, self.vertex_capacity);
            log::debug!("Circle vertex buffer grown to {} vertices", self.vertex_capacity);
        }

        queue.write_buffer(
            &self.style_buffer,
            0,
            bytemuck::cast_slice(&[CircleUniform {
                fill: self.style.fill,
            }]),
        );
        if !vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.style.background),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(0..vertices.len() as u32, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }
}
