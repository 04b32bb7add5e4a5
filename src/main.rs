//! GPU Particle Simulation
//!
//! A few point masses attract each other in a compute shader; every frame the
//! state is read back to the host and drawn as circles.

use anyhow::{anyhow, Result};
use glam::Vec2;
use particle_physics::seed_particles_random;
use particle_renderer::{CircleStyle, ParticleRenderer};
use particle_simulation::{GpuContext, ParticleSimulation, SimulationConfig, SimulationError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const PARTICLE_COUNT: usize = 2;
const FRAME_TIME_WINDOW: usize = 60;

/// Why a frame could not be shown
enum FrameError {
    Surface(wgpu::SurfaceError),
    Simulation(SimulationError),
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    context: GpuContext,
    config: wgpu::SurfaceConfiguration,

    simulation: ParticleSimulation,
    renderer: ParticleRenderer,

    frame_times: VecDeque<f32>,
    last_frame_time: Instant,
}

impl GpuState {
    async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(SimulationError::from)?;

        let context = GpuContext::from_adapter(&adapter).await?;

        // Configure surface
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);

        // Seed across the canvas as it is right now; later resizes keep the bodies where they are.
        let particles =
            seed_particles_random(PARTICLE_COUNT, size.width as f32, size.height as f32);
        log::info!(
            "  Particle struct size: {} bytes",
            std::mem::size_of::<particle_physics::Particle>()
        );
        for (i, p) in particles.iter().enumerate() {
            log::info!(
                "    [{}] pos=({:.1}, {:.1}), mass={:.3}",
                i,
                p.position[0],
                p.position[1],
                p.mass
            );
        }

        let simulation = ParticleSimulation::new(
            context.clone(),
            SimulationConfig::new(PARTICLE_COUNT),
            &particles,
        )?;
        log::info!("✓ Simulation initialized");

        let renderer = ParticleRenderer::new(&context.device, config.format, CircleStyle::default());

        Ok(Self {
            surface,
            context,
            config,
            simulation,
            renderer,
            frame_times: VecDeque::with_capacity(FRAME_TIME_WINDOW),
            last_frame_time: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.context.device, &self.config);
        }
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.context.device, &self.config);
    }

    /// Step the simulation once and draw the result. Returns (fps, avg frame ms).
    fn render(&mut self) -> Result<(f32, f32), FrameError> {
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32() * 1000.0;
        self.last_frame_time = now;

        if self.frame_times.len() == FRAME_TIME_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        let fps = if avg_frame_time > 0.0 {
            1000.0 / avg_frame_time
        } else {
            0.0
        };

        let output = self
            .surface
            .get_current_texture()
            .map_err(FrameError::Surface)?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let canvas_size = Vec2::new(self.config.width as f32, self.config.height as f32);
        let device = &self.context.device;
        let queue = &self.context.queue;
        let renderer = &mut self.renderer;

        self.simulation
            .run_frame(|particles| renderer.render(device, queue, &view, canvas_size, particles))
            .map_err(FrameError::Simulation)?;

        output.present();
        Ok((fps, avg_frame_time))
    }
}

#[derive(Default)]
struct App {
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("Fatal: {error:#}");
        self.fatal = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Particle Simulation")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuState::new(window.clone())) {
            Ok(gpu_state) => {
                self.gpu_state = Some(gpu_state);
                window.request_redraw();
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::RedrawRequested => {
                let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) else {
                    return;
                };

                match gpu_state.render() {
                    Ok((fps, frame_time)) => {
                        window.set_title(&format!(
                            "Particle Simulation - {:.0} FPS ({:.2}ms) - {} particles",
                            fps,
                            frame_time,
                            gpu_state.simulation.particle_count()
                        ));
                        // Schedule the next frame.
                        window.request_redraw();
                    }
                    Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                        gpu_state.reconfigure();
                        window.request_redraw();
                    }
                    Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                        self.fail(event_loop, anyhow!("surface out of memory"));
                    }
                    Err(FrameError::Surface(err)) => {
                        log::warn!("Surface error: {err:?}");
                        window.request_redraw();
                    }
                    Err(FrameError::Simulation(err)) => {
                        self.fail(event_loop, err.into());
                    }
                }
            }

            _ => {}
        }
    }
}

fn main() -> Result<()> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting GPU particle simulation...");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
