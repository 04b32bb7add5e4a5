//! Frame orchestration: dispatch, copy-back, readback
//!
//! One call to [`ParticleSimulation::step`] is one frame:
//! 1. dispatch the kernel over (`input`, `output`)
//! 2. copy `output → staging`
//! 3. copy `output → input` (state swap for the next frame)
//! 4. submit all three as one command buffer
//! 5. map `staging` and wait for the device
//! 6. decode a host copy of the particles
//! 7. unmap `staging`
//!
//! The next frame cannot start before the previous readback returned, so two
//! dispatches never race on `input`/`output`.

use crate::{ComputeStage, DeviceBufferSet, GpuContext, SimParams, SimulationConfig, SimulationError};
use particle_physics::{Particle, ParticleBuffer};

/// GPU-based particle simulation
pub struct ParticleSimulation {
    context: GpuContext,
    buffers: DeviceBufferSet,
    compute: ComputeStage,
    config: SimulationConfig,
    frame_index: u64,
}

impl ParticleSimulation {
    /// Allocate buffers, build the pipeline and upload `seed` into `input`.
    ///
    /// `seed` must hold exactly `config.particle_count` records.
    pub fn new(
        context: GpuContext,
        mut config: SimulationConfig,
        seed: &[Particle],
    ) -> Result<Self, SimulationError> {
        log::info!("Initializing ParticleSimulation...");
        context.device_lost().check()?;

        let buffers = DeviceBufferSet::new(&context.device, config.particle_count, config.params)?;
        let compute = ComputeStage::new(&context.device, &buffers, &config.kernel)?;
        buffers.write_seed(&context.queue, seed)?;
        config.params = config.params.effective(buffers.particle_count());

        log::info!("✓ Seeded {} particles", seed.len());

        Ok(Self {
            context,
            buffers,
            compute,
            config,
            frame_index: 0,
        })
    }

    /// Advance one frame and return a snapshot of the new state.
    pub fn step(&mut self) -> Result<ParticleBuffer, SimulationError> {
        self.context.device_lost().check()?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Simulation Encoder"),
            });

        self.compute.record(&mut encoder, &self.buffers);
        self.buffers.record_copy_back(&mut encoder);

        self.context.queue.submit(std::iter::once(encoder.finish()));

        // A failed map is usually the visible symptom of a lost device;
        // report the root cause when the device-lost callback has fired.
        let lost = self.context.device_lost();
        let snapshot = {
            let mapped = self
                .buffers
                .map_staging(&self.context.device, self.config.readback_timeout)
                .map_err(|err| lost.check().err().unwrap_or(err))?;
            mapped.decode()?
        };

        self.frame_index += 1;
        log::trace!("frame {} read back {} particles", self.frame_index, snapshot.len());

        Ok(snapshot)
    }

    /// Advance one frame and hand the snapshot to `render`.
    ///
    /// The slice only lives for the duration of the call.
    pub fn run_frame<F>(&mut self, render: F) -> Result<(), SimulationError>
    where
        F: FnOnce(&[Particle]),
    {
        let snapshot = self.step()?;
        render(&snapshot);
        Ok(())
    }

    /// Update kernel parameters for subsequent frames.
    pub fn update_params(&mut self, params: SimParams) {
        self.config.params = self.buffers.write_params(&self.context.queue, &params);
    }

    /// Parameters the kernel currently runs with
    pub fn params(&self) -> &SimParams {
        &self.config.params
    }

    pub fn particle_count(&self) -> u32 {
        self.buffers.particle_count()
    }

    /// Frames completed so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::gpu_context;
    use crate::KernelSource;
    use glam::Vec2;
    use particle_physics::{
        reference_step, seed_particles, GRAVITY, MIN_SOFTENING, SOFTENING, TIME_STEP,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    /// Copies each record and bumps the first padding slot, so every
    /// work-item that ran leaves a mark and repeated frames accumulate.
    const STAMP_KERNEL: &str = "
@group(0) @binding(0) var<storage, read> particles_in: array<Particle>;
@group(0) @binding(1) var<storage, read_write> particles_out: array<Particle>;
@group(0) @binding(2) var<uniform> params: SimParams;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let index = global_id.x;
    if (index >= params.particle_count) {
        return;
    }
    var p = particles_in[index];
    p._pad0 = p._pad0 + 1.0;
    particles_out[index] = p;
}
";

    fn pair() -> Vec<Particle> {
        vec![
            Particle::at_rest(Vec2::new(10.0, 10.0), 1.0),
            Particle::at_rest(Vec2::new(20.0, 20.0), 1.5),
        ]
    }

    #[test]
    fn test_pair_attracts_after_one_frame() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = pair();
        let mut simulation =
            ParticleSimulation::new(context, SimulationConfig::new(seed.len()), &seed).unwrap();

        let snapshot = simulation.step().unwrap();
        assert_eq!(snapshot.len(), 2);

        let v0 = snapshot[0].velocity();
        let v1 = snapshot[1].velocity();
        assert!(v0 != Vec2::ZERO && v1 != Vec2::ZERO);

        // Each velocity points at the other particle.
        let towards_1 = snapshot[1].position() - snapshot[0].position();
        assert!(v0.dot(towards_1) > 0.0);
        assert!(v1.dot(-towards_1) > 0.0);

        assert_eq!(snapshot.total_mass(), 2.5);
        assert_eq!(simulation.frame_index(), 1);
    }

    #[test]
    fn test_gpu_matches_reference_step() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = seed_particles(&mut StdRng::seed_from_u64(3), 100, 640.0, 480.0);
        let mut simulation =
            ParticleSimulation::new(context, SimulationConfig::new(seed.len()), &seed).unwrap();

        let gpu = simulation.step().unwrap();
        let cpu = reference_step(&seed, TIME_STEP, GRAVITY, SOFTENING);

        for (g, c) in gpu.iter().zip(&cpu) {
            assert!((g.velocity() - c.velocity()).length() <= 1e-3 * c.velocity().length().max(1.0));
            assert!((g.position() - c.position()).length() <= 1e-3);
            assert_eq!(g.mass, c.mass);
        }
    }

    #[test]
    fn test_zero_gravity_keeps_positions() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = seed_particles(&mut StdRng::seed_from_u64(11), 37, 800.0, 600.0);
        let config = SimulationConfig::new(seed.len())
            .with_params(SimParams::default().without_gravity());
        let mut simulation = ParticleSimulation::new(context, config, &seed).unwrap();

        for _ in 0..10 {
            let snapshot = simulation.step().unwrap();
            for (now, initial) in snapshot.iter().zip(&seed) {
                assert_eq!(now.position, initial.position);
                assert_eq!(now.velocity, [0.0, 0.0]);
                assert_eq!(now.mass, initial.mass);
            }
        }
        assert_eq!(simulation.frame_index(), 10);
    }

    #[test]
    fn test_every_particle_is_covered_once() {
        let Some(context) = gpu_context() else {
            return;
        };

        for n in [2usize, 65, 130] {
            let seed = seed_particles(&mut StdRng::seed_from_u64(n as u64), n, 100.0, 100.0);
            let config = SimulationConfig::new(n)
                .with_kernel(KernelSource::new("Stamp Kernel", STAMP_KERNEL));
            let mut simulation = ParticleSimulation::new(context.clone(), config, &seed).unwrap();

            let snapshot = simulation.step().unwrap();
            assert_eq!(snapshot.len(), n);
            for (now, initial) in snapshot.iter().zip(&seed) {
                assert_eq!(now._padding[0], 1.0, "n = {n}");
                assert_eq!(now.position, initial.position);
                assert_eq!(now.mass, initial.mass);
            }
        }
    }

    #[test]
    fn test_output_feeds_next_input() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = pair();
        let config = SimulationConfig::new(seed.len())
            .with_kernel(KernelSource::new("Stamp Kernel", STAMP_KERNEL));
        let mut simulation = ParticleSimulation::new(context, config, &seed).unwrap();

        let mut last = None;
        for _ in 0..3 {
            last = Some(simulation.step().unwrap());
        }
        let snapshot = last.unwrap();
        assert!(snapshot.iter().all(|p| p._padding[0] == 3.0));
    }

    #[test]
    fn test_run_frame_hands_off_snapshot() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = pair();
        let mut simulation =
            ParticleSimulation::new(context, SimulationConfig::new(seed.len()), &seed).unwrap();

        let mut drawn = Vec::new();
        simulation
            .run_frame(|particles| drawn.extend_from_slice(particles))
            .unwrap();
        assert_eq!(drawn.len(), 2);
    }

    #[test]
    fn test_update_params_takes_effect() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = pair();
        let mut simulation =
            ParticleSimulation::new(context, SimulationConfig::new(seed.len()), &seed).unwrap();

        simulation.update_params(SimParams::default().without_gravity());
        let snapshot = simulation.step().unwrap();
        assert_eq!(snapshot[0].position, seed[0].position);
        assert_eq!(snapshot[1].position, seed[1].position);
        assert_eq!(simulation.params().gravity, 0.0);
    }

    #[test]
    fn test_seed_mismatch_is_rejected() {
        let Some(context) = gpu_context() else {
            return;
        };
        let result = ParticleSimulation::new(context, SimulationConfig::new(3), &pair());
        assert!(matches!(
            result,
            Err(SimulationError::SeedSizeMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_oversized_simulation_is_rejected_before_allocation() {
        let Some(context) = gpu_context() else {
            return;
        };
        let n = crate::max_particle_count(&context.device.limits()) + 1;

        let result = ParticleSimulation::new(context, SimulationConfig::new(n), &[]);
        assert!(matches!(
            result,
            Err(SimulationError::ParticleCountTooLarge { requested, .. }) if requested == n
        ));
    }

    #[test]
    fn test_destroyed_device_stops_the_loop() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = pair();
        let mut simulation =
            ParticleSimulation::new(context.clone(), SimulationConfig::new(seed.len()), &seed)
                .unwrap();
        simulation.step().unwrap();

        context.device.destroy();

        assert!(matches!(
            simulation.step(),
            Err(SimulationError::DeviceLost { .. })
        ));
        assert!(matches!(
            simulation.run_frame(|_| panic!("no hand-off after device loss")),
            Err(SimulationError::DeviceLost { .. })
        ));
        assert_eq!(simulation.frame_index(), 1);
    }

    #[test]
    fn test_generous_readback_timeout_still_completes() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = pair();
        let config =
            SimulationConfig::new(seed.len()).with_readback_timeout(Duration::from_secs(30));
        let mut simulation = ParticleSimulation::new(context, config, &seed).unwrap();

        for _ in 0..3 {
            assert_eq!(simulation.step().unwrap().len(), 2);
        }
        assert_eq!(simulation.frame_index(), 3);
    }

    #[test]
    fn test_zero_softening_keeps_coincident_bodies_finite() {
        let Some(context) = gpu_context() else {
            return;
        };
        let seed = vec![Particle::at_rest(Vec2::new(50.0, 50.0), 1.0); 2];
        let mut simulation =
            ParticleSimulation::new(context, SimulationConfig::new(seed.len()), &seed).unwrap();

        simulation.update_params(SimParams {
            softening: 0.0,
            ..SimParams::default()
        });
        assert_eq!(simulation.params().softening, MIN_SOFTENING);

        for _ in 0..5 {
            let snapshot = simulation.step().unwrap();
            for p in snapshot.iter() {
                assert!(p.position().is_finite() && p.velocity().is_finite());
            }
        }
    }

    #[test]
    fn test_empty_simulation_is_rejected() {
        let Some(context) = gpu_context() else {
            return;
        };
        let result = ParticleSimulation::new(context, SimulationConfig::new(0), &[]);
        assert!(matches!(result, Err(SimulationError::EmptySimulation)));
    }
}
