//! Particle record and its packed device layout

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use std::ops::Deref;
use thiserror::Error;

/// GPU-compatible particle structure
///
/// Laid out as 8 × f32 (32 bytes). The trailing padding keeps the stride a
/// multiple of the storage-buffer alignment; WGSL would otherwise pack the
/// array at 24 bytes and the two sides would disagree.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Position in canvas pixels (x right, y down)
    pub position: [f32; 2],
    /// Velocity in pixels per second
    pub velocity: [f32; 2],
    /// Mass, strictly positive
    pub mass: f32,
    pub _padding: [f32; 3],
}

/// Byte size of one particle record, on host and device alike.
pub const PARTICLE_STRIDE: usize = std::mem::size_of::<Particle>();

const _: () = assert!(PARTICLE_STRIDE == 32);
const _: () = assert!(PARTICLE_STRIDE % 16 == 0);

impl Particle {
    /// WGSL declaration of the same record. Prepended to every kernel that
    /// binds particle storage so field order and stride have one source.
    pub const WGSL_STRUCT: &'static str = "\
struct Particle {
    position: vec2<f32>,
    velocity: vec2<f32>,
    mass: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}
";

    pub fn new(position: Vec2, velocity: Vec2, mass: f32) -> Self {
        Self {
            position: position.to_array(),
            velocity: velocity.to_array(),
            mass,
            _padding: [0.0; 3],
        }
    }

    /// Particle at rest
    pub fn at_rest(position: Vec2, mass: f32) -> Self {
        Self::new(position, Vec2::ZERO, mass)
    }

    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::from_array(self.velocity)
    }
}

/// Raised when raw bytes cannot be reinterpreted as particle records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("byte length {len} is not a multiple of the {stride}-byte particle stride")]
    Misaligned { len: usize, stride: usize },
}

/// Host-side snapshot of N particles, byte-for-byte identical to the device buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleBuffer {
    particles: Vec<Particle>,
}

impl ParticleBuffer {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    /// Decode a copy of device bytes.
    ///
    /// The source slice does not need any particular alignment; records are
    /// copied out so the result outlives the mapping they came from.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() % PARTICLE_STRIDE != 0 {
            return Err(LayoutError::Misaligned {
                len: bytes.len(),
                stride: PARTICLE_STRIDE,
            });
        }

        Ok(Self {
            particles: bytemuck::pod_collect_to_vec(bytes),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }

    /// Size of the encoded buffer (`len * PARTICLE_STRIDE`)
    pub fn byte_size(&self) -> u64 {
        (self.particles.len() * PARTICLE_STRIDE) as u64
    }

    pub fn total_mass(&self) -> f32 {
        self.particles.iter().map(|p| p.mass).sum()
    }

    pub fn into_vec(self) -> Vec<Particle> {
        self.particles
    }
}

impl Deref for ParticleBuffer {
    type Target = [Particle];

    fn deref(&self) -> &[Particle] {
        &self.particles
    }
}

impl From<Vec<Particle>> for ParticleBuffer {
    fn from(particles: Vec<Particle>) -> Self {
        Self::new(particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_is_eight_floats() {
        assert_eq!(PARTICLE_STRIDE, 8 * std::mem::size_of::<f32>());
        assert_eq!(std::mem::align_of::<Particle>(), 4);
    }

    #[test]
    fn test_buffer_size_scales_with_count() {
        for n in [1usize, 2, 63, 64, 65, 1000] {
            let buffer = ParticleBuffer::new(vec![Particle::default(); n]);
            assert_eq!(buffer.as_bytes().len(), n * PARTICLE_STRIDE);
            assert_eq!(buffer.byte_size(), (n * PARTICLE_STRIDE) as u64);
        }
    }

    #[test]
    fn test_field_offsets() {
        let p = Particle::new(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0), 5.0);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&p));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decode_unaligned_bytes() {
        let source = ParticleBuffer::new(vec![
            Particle::at_rest(Vec2::new(10.0, 10.0), 1.0),
            Particle::at_rest(Vec2::new(20.0, 20.0), 1.5),
        ]);

        // Shift by one byte so the slice is not f32-aligned.
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(source.as_bytes());

        let decoded = ParticleBuffer::from_bytes(&shifted[1..]).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let err = ParticleBuffer::from_bytes(&[0u8; PARTICLE_STRIDE + 4]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Misaligned {
                len: PARTICLE_STRIDE + 4,
                stride: PARTICLE_STRIDE
            }
        );
    }

    #[test]
    fn test_wgsl_struct_declares_eight_scalars() {
        // vec2 counts as two scalars
        let scalars: usize = Particle::WGSL_STRUCT
            .lines()
            .filter_map(|line| line.trim().strip_suffix(','))
            .map(|field| if field.contains("vec2") { 2 } else { 1 })
            .sum();
        assert_eq!(scalars * std::mem::size_of::<f32>(), PARTICLE_STRIDE);

        let fields: Vec<&str> = Particle::WGSL_STRUCT
            .lines()
            .filter_map(|line| line.trim().split(':').next())
            .filter(|name| !name.is_empty() && !name.starts_with("struct") && *name != "}")
            .collect();
        assert_eq!(
            fields,
            ["position", "velocity", "mass", "_pad0", "_pad1", "_pad2"]
        );
    }

    #[test]
    fn test_total_mass() {
        let buffer = ParticleBuffer::new(vec![
            Particle::at_rest(Vec2::ZERO, 1.0),
            Particle::at_rest(Vec2::ONE, 1.5),
        ]);
        assert_eq!(buffer.total_mass(), 2.5);
    }

    #[test]
    fn test_decoded_buffer_hands_back_its_records() {
        let particles = vec![
            Particle::at_rest(Vec2::new(3.0, 4.0), 1.25),
            Particle::new(Vec2::ZERO, Vec2::new(-1.0, 0.5), 1.75),
        ];
        let decoded = ParticleBuffer::from_bytes(bytemuck::cast_slice(&particles)).unwrap();
        assert_eq!(decoded.into_vec(), particles);
    }
}
