//! Simulation constants
//!
//! Units are canvas pixels and seconds. Values are tuned for a visible
//! attraction between a handful of bodies at interactive frame rates.

/// Work-items per compute workgroup. Must match the `WORKGROUP_SIZE` constant
/// the kernel is compiled with (it is injected from here).
pub const WORKGROUP_SIZE: u32 = 64;

/// Lower bound (inclusive) of the seeded mass range
pub const SEED_MASS_MIN: f32 = 1.0;

/// Upper bound (exclusive) of the seeded mass range
pub const SEED_MASS_MAX: f32 = 2.0;

/// Gravitational constant in simulation units (px³ / (mass · s²))
pub const GRAVITY: f32 = 2000.0;

/// Softening length to prevent singularities at r→0
pub const SOFTENING: f32 = 5.0;

/// Smallest softening the kernel is run with; zero makes coincident bodies NaN
pub const MIN_SOFTENING: f32 = 1e-3;

/// Fixed integration timestep (one frame at 60 Hz)
pub const TIME_STEP: f32 = 1.0 / 60.0;

/// Drawn circle radius per unit of mass, in pixels
pub const RADIUS_PER_MASS: f32 = 5.0;
