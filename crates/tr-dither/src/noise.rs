//! Deterministic pseudo-random noise.
//!
//! One 32-bit LCG state walks a whole plane: one step per pixel, plus a
//! different generator at the end of every scanline so that consecutive rows
//! do not line up. The seed only depends on frame/plane indices and flags.

const PIXEL_MUL: u32 = 1_664_525;
const PIXEL_ADD: u32 = 1_013_904_223;

const LINE_MUL: u32 = 1_103_515_245;
const LINE_ADD: u32 = 12_345;
const LINE_EXTRA_BIT: u32 = 1 << 25;
const LINE_EXTRA_MUL: u32 = 134_775_813;
const LINE_EXTRA_ADD: u32 = 1;

const DYNAMIC_SEED: u32 = 55_555;
const STATIC_SEED: u32 = 0x2F0B_3A49;
const FRAME_MUL: u32 = 0x0001_0DCD;

/// One per-pixel step. Returns the new state and a signed byte in [-128, 127]
/// taken from its top bits.
///
/// # Example
/// ```
/// use tr_dither::noise::step;
/// assert_eq!(step(0), (1_013_904_223, 60));
/// ```
#[must_use]
#[inline(always)]
pub const fn step(state: u32) -> (u32, i32) {
    let next = state.wrapping_mul(PIXEL_MUL).wrapping_add(PIXEL_ADD);
    (next, (next as i32) >> 24)
}

/// Per-scanline decorrelation step.
#[must_use]
#[inline(always)]
pub const fn end_of_line(state: u32) -> u32 {
    let next = state.wrapping_mul(LINE_MUL).wrapping_add(LINE_ADD);
    if next & LINE_EXTRA_BIT != 0 {
        next.wrapping_mul(LINE_EXTRA_MUL).wrapping_add(LINE_EXTRA_ADD)
    } else {
        next
    }
}

/// Initial state for one `(frame, plane)` walk.
///
/// The plane index lands in the upper half-word unless planes are correlated.
/// Static noise ignores the frame index entirely.
#[must_use]
pub const fn seed(frame_index: u32, plane_index: usize, static_noise: bool, correlated: bool) -> u32 {
    let plane = if correlated {
        0
    } else {
        (plane_index as u32) << 16
    };
    if static_noise {
        plane ^ STATIC_SEED
    } else {
        plane ^ DYNAMIC_SEED ^ frame_index.wrapping_mul(FRAME_MUL)
    }
}

/// Noise stream for one plane walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseGenerator {
    state: u32,
}

impl NoiseGenerator {
    #[must_use]
    pub const fn new(state: u32) -> Self {
        Self { state }
    }

    /// Generator seeded with [`seed`].
    #[must_use]
    pub const fn for_plane(
        frame_index: u32,
        plane_index: usize,
        static_noise: bool,
        correlated: bool,
    ) -> Self {
        Self::new(seed(frame_index, plane_index, static_noise, correlated))
    }

    #[must_use]
    pub const fn state(self) -> u32 {
        self.state
    }

    /// Rectangular draw in [-128, 127].
    #[inline(always)]
    pub fn next_byte(&mut self) -> i32 {
        let (state, byte) = step(self.state);
        self.state = state;
        byte
    }

    /// Triangular draw in [-256, 254]: sum of two rectangular draws.
    #[inline(always)]
    pub fn next_tpdf(&mut self) -> i32 {
        self.next_byte() + self.next_byte()
    }

    #[inline(always)]
    pub fn end_of_line(&mut self) {
        self.state = end_of_line(self.state);
    }
}

/// Noise distribution plugged into the scanline routines at construction.
pub trait NoiseShape {
    /// Factor applied to the requested amplitude so that every shape has the
    /// same peak-to-peak meaning.
    const AMPLITUDE_SCALE: f64;

    fn draw(noise: &mut NoiseGenerator) -> i32;
}

/// No noise. Leaves the generator untouched.
pub struct Silent;

/// Uniform noise, one draw per pixel.
pub struct Rectangular;

/// Triangular noise, two draws per pixel.
pub struct Triangular;

impl NoiseShape for Silent {
    const AMPLITUDE_SCALE: f64 = 0.0;

    #[inline(always)]
    fn draw(_noise: &mut NoiseGenerator) -> i32 {
        0
    }
}

impl NoiseShape for Rectangular {
    const AMPLITUDE_SCALE: f64 = 1.0;

    #[inline(always)]
    fn draw(noise: &mut NoiseGenerator) -> i32 {
        noise.next_byte()
    }
}

impl NoiseShape for Triangular {
    // Keeps the total noise power of two summed draws equal to one draw.
    const AMPLITUDE_SCALE: f64 = std::f64::consts::FRAC_1_SQRT_2;

    #[inline(always)]
    fn draw(noise: &mut NoiseGenerator) -> i32 {
        noise.next_tpdf()
    }
}
