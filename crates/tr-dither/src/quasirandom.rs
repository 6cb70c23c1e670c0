//! Low-discrepancy bias sequence based on the plastic number.
//!
//! The phase is a Q0.32 fraction. Each pixel adds `1/ρ` and each row `1/ρ²`
//! (ρ ≈ 1.3247, real root of x³ = x + 1), the two-dimensional R2 sequence.
//! A triangle wave over the top 9 bits turns the phase into a bias.

/// frac(1/ρ) in Q0.32.
pub const STEP_X: u32 = 0xC13F_A9A9;
/// frac(1/ρ²) in Q0.32.
pub const STEP_Y: u32 = 0x91E1_0DA6;
/// Per-frame offset when the sequence is dynamic (golden ratio).
pub const FRAME_STEP: u32 = 0x9E37_79B9;
/// Per-plane offset when planes are decorrelated (frac(√2)).
pub const PLANE_STEP: u32 = 0x6A09_E667;

/// Bias in [-128, 127] for a phase.
///
/// # Example
/// ```
/// use tr_dither::quasirandom::bias;
/// assert_eq!(bias(0), -128);
/// assert_eq!(bias(0x7FFF_FFFF), 127);
/// assert_eq!(bias(0xFFFF_FFFF), -128);
/// ```
#[must_use]
#[inline(always)]
pub const fn bias(phase: u32) -> i32 {
    let t = (phase >> 23) as i32;
    let tri = if t < 256 { t } else { 511 - t };
    tri - 128
}

/// Sequence walker for one scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuasirandomSequence {
    phase: u32,
    shift: u32,
}

impl QuasirandomSequence {
    /// Walker starting at the first pixel of row `y`.
    ///
    /// `tpdf` doubles the output range, matching remapped patterns.
    #[must_use]
    pub fn for_row(y: usize, frame_index: u32, plane_index: usize, flags: SequenceFlags) -> Self {
        let mut phase = (y as u32).wrapping_mul(STEP_Y);
        if flags.dynamic {
            phase = phase.wrapping_add(frame_index.wrapping_mul(FRAME_STEP));
        }
        if !flags.correlated {
            phase = phase.wrapping_add((plane_index as u32).wrapping_mul(PLANE_STEP));
        }
        Self {
            phase,
            shift: u32::from(flags.tpdf),
        }
    }

    #[must_use]
    pub const fn phase(self) -> u32 {
        self.phase
    }

    /// Bias for the current pixel, then advances by one pixel.
    #[inline(always)]
    pub fn next(&mut self) -> i32 {
        let b = bias(self.phase) << self.shift;
        self.phase = self.phase.wrapping_add(STEP_X);
        b
    }
}

/// Engine flags that shape the sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceFlags {
    pub dynamic: bool,
    pub correlated: bool,
    pub tpdf: bool,
}
