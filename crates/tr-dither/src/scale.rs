//! Affine mapping between sample domains.
//!
//! `dst = src * gain + offset`, solved by matching the nominal ranges of the
//! two formats for a plane role. Integer pipelines run it in fixed point and
//! produce destination values with [`FRAC_BITS`] fractional bits.

use tr_core::format::{PlaneRole, SampleFormat};

/// Fractional bits of destination values and diffused errors.
pub const FRAC_BITS: u32 = 16;

/// One destination LSB in fixed point.
pub const ONE: i64 = 1 << FRAC_BITS;

/// Half an LSB, added before the final shift to round half up.
pub const HALF: i64 = 1 << (FRAC_BITS - 1);

// Gain and offset are held in Q32 so that 16-bit sources keep their full
// precision after the product.
const GAIN_BITS: u32 = 32;
const GAIN_ROUND: i64 = 1 << (GAIN_BITS - FRAC_BITS - 1);

// Keeps absurd float inputs (inf, 1e30) far from i64 overflow once biases
// are added.
const FLOAT_LIMIT: f64 = (1_u64 << 46) as f64;

/// Gain and offset mapping `src` onto `dst` for a plane role.
///
/// # Example
/// ```
/// use tr_core::format::{PlaneRole, SampleFormat};
/// use tr_dither::scale::compute_gain_offset;
/// let (gain, offset) = compute_gain_offset(
///     SampleFormat::int(16, false),
///     SampleFormat::int(8, false),
///     PlaneRole::Luma,
/// );
/// assert_eq!((gain, offset), (1.0 / 256.0, 0.0));
/// ```
#[must_use]
pub fn compute_gain_offset(src: SampleFormat, dst: SampleFormat, role: PlaneRole) -> (f64, f64) {
    let (src_origin, src_span) = src.range(role);
    let (dst_origin, dst_span) = dst.range(role);
    let gain = dst_span / src_span;
    (gain, dst_origin - src_origin * gain)
}

/// Gain/offset in the forms the scanline routines consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleMap {
    pub gain: f64,
    pub offset: f64,
    gain_fx: i64,
    offset_fx: i64,
}

impl ScaleMap {
    #[must_use]
    pub fn new(gain: f64, offset: f64) -> Self {
        let unit = (1_u64 << GAIN_BITS) as f64;
        Self {
            gain,
            offset,
            gain_fx: (gain * unit).round() as i64,
            offset_fx: (offset * unit).round() as i64,
        }
    }

    /// Map for `role` between two formats.
    #[must_use]
    pub fn between(src: SampleFormat, dst: SampleFormat, role: PlaneRole) -> Self {
        let (gain, offset) = compute_gain_offset(src, dst, role);
        Self::new(gain, offset)
    }

    /// Integer code to fixed-point destination value.
    #[must_use]
    #[inline(always)]
    pub fn int_to_fixed(&self, code: u32) -> i64 {
        (i64::from(code) * self.gain_fx + self.offset_fx + GAIN_ROUND) >> (GAIN_BITS - FRAC_BITS)
    }

    /// Float sample to fixed-point destination value.
    #[must_use]
    #[inline(always)]
    pub fn float_to_fixed(&self, value: f64) -> i64 {
        let scaled = value.mul_add(self.gain, self.offset) * ONE as f64;
        scaled.round().clamp(-FLOAT_LIMIT, FLOAT_LIMIT) as i64
    }

    /// Plain affine map, used for float destinations.
    #[must_use]
    #[inline(always)]
    pub fn apply(&self, value: f64) -> f64 {
        value.mul_add(self.gain, self.offset)
    }
}

/// Rounds a fixed-point value half up to an integer code.
#[must_use]
#[inline(always)]
pub const fn round_half_up(value: i64) -> i64 {
    (value + HALF) >> FRAC_BITS
}
