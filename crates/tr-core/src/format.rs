//! Sample formats, storage layouts and nominal ranges.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Integer bit depths accepted on either side of a conversion.
pub const SUPPORTED_INT_BITS: [u8; 7] = [8, 9, 10, 11, 12, 14, 16];

/// Numeric kind of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    #[default]
    Int,
    Float,
}

/// In-memory layout of one sample inside a plane row.
///
/// Integers up to 8 bits take one byte, 9 to 16 bits a native-endian `u16`,
/// floats a native-endian `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    U8,
    U16,
    F32,
}

impl Storage {
    /// Size of one sample in bytes.
    #[must_use]
    #[inline(always)]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }
}

/// Role of a plane, which decides its nominal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneRole {
    /// Luma, gray, alpha or any RGB channel: black to white.
    Luma,
    /// Colour-difference plane centred on a neutral value.
    Chroma,
}

impl PlaneRole {
    /// Index into per-role tables.
    #[must_use]
    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::Luma => 0,
            Self::Chroma => 1,
        }
    }
}

/// Colour family of the planes handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFamily {
    Gray,
    #[default]
    Yuv,
    Rgb,
}

impl ColorFamily {
    /// Role of the plane at `plane_index`.
    ///
    /// # Example
    /// ```
    /// use tr_core::format::{ColorFamily, PlaneRole};
    /// assert_eq!(ColorFamily::Yuv.role(0), PlaneRole::Luma);
    /// assert_eq!(ColorFamily::Yuv.role(2), PlaneRole::Chroma);
    /// assert_eq!(ColorFamily::Rgb.role(2), PlaneRole::Luma);
    /// ```
    #[must_use]
    pub const fn role(self, plane_index: usize) -> PlaneRole {
        match (self, plane_index) {
            (Self::Yuv, 1 | 2) => PlaneRole::Chroma,
            _ => PlaneRole::Luma,
        }
    }
}

/// Sample type, bit depth and range convention of a plane.
///
/// Float samples are always 32 bits and ignore `full_range`: luma spans
/// [0, 1] and chroma [-0.5, 0.5].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleFormat {
    pub sample_type: SampleType,
    pub bits: u8,
    pub full_range: bool,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self::int(8, true)
    }
}

impl SampleFormat {
    /// Integer format with the given depth and range flag.
    #[must_use]
    pub const fn int(bits: u8, full_range: bool) -> Self {
        Self {
            sample_type: SampleType::Int,
            bits,
            full_range,
        }
    }

    /// 32-bit float format.
    #[must_use]
    pub const fn float() -> Self {
        Self {
            sample_type: SampleType::Float,
            bits: 32,
            full_range: true,
        }
    }

    #[must_use]
    #[inline(always)]
    pub const fn is_float(self) -> bool {
        matches!(self.sample_type, SampleType::Float)
    }

    /// Checks that the type/depth combination is supported.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for any integer depth outside
    /// [`SUPPORTED_INT_BITS`] or a float that is not 32 bits wide.
    pub fn validate(self) -> Result<(), ConfigError> {
        let ok = match self.sample_type {
            SampleType::Int => SUPPORTED_INT_BITS.contains(&self.bits),
            SampleType::Float => self.bits == 32,
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedFormat {
                sample_type: self.sample_type,
                bits: self.bits,
            })
        }
    }

    /// Storage layout of a sample in this format.
    #[must_use]
    pub const fn storage(self) -> Storage {
        match self.sample_type {
            SampleType::Float => Storage::F32,
            SampleType::Int if self.bits <= 8 => Storage::U8,
            SampleType::Int => Storage::U16,
        }
    }

    /// Largest code value of an integer format (`2^bits - 1`).
    #[must_use]
    #[inline(always)]
    pub const fn max_level(self) -> i32 {
        (1 << self.bits) - 1
    }

    /// Two formats hold numerically identical samples: same integer depth and
    /// range, or both float.
    ///
    /// # Example
    /// ```
    /// use tr_core::format::SampleFormat;
    /// assert!(SampleFormat::int(10, false).same_numbers(SampleFormat::int(10, false)));
    /// assert!(!SampleFormat::int(10, false).same_numbers(SampleFormat::int(10, true)));
    /// ```
    #[must_use]
    pub fn same_numbers(self, other: Self) -> bool {
        match (self.sample_type, other.sample_type) {
            (SampleType::Float, SampleType::Float) => true,
            (SampleType::Int, SampleType::Int) => {
                self.bits == other.bits && self.full_range == other.full_range
            }
            _ => false,
        }
    }

    /// Nominal range of `role` as `(origin, span)`: a physical value `p`
    /// (luma in [0, 1], chroma in [-0.5, 0.5]) is stored as `origin + p * span`.
    ///
    /// Studio range puts black at 16 and white at 235 (chroma 128 ± 112),
    /// scaled by `2^(bits - 8)`. Full range uses [0, 2^bits - 1], with chroma
    /// centred on `2^(bits - 1)`.
    ///
    /// # Example
    /// ```
    /// use tr_core::format::{PlaneRole, SampleFormat};
    /// assert_eq!(SampleFormat::int(8, false).range(PlaneRole::Luma), (16.0, 219.0));
    /// assert_eq!(SampleFormat::int(10, false).range(PlaneRole::Chroma), (512.0, 896.0));
    /// assert_eq!(SampleFormat::int(8, true).range(PlaneRole::Luma), (0.0, 255.0));
    /// ```
    #[must_use]
    pub fn range(self, role: PlaneRole) -> (f64, f64) {
        if self.is_float() {
            return (0.0, 1.0);
        }
        let scale = f64::from(1_u32 << self.bits.saturating_sub(8));
        let max = f64::from(self.max_level());
        match (role, self.full_range) {
            (PlaneRole::Luma, true) => (0.0, max),
            (PlaneRole::Luma, false) => (16.0 * scale, 219.0 * scale),
            (PlaneRole::Chroma, true) => (f64::from(1_u32 << self.bits.saturating_sub(1)), max),
            (PlaneRole::Chroma, false) => (128.0 * scale, 224.0 * scale),
        }
    }
}
