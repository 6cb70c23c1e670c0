//! Sample access over host-owned byte planes.
//!
//! Rows are plain byte slices with native-endian samples, so host memory does
//! not need any particular alignment.

use tr_core::error::ProcessError;

use crate::scale::ScaleMap;

/// A sample type the scanline routines can read and write.
pub trait Sample: Copy + Send + Sync + 'static {
    const BYTES: usize;

    fn load(bytes: &[u8]) -> Self;

    fn store(self, bytes: &mut [u8]);

    /// Fixed-point destination value through `map`.
    fn to_fixed(self, map: &ScaleMap) -> i64;

    fn to_f64(self) -> f64;
}

/// Integer samples: raw codes for the shift path and clamped writes.
pub trait IntSample: Sample {
    fn code(self) -> u32;

    /// Builds a sample from a code already clamped to the destination range.
    fn from_code(code: u32) -> Self;
}

impl Sample for u8 {
    const BYTES: usize = 1;

    #[inline(always)]
    fn load(bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline(always)]
    fn store(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }

    #[inline(always)]
    fn to_fixed(self, map: &ScaleMap) -> i64 {
        map.int_to_fixed(u32::from(self))
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl IntSample for u8 {
    #[inline(always)]
    fn code(self) -> u32 {
        u32::from(self)
    }

    #[inline(always)]
    fn from_code(code: u32) -> Self {
        code as u8
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;

    #[inline(always)]
    fn load(bytes: &[u8]) -> Self {
        u16::from_ne_bytes([bytes[0], bytes[1]])
    }

    #[inline(always)]
    fn store(self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.to_ne_bytes());
    }

    #[inline(always)]
    fn to_fixed(self, map: &ScaleMap) -> i64 {
        map.int_to_fixed(u32::from(self))
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl IntSample for u16 {
    #[inline(always)]
    fn code(self) -> u32 {
        u32::from(self)
    }

    #[inline(always)]
    fn from_code(code: u32) -> Self {
        code as u16
    }
}

impl Sample for f32 {
    const BYTES: usize = 4;

    #[inline(always)]
    fn load(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[inline(always)]
    fn store(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.to_ne_bytes());
    }

    #[inline(always)]
    fn to_fixed(self, map: &ScaleMap) -> i64 {
        map.float_to_fixed(f64::from(self))
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

/// Sample `x` of a row.
#[inline(always)]
pub(crate) fn read<S: Sample>(row: &[u8], x: usize) -> S {
    S::load(&row[x * S::BYTES..])
}

/// Stores sample `x` of a row.
#[inline(always)]
pub(crate) fn write<S: Sample>(row: &mut [u8], x: usize, value: S) {
    value.store(&mut row[x * S::BYTES..]);
}

/// Borrowed source plane: bytes and row stride in bytes.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// Borrowed destination plane.
#[derive(Debug)]
pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
}

impl<'a> PlaneRef<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    /// First `row_bytes` bytes of row `y`. Geometry must have been checked.
    #[inline(always)]
    pub(crate) fn row(&self, y: usize, row_bytes: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + row_bytes]
    }
}

impl<'a> PlaneMut<'a> {
    #[must_use]
    pub fn new(data: &'a mut [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    #[inline(always)]
    pub(crate) fn row_mut(&mut self, y: usize, row_bytes: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + row_bytes]
    }
}

/// Checks that `height` rows of `row_bytes` fit in a buffer.
pub(crate) fn check_geometry(
    which: &'static str,
    len: usize,
    stride: usize,
    row_bytes: usize,
    height: usize,
) -> Result<(), ProcessError> {
    if height == 0 || row_bytes == 0 {
        return Ok(());
    }
    if stride < row_bytes {
        return Err(ProcessError::StrideTooSmall {
            which,
            stride,
            row_bytes,
        });
    }
    let needed = stride * (height - 1) + row_bytes;
    if len < needed {
        return Err(ProcessError::BufferTooSmall { which, len, needed });
    }
    Ok(())
}
