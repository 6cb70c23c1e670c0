//! Error-diffusion kernels.
//!
//! Kernels spread one pixel's quantisation error over an explicit
//! accumulator. `DIR` is the scan direction (+1 left to right, -1 right to
//! left); offsets are multiplied by it so the kernel shape mirrors with the
//! serpentine scan.
//!
//! Errors for the rest of the current row travel in two forward registers
//! ([`Forward`]) instead of the buffer. The incoming line is consumed two
//! cells ahead of the current pixel, and the cells behind are reused at once
//! for the following row (one-line kernels) or the row after next (two-line
//! kernels).

use crate::ostromoukhov::OSTROMOUKHOV;

/// Error still to be applied on the current row: `nxt0` to the next pixel,
/// `nxt1` to the one after.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Forward {
    pub nxt0: i32,
    pub nxt1: i32,
}

/// `p + off` on line indices.
#[inline(always)]
pub(crate) const fn at(p: usize, off: isize) -> usize {
    p.wrapping_add_signed(off)
}

/// Coefficient-spreading policy.
pub trait DiffusionKernel {
    const NAME: &'static str;

    /// Accumulator lines the kernel needs (rows below the current one).
    const LINES: usize;

    /// Spreads `err` from line position `p`.
    ///
    /// `cur` is the line feeding the current row, `next` the line for the
    /// following row (empty for one-line kernels). `level` is the 8-bit
    /// intensity of the source pixel.
    fn diffuse<const DIR: isize>(
        err: i32,
        fwd: &mut Forward,
        cur: &mut [i32],
        next: &mut [i32],
        p: usize,
        level: u8,
    );

    /// Called after the last pixel of a row, `trailing` being the position
    /// just past it.
    #[inline(always)]
    fn prepare_next_line(_cur: &mut [i32], _trailing: usize) {}
}

/// Floyd-Steinberg with the serpentine weights {0, 4, 5, 7}/16.
pub struct FloydSteinberg;

impl DiffusionKernel for FloydSteinberg {
    const NAME: &'static str = "floyd_steinberg";
    const LINES: usize = 1;

    #[inline(always)]
    fn diffuse<const DIR: isize>(
        err: i32,
        fwd: &mut Forward,
        cur: &mut [i32],
        _next: &mut [i32],
        p: usize,
        _level: u8,
    ) {
        let e4 = (err * 4 + 8) >> 4;
        let e5 = (err * 5 + 8) >> 4;
        let e7 = err - e4 - e5;
        fwd.nxt0 = fwd.nxt1 + e7;
        fwd.nxt1 = cur[at(p, 2 * DIR)];
        cur[at(p, -DIR)] += e4;
        cur[p] += e5;
        cur[at(p, DIR)] = 0;
    }
}

/// Sierra Filter Lite: 2/4 ahead, 1/4 below, 1/4 below-behind.
pub struct FilterLite;

impl DiffusionKernel for FilterLite {
    const NAME: &'static str = "filter_lite";
    const LINES: usize = 1;

    #[inline(always)]
    fn diffuse<const DIR: isize>(
        err: i32,
        fwd: &mut Forward,
        cur: &mut [i32],
        _next: &mut [i32],
        p: usize,
        _level: u8,
    ) {
        let e1 = (err + 2) >> 2;
        let e2 = err - 2 * e1;
        fwd.nxt0 = fwd.nxt1 + e2;
        fwd.nxt1 = cur[at(p, 2 * DIR)];
        cur[at(p, -DIR)] += e1;
        cur[p] = e1;
    }

    #[inline(always)]
    fn prepare_next_line(cur: &mut [i32], trailing: usize) {
        cur[trailing] = 0;
    }
}

/// Stucki, weights /42:
///
/// ```text
///         *  8  4
///   2  4  8  4  2
///   1  2  4  2  1
/// ```
pub struct Stucki;

impl DiffusionKernel for Stucki {
    const NAME: &'static str = "stucki";
    const LINES: usize = 2;

    #[inline(always)]
    fn diffuse<const DIR: isize>(
        err: i32,
        fwd: &mut Forward,
        cur: &mut [i32],
        next: &mut [i32],
        p: usize,
        _level: u8,
    ) {
        let e1 = (err + 21).div_euclid(42);
        let e2 = e1 * 2;
        let e4 = e1 * 4;
        let e8 = e1 * 8;
        // the pixel ahead takes the rounding remainder
        fwd.nxt0 = fwd.nxt1 + err - 34 * e1;
        fwd.nxt1 = cur[at(p, 2 * DIR)] + e4;

        next[at(p, -2 * DIR)] += e2;
        next[at(p, -DIR)] += e4;
        next[p] += e8;
        next[at(p, DIR)] += e4;
        next[at(p, 2 * DIR)] += e2;

        cur[at(p, -2 * DIR)] += e1;
        cur[at(p, -DIR)] += e2;
        cur[p] += e4;
        cur[at(p, DIR)] += e2;
        cur[at(p, 2 * DIR)] = e1;
    }
}

/// Atkinson: 1/8 to six neighbours, the remaining 2/8 is dropped.
///
/// ```text
///      *  1  1
///   1  1  1
///      1
/// ```
pub struct Atkinson;

impl DiffusionKernel for Atkinson {
    const NAME: &'static str = "atkinson";
    const LINES: usize = 2;

    #[inline(always)]
    fn diffuse<const DIR: isize>(
        err: i32,
        fwd: &mut Forward,
        cur: &mut [i32],
        next: &mut [i32],
        p: usize,
        _level: u8,
    ) {
        let e = (err + 4) >> 3;
        fwd.nxt0 = fwd.nxt1 + e;
        fwd.nxt1 = cur[at(p, 2 * DIR)] + e;
        next[at(p, -DIR)] += e;
        next[p] += e;
        next[at(p, DIR)] += e;
        cur[p] = e;
    }

    #[inline(always)]
    fn prepare_next_line(cur: &mut [i32], trailing: usize) {
        cur[trailing] = 0;
    }
}

/// Ostromoukhov variable coefficients, selected by source intensity.
pub struct Ostromoukhov;

impl DiffusionKernel for Ostromoukhov {
    const NAME: &'static str = "ostromoukhov";
    const LINES: usize = 1;

    #[inline(always)]
    fn diffuse<const DIR: isize>(
        err: i32,
        fwd: &mut Forward,
        cur: &mut [i32],
        _next: &mut [i32],
        p: usize,
        level: u8,
    ) {
        let entry = OSTROMOUKHOV[usize::from(level)];
        let right = entry.share(err, entry.right);
        let behind = entry.share(err, entry.down_behind);
        fwd.nxt0 = fwd.nxt1 + right;
        fwd.nxt1 = cur[at(p, 2 * DIR)];
        cur[at(p, -DIR)] += behind;
        cur[p] = err - right - behind;
    }

    #[inline(always)]
    fn prepare_next_line(cur: &mut [i32], trailing: usize) {
        cur[trailing] = 0;
    }
}
