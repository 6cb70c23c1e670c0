//! Per-scanline routines and their selection.
//!
//! Every (source storage, destination storage, noise shape, mode) tuple gets
//! its own monomorphised routine. The engine picks one when it is built and
//! calls it for each row; nothing inside a row looks at the configuration.

use std::fmt;

use tr_core::config::{DitherConfig, DitherMode};
use tr_core::format::Storage;

use crate::accumulator::{ErrorAccumulator, Lines, MARGIN};
use crate::kernels::{
    Atkinson, DiffusionKernel, FilterLite, FloydSteinberg, Forward, Ostromoukhov, Stucki, at,
};
use crate::noise::{NoiseGenerator, NoiseShape, Rectangular, Silent, Triangular};
use crate::quasirandom::{QuasirandomSequence, SequenceFlags};
use crate::sample::{IntSample, Sample, read, write};
use crate::scale::{FRAC_BITS, ScaleMap, round_half_up};

/// Per-row state of one plane walk.
pub(crate) struct ScanContext<'a> {
    pub y: usize,
    pub width: usize,
    pub frame_index: u32,
    pub plane_index: usize,
    pub map: &'a ScaleMap,
    /// Destination clamp for integer outputs.
    pub max_code: i32,
    /// Ordered/quasirandom amplitude, 256 = one LSB per 256 bias units.
    pub ampo: i32,
    pub ampn: i32,
    pub noise: NoiseGenerator,
    pub pattern_row: &'a [i16],
    pub sequence: SequenceFlags,
    pub shift_left: u32,
    pub shift_right: u32,
}

pub(crate) type ScanFn = fn(&mut ScanContext<'_>, &[u8], &mut [u8]);
pub(crate) type DiffuseFn = fn(&mut ScanContext<'_>, &mut ErrorAccumulator, &[u8], &mut [u8]);

/// Routine chosen at construction.
#[derive(Clone, Copy)]
pub(crate) enum Routine {
    /// Rows are independent apart from the noise stream.
    Scan { name: &'static str, run: ScanFn },
    /// Serpentine error diffusion over a pooled accumulator.
    Diffuse {
        name: &'static str,
        nbr_lines: usize,
        run: DiffuseFn,
    },
}

impl Routine {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Scan { name, .. } | Self::Diffuse { name, .. } => name,
        }
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Picks the routine for a validated configuration.
pub(crate) fn select(cfg: &DitherConfig) -> Routine {
    if cfg.src.same_numbers(cfg.dst) {
        return Routine::Scan {
            name: "copy",
            run: scan_copy,
        };
    }
    match cfg.src.storage() {
        Storage::U8 => int_source::<u8>(cfg),
        Storage::U16 => int_source::<u16>(cfg),
        Storage::F32 => match cfg.dst.storage() {
            Storage::U8 => with_noise::<f32, u8>(cfg),
            Storage::U16 => with_noise::<f32, u16>(cfg),
            Storage::F32 => float_output::<f32>(),
        },
    }
}

fn int_source<S: IntSample>(cfg: &DitherConfig) -> Routine {
    match cfg.dst.storage() {
        Storage::U8 => int_pair::<S, u8>(cfg),
        Storage::U16 => int_pair::<S, u16>(cfg),
        Storage::F32 => float_output::<S>(),
    }
}

fn int_pair<S: IntSample, D: IntSample>(cfg: &DitherConfig) -> Routine {
    if cfg.mode == DitherMode::Fast && cfg.src.full_range == cfg.dst.full_range {
        return Routine::Scan {
            name: "shift",
            run: scan_shift::<S, D>,
        };
    }
    with_noise::<S, D>(cfg)
}

fn float_output<S: Sample>() -> Routine {
    Routine::Scan {
        name: "float",
        run: scan_float::<S>,
    }
}

fn with_noise<S: Sample, D: IntSample>(cfg: &DitherConfig) -> Routine {
    if cfg.mode == DitherMode::Fast {
        return Routine::Scan {
            name: "truncate",
            run: scan_truncate::<S, D>,
        };
    }
    if cfg.ampn <= 0.0 {
        with_mode::<S, D, Silent>(cfg.mode)
    } else if cfg.tpdf_noise {
        with_mode::<S, D, Triangular>(cfg.mode)
    } else {
        with_mode::<S, D, Rectangular>(cfg.mode)
    }
}

/// Fast never gets here: [`with_noise`] turns it into a truncation first.
fn with_mode<S: Sample, D: IntSample, N: NoiseShape>(mode: DitherMode) -> Routine {
    match mode {
        DitherMode::Fast
        | DitherMode::Round
        | DitherMode::Bayer
        | DitherMode::VoidAndCluster => Routine::Scan {
            name: "ordered",
            run: scan_ordered::<S, D, N>,
        },
        DitherMode::Quasirandom => Routine::Scan {
            name: "quasirandom",
            run: scan_quasirandom::<S, D, N>,
        },
        DitherMode::FloydSteinberg => diffusion::<S, D, N, FloydSteinberg>(),
        DitherMode::FilterLite => diffusion::<S, D, N, FilterLite>(),
        DitherMode::Stucki => diffusion::<S, D, N, Stucki>(),
        DitherMode::Atkinson => diffusion::<S, D, N, Atkinson>(),
        DitherMode::Ostromoukhov => diffusion::<S, D, N, Ostromoukhov>(),
    }
}

fn diffusion<S: Sample, D: IntSample, N: NoiseShape, K: DiffusionKernel>() -> Routine {
    Routine::Diffuse {
        name: K::NAME,
        nbr_lines: K::LINES,
        run: diffuse_row::<S, D, N, K>,
    }
}

#[inline(always)]
fn clamp_code(q: i64, max_code: i32) -> u32 {
    q.clamp(0, i64::from(max_code)) as u32
}

fn scan_copy(_ctx: &mut ScanContext<'_>, src: &[u8], dst: &mut [u8]) {
    dst.copy_from_slice(src);
}

/// Bias-free shift between integer depths of the same range convention.
fn scan_shift<S: IntSample, D: IntSample>(ctx: &mut ScanContext<'_>, src: &[u8], dst: &mut [u8]) {
    let max = ctx.max_code as u32;
    for x in 0..ctx.width {
        let code = (read::<S>(src, x).code() << ctx.shift_left) >> ctx.shift_right;
        write(dst, x, D::from_code(code.min(max)));
    }
}

/// Affine map then floor. No rounding bias, no noise.
fn scan_truncate<S: Sample, D: IntSample>(ctx: &mut ScanContext<'_>, src: &[u8], dst: &mut [u8]) {
    for x in 0..ctx.width {
        let v = read::<S>(src, x).to_fixed(ctx.map) >> FRAC_BITS;
        write(dst, x, D::from_code(clamp_code(v, ctx.max_code)));
    }
}

fn scan_float<S: Sample>(ctx: &mut ScanContext<'_>, src: &[u8], dst: &mut [u8]) {
    for x in 0..ctx.width {
        let v = ctx.map.apply(read::<S>(src, x).to_f64());
        write(dst, x, v as f32);
    }
}

fn scan_ordered<S: Sample, D: IntSample, N: NoiseShape>(
    ctx: &mut ScanContext<'_>,
    src: &[u8],
    dst: &mut [u8],
) {
    let pattern = ctx.pattern_row;
    let mask = pattern.len() - 1;
    for x in 0..ctx.width {
        let v = read::<S>(src, x).to_fixed(ctx.map);
        let bias = i32::from(pattern[x & mask]) * ctx.ampo + N::draw(&mut ctx.noise) * ctx.ampn;
        let q = round_half_up(v + i64::from(bias));
        write(dst, x, D::from_code(clamp_code(q, ctx.max_code)));
    }
}

fn scan_quasirandom<S: Sample, D: IntSample, N: NoiseShape>(
    ctx: &mut ScanContext<'_>,
    src: &[u8],
    dst: &mut [u8],
) {
    let mut seq =
        QuasirandomSequence::for_row(ctx.y, ctx.frame_index, ctx.plane_index, ctx.sequence);
    for x in 0..ctx.width {
        let v = read::<S>(src, x).to_fixed(ctx.map);
        let bias = seq.next() * ctx.ampo + N::draw(&mut ctx.noise) * ctx.ampn;
        let q = round_half_up(v + i64::from(bias));
        write(dst, x, D::from_code(clamp_code(q, ctx.max_code)));
    }
}

/// Even rows run left to right, odd rows right to left.
fn diffuse_row<S: Sample, D: IntSample, N: NoiseShape, K: DiffusionKernel>(
    ctx: &mut ScanContext<'_>,
    acc: &mut ErrorAccumulator,
    src: &[u8],
    dst: &mut [u8],
) {
    if ctx.y & 1 == 0 {
        diffuse_pass::<S, D, N, K, 1>(ctx, acc, src, dst);
    } else {
        diffuse_pass::<S, D, N, K, -1>(ctx, acc, src, dst);
    }
}

fn diffuse_pass<S: Sample, D: IntSample, N: NoiseShape, K: DiffusionKernel, const DIR: isize>(
    ctx: &mut ScanContext<'_>,
    acc: &mut ErrorAccumulator,
    src: &[u8],
    dst: &mut [u8],
) {
    let w = ctx.width;
    if w == 0 {
        return;
    }
    let Lines { cur, next, carry } = acc.lines(ctx.y);
    let (first, last) = if DIR > 0 { (0, w - 1) } else { (w - 1, 0) };
    let p0 = first + MARGIN;

    let mut fwd = Forward {
        nxt0: carry[0] + std::mem::take(&mut cur[p0]),
        nxt1: carry[1] + std::mem::take(&mut cur[at(p0, DIR)]),
    };
    if K::LINES > 1 {
        // Behind the row start the incoming line is write-only until it is
        // consumed two rows later; clear it so nothing piles up there.
        cur[at(p0, -DIR)] = 0;
        cur[at(p0, -2 * DIR)] = 0;
    }

    for i in 0..w {
        let x = if DIR > 0 { i } else { w - 1 - i };
        let v = read::<S>(src, x).to_fixed(ctx.map);
        let sum = v + i64::from(fwd.nxt0);
        let q = round_half_up(sum + i64::from(N::draw(&mut ctx.noise) * ctx.ampn));
        // Noise stays out of the diffused error.
        let err = (sum - (q << FRAC_BITS)) as i32;
        write(dst, x, D::from_code(clamp_code(q, ctx.max_code)));
        let level = ((v >> (FRAC_BITS - 8)) & 0xFF) as u8;
        K::diffuse::<DIR>(err, &mut fwd, cur, next, x + MARGIN, level);
    }

    K::prepare_next_line(cur, at(last + MARGIN, DIR));
    *carry = [fwd.nxt0, fwd.nxt1];
}
