//! The dithering engine: validated configuration, prebuilt tables and one
//! routine chosen up front, applied plane by plane.

use tr_core::config::{DitherConfig, DitherMode};
use tr_core::error::{ConfigError, ProcessError};
use tr_core::format::PlaneRole;

use crate::accumulator::AccumulatorPool;
use crate::noise::{NoiseGenerator, NoiseShape, Rectangular, Triangular};
use crate::pattern::{DitherPattern, PatternSet};
use crate::quasirandom::SequenceFlags;
use crate::sample::{PlaneMut, PlaneRef, check_geometry};
use crate::scale::ScaleMap;
use crate::scanline::{Routine, ScanContext, select};

/// Amplitude units per destination LSB.
const AMPLITUDE_UNIT: f64 = 256.0;

/// Bit-depth converter for one configuration.
///
/// Immutable after construction apart from the accumulator pool, so a single
/// engine can serve many threads, each working on its own (frame, plane).
///
/// # Example
/// ```
/// use tr_core::config::{DitherConfig, DitherMode};
/// use tr_core::format::{ColorFamily, SampleFormat};
/// use tr_dither::{DitherEngine, PlaneMut, PlaneRef};
///
/// let cfg = DitherConfig {
///     src: SampleFormat::int(8, true),
///     dst: SampleFormat::int(8, true),
///     color_family: ColorFamily::Gray,
///     plane_count: 1,
///     mode: DitherMode::Fast,
///     ..DitherConfig::default()
/// };
/// let engine = DitherEngine::new(cfg).unwrap();
/// let src = [1_u8, 2, 3, 4];
/// let mut dst = [0_u8; 4];
/// engine
///     .process_plane(PlaneMut::new(&mut dst, 2), PlaneRef::new(&src, 2), 2, 2, 0, 0)
///     .unwrap();
/// assert_eq!(dst, src);
/// ```
#[derive(Debug)]
pub struct DitherEngine {
    config: DitherConfig,
    patterns: PatternSet,
    maps: [ScaleMap; 2],
    ampo: i32,
    ampn: i32,
    max_code: i32,
    shift_left: u32,
    shift_right: u32,
    routine: Routine,
    pool: AccumulatorPool,
}

impl DitherEngine {
    /// Validates `config` and builds every table the routines need.
    ///
    /// Construction is all-or-nothing: on error nothing is kept.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for an unsupported format, a plane count
    /// outside 1..=4, a bad pattern size or an out-of-range amplitude.
    pub fn new(config: DitherConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let patterns = PatternSet::build(
            config.mode,
            config.pattern_size,
            config.tpdf_output,
            config.dynamic,
        )?;
        let maps = [PlaneRole::Luma, PlaneRole::Chroma]
            .map(|role| ScaleMap::between(config.src, config.dst, role));

        let noise_scale = if config.tpdf_noise {
            Triangular::AMPLITUDE_SCALE
        } else {
            Rectangular::AMPLITUDE_SCALE
        };
        let ampo = (config.ampo * AMPLITUDE_UNIT).round() as i32;
        let ampn = (config.ampn * AMPLITUDE_UNIT * noise_scale).round() as i32;

        let src_bits = u32::from(config.src.bits);
        let dst_bits = u32::from(config.dst.bits);
        let max_code = if config.dst.is_float() {
            0
        } else {
            config.dst.max_level()
        };

        let routine = select(&config);
        log::debug!(
            "dither engine: {} -> {} bits, mode {}, routine {:?}, {} pattern variant(s)",
            config.src.bits,
            config.dst.bits,
            config.mode,
            routine,
            patterns.len()
        );
        if config.dst.is_float()
            && config.mode != DitherMode::Fast
            && !config.src.same_numbers(config.dst)
        {
            log::warn!(
                "float destination: mode {} and its amplitudes have no effect",
                config.mode
            );
        }

        Ok(Self {
            config,
            patterns,
            maps,
            ampo,
            ampn,
            max_code,
            shift_left: dst_bits.saturating_sub(src_bits),
            shift_right: src_bits.saturating_sub(dst_bits),
            routine,
            pool: AccumulatorPool::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DitherConfig {
        &self.config
    }

    /// Threshold pattern used for `frame_index`.
    #[must_use]
    pub fn pattern(&self, frame_index: u32) -> &DitherPattern {
        self.patterns.for_frame(frame_index)
    }

    /// `(gain, offset)` applied to planes of `role`.
    #[must_use]
    pub fn gain_offset(&self, role: PlaneRole) -> (f64, f64) {
        let map = &self.maps[role.index()];
        (map.gain, map.offset)
    }

    /// Name of the scanline routine picked at construction.
    #[must_use]
    pub fn routine_name(&self) -> &'static str {
        self.routine.name()
    }

    /// Converts one plane of `width` × `height` samples from `src` into `dst`.
    ///
    /// Rows are processed top to bottom. Output only depends on the
    /// configuration, `frame_index`, `plane_index` and the source samples.
    ///
    /// # Errors
    /// Returns [`ProcessError::PlaneIndex`] or a geometry error before any
    /// sample is written, and [`ProcessError::Resource`] when the error
    /// accumulator cannot be allocated.
    pub fn process_plane(
        &self,
        mut dst: PlaneMut<'_>,
        src: PlaneRef<'_>,
        width: usize,
        height: usize,
        frame_index: u32,
        plane_index: usize,
    ) -> Result<(), ProcessError> {
        let count = self.config.plane_count;
        if plane_index >= count {
            return Err(ProcessError::PlaneIndex {
                index: plane_index,
                count,
            });
        }
        let src_row_bytes = width * self.config.src.storage().bytes();
        let dst_row_bytes = width * self.config.dst.storage().bytes();
        check_geometry("source", src.data.len(), src.stride, src_row_bytes, height)?;
        check_geometry("destination", dst.data.len(), dst.stride, dst_row_bytes, height)?;
        if width == 0 || height == 0 {
            return Ok(());
        }

        let pattern = self.patterns.for_frame(frame_index);
        let mut ctx = ScanContext {
            y: 0,
            width,
            frame_index,
            plane_index,
            map: &self.maps[self.config.role(plane_index).index()],
            max_code: self.max_code,
            ampo: self.ampo,
            ampn: self.ampn,
            noise: NoiseGenerator::for_plane(
                frame_index,
                plane_index,
                self.config.static_noise,
                self.config.correlated_planes,
            ),
            pattern_row: pattern.row(0),
            sequence: SequenceFlags {
                dynamic: self.config.dynamic,
                correlated: self.config.correlated_planes,
                tpdf: self.config.tpdf_output,
            },
            shift_left: self.shift_left,
            shift_right: self.shift_right,
        };

        let rows = Rows {
            src,
            src_row_bytes,
            dst_row_bytes,
            height,
            pattern,
        };
        match self.routine {
            Routine::Scan { run, .. } => rows.walk(&mut ctx, &mut dst, run),
            Routine::Diffuse { run, nbr_lines, .. } => {
                let mut acc = self.pool.checkout(width, nbr_lines)?;
                rows.walk(&mut ctx, &mut dst, |ctx, s, d| run(ctx, &mut acc, s, d));
            }
        }
        Ok(())
    }
}

/// Row geometry of one `process_plane` call.
struct Rows<'a> {
    src: PlaneRef<'a>,
    src_row_bytes: usize,
    dst_row_bytes: usize,
    height: usize,
    pattern: &'a DitherPattern,
}

impl<'a> Rows<'a> {
    fn walk<F>(&self, ctx: &mut ScanContext<'a>, dst: &mut PlaneMut<'_>, mut row: F)
    where
        F: FnMut(&mut ScanContext<'a>, &[u8], &mut [u8]),
    {
        for y in 0..self.height {
            ctx.y = y;
            ctx.pattern_row = self.pattern.row(y);
            row(
                ctx,
                self.src.row(y, self.src_row_bytes),
                dst.row_mut(y, self.dst_row_bytes),
            );
            ctx.noise.end_of_line();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_core::format::{ColorFamily, SampleFormat};

    fn gray(src: SampleFormat, dst: SampleFormat, mode: DitherMode) -> DitherConfig {
        DitherConfig {
            src,
            dst,
            color_family: ColorFamily::Gray,
            plane_count: 1,
            mode,
            ..DitherConfig::default()
        }
    }

    fn full16_to_8(mode: DitherMode) -> DitherConfig {
        gray(SampleFormat::int(16, true), SampleFormat::int(8, true), mode)
    }

    fn to_bytes(samples: &[u16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    /// Runs a packed 16-bit plane into a packed 8-bit one.
    fn run(
        engine: &DitherEngine,
        src: &[u16],
        width: usize,
        height: usize,
        frame: u32,
        plane: usize,
    ) -> Vec<u8> {
        let bytes = to_bytes(src);
        let mut dst = vec![0_u8; width * height];
        engine
            .process_plane(
                PlaneMut::new(&mut dst, width),
                PlaneRef::new(&bytes, width * 2),
                width,
                height,
                frame,
                plane,
            )
            .unwrap();
        dst
    }

    fn textured(width: usize, height: usize) -> Vec<u16> {
        (0..width * height)
            .map(|i| ((i * 7_919 + 12_345) % 65_536) as u16)
            .collect()
    }

    #[test]
    fn output_is_deterministic_in_every_mode() {
        let src = textured(37, 11);
        for mode in DitherMode::ALL {
            let cfg = DitherConfig {
                ampn: 0.75,
                dynamic: true,
                tpdf_noise: true,
                ..full16_to_8(mode)
            };
            let engine = DitherEngine::new(cfg).unwrap();
            let a = run(&engine, &src, 37, 11, 5, 0);
            let b = run(&engine, &src, 37, 11, 5, 0);
            assert_eq!(a, b, "{mode}");
        }
    }

    #[test]
    fn identical_formats_copy_bytes() {
        let fmt = SampleFormat::int(10, false);
        let engine = DitherEngine::new(gray(fmt, fmt, DitherMode::Fast)).unwrap();
        assert_eq!(engine.routine_name(), "copy");
        // 3 samples per row, 8-byte stride with padding
        let src: Vec<u8> = (0..24).collect();
        let mut dst = vec![0xAA_u8; 24];
        engine
            .process_plane(PlaneMut::new(&mut dst, 8), PlaneRef::new(&src, 8), 3, 3, 0, 0)
            .unwrap();
        for y in 0..3 {
            assert_eq!(&dst[y * 8..y * 8 + 6], &src[y * 8..y * 8 + 6]);
            assert_eq!(&dst[y * 8 + 6..y * 8 + 8], &[0xAA, 0xAA]);
        }
    }

    #[test]
    fn floyd_steinberg_flat_grey_keeps_the_mean() {
        let engine = DitherEngine::new(full16_to_8(DitherMode::FloydSteinberg)).unwrap();
        let (w, h) = (100, 100);
        let out = run(&engine, &vec![32_768; w * h], w, h, 0, 0);
        let ideal = 32_768.0 * 255.0 / 65_535.0;
        let mean = out.iter().map(|&v| f64::from(v)).sum::<f64>() / (w * h) as f64;
        assert!((mean - ideal).abs() < 0.01, "mean {mean}");
        assert!(out.iter().all(|&v| v == 127 || v == 128));
    }

    #[test]
    fn diffusion_kernels_keep_the_mean() {
        let (w, h) = (64, 64);
        for mode in [
            DitherMode::FilterLite,
            DitherMode::Stucki,
            DitherMode::Ostromoukhov,
        ] {
            let engine = DitherEngine::new(full16_to_8(mode)).unwrap();
            let out = run(&engine, &vec![20_000; w * h], w, h, 0, 0);
            let ideal = 20_000.0 * 255.0 / 65_535.0;
            let mean = out.iter().map(|&v| f64::from(v)).sum::<f64>() / (w * h) as f64;
            assert!((mean - ideal).abs() < 0.02, "{mode}: mean {mean}");
        }
    }

    #[test]
    fn atkinson_stays_within_one_code() {
        // At most 6/8 of half an LSB reaches a pixel, so a value just above
        // 127.5 never leaves {127, 128}.
        let (w, h) = (64, 64);
        let engine = DitherEngine::new(full16_to_8(DitherMode::Atkinson)).unwrap();
        let out = run(&engine, &vec![32_768; w * h], w, h, 0, 0);
        assert!(out.iter().all(|&v| v == 127 || v == 128));
    }

    /// 16-bit studio 25728 is exactly 100.5 in 8-bit studio: every pixel rounds
    /// up where the threshold is non-negative.
    fn bayer_scenario(dynamic: bool, frame: u32) {
        let cfg = DitherConfig {
            pattern_size: 8,
            dynamic,
            ..gray(
                SampleFormat::int(16, false),
                SampleFormat::int(8, false),
                DitherMode::Bayer,
            )
        };
        let engine = DitherEngine::new(cfg).unwrap();
        let out = run(&engine, &[25_728; 64], 8, 8, frame, 0);
        let pattern = engine.pattern(frame);
        for y in 0..8 {
            for x in 0..8 {
                let expected = 100 + u8::from(pattern.get(x, y) >= 0);
                assert_eq!(out[y * 8 + x], expected, "({x}, {y}) frame {frame}");
            }
        }
    }

    #[test]
    fn bayer_rows_follow_the_threshold_rows() {
        bayer_scenario(false, 0);
        bayer_scenario(false, 3);
        bayer_scenario(true, 0);
        bayer_scenario(true, 1);
        bayer_scenario(true, 2);
    }

    #[test]
    fn dynamic_patterns_rotate_per_frame() {
        let cfg = DitherConfig {
            pattern_size: 8,
            dynamic: true,
            ..full16_to_8(DitherMode::Bayer)
        };
        let engine = DitherEngine::new(cfg).unwrap();
        assert_eq!(engine.pattern(1), &engine.pattern(0).rotated());
        assert_eq!(engine.pattern(4), engine.pattern(0));
        let still = DitherEngine::new(DitherConfig {
            pattern_size: 8,
            ..full16_to_8(DitherMode::Bayer)
        })
        .unwrap();
        assert_eq!(still.pattern(1), still.pattern(0));
    }

    #[test]
    fn odd_rows_scan_right_to_left() {
        let w = 23;
        let row: Vec<u16> = textured(w, 1);
        let reversed: Vec<u16> = row.iter().rev().copied().collect();
        for mode in DitherMode::ALL.into_iter().filter(|m| m.is_error_diffusion()) {
            let engine = DitherEngine::new(full16_to_8(mode)).unwrap();
            let forward = run(&engine, &row, w, 1, 0, 0);
            // Row 0 holds exact 8-bit values (257 * k), so it leaves no error.
            let mut two_rows: Vec<u16> = (0..w).map(|x| 257 * (x as u16 * 11 % 256)).collect();
            two_rows.extend_from_slice(&reversed);
            let out = run(&engine, &two_rows, w, 2, 0, 0);
            for (x, &v) in out[..w].iter().enumerate() {
                assert_eq!(u16::from(v), x as u16 * 11 % 256, "{mode} row 0");
            }
            let mirrored: Vec<u8> = out[w..].iter().rev().copied().collect();
            assert_eq!(mirrored, forward, "{mode}");
        }
    }

    #[test]
    fn thin_planes_are_safe_in_every_mode() {
        for mode in DitherMode::ALL {
            let engine = DitherEngine::new(full16_to_8(mode)).unwrap();
            for (w, h) in [(1, 1), (1, 9), (9, 1), (2, 3)] {
                let src: Vec<u16> = (0..w * h).map(|i| 257 * (i as u16 * 37 % 256)).collect();
                let out = run(&engine, &src, w, h, 0, 0);
                let expected: Vec<u8> = (0..w * h).map(|i| (i * 37 % 256) as u8).collect();
                assert_eq!(out, expected, "{mode} {w}x{h}");
            }
            let mut none: [u8; 0] = [];
            engine
                .process_plane(PlaneMut::new(&mut none, 0), PlaneRef::new(&[], 0), 0, 4, 0, 0)
                .unwrap();
        }
    }

    #[test]
    fn out_of_range_values_clamp() {
        let engine = DitherEngine::new(gray(
            SampleFormat::int(16, false),
            SampleFormat::int(8, true),
            DitherMode::Stucki,
        ))
        .unwrap();
        let out = run(&engine, &[65_535, 0, 65_535, 0, 65_535, 0], 3, 2, 0, 0);
        assert_eq!(out, [255, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn noise_follows_frame_and_plane_flags() {
        let base = DitherConfig {
            ampn: 1.0,
            plane_count: 2,
            ..full16_to_8(DitherMode::Round)
        };
        let src = vec![25_830; 32 * 8];
        let engine = DitherEngine::new(base.clone()).unwrap();
        assert_ne!(run(&engine, &src, 32, 8, 0, 0), run(&engine, &src, 32, 8, 1, 0));
        assert_ne!(run(&engine, &src, 32, 8, 0, 0), run(&engine, &src, 32, 8, 0, 1));

        let fixed = DitherEngine::new(DitherConfig {
            static_noise: true,
            correlated_planes: true,
            ..base
        })
        .unwrap();
        let first = run(&fixed, &src, 32, 8, 0, 0);
        assert_eq!(first, run(&fixed, &src, 32, 8, 7, 0));
        assert_eq!(first, run(&fixed, &src, 32, 8, 7, 1));
    }

    #[test]
    fn planes_share_one_engine_across_threads() {
        let cfg = DitherConfig {
            ampn: 0.5,
            plane_count: 4,
            ..full16_to_8(DitherMode::Stucki)
        };
        let engine = DitherEngine::new(cfg).unwrap();
        let src = textured(48, 16);
        let expected: Vec<Vec<u8>> = (0..4).map(|p| run(&engine, &src, 48, 16, 2, p)).collect();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|p| {
                    let (engine, src) = (&engine, &src);
                    s.spawn(move || run(engine, src, 48, 16, 2, p))
                })
                .collect();
            for (p, h) in handles.into_iter().enumerate() {
                assert_eq!(h.join().unwrap(), expected[p], "plane {p}");
            }
        });
        assert!(engine.pool.idle() >= 1);
    }

    #[test]
    fn construction_rejects_bad_configs() {
        let bad_size = DitherConfig {
            pattern_size: 3,
            ..DitherConfig::default()
        };
        assert!(matches!(
            DitherEngine::new(bad_size),
            Err(ConfigError::InvalidPatternSize(3))
        ));
        let bad_amp = DitherConfig {
            ampo: -1.0,
            ..DitherConfig::default()
        };
        assert!(matches!(
            DitherEngine::new(bad_amp),
            Err(ConfigError::InvalidAmplitude { name: "ampo", .. })
        ));
        let bad_depth = DitherConfig {
            dst: SampleFormat::int(13, true),
            ..DitherConfig::default()
        };
        assert!(matches!(
            DitherEngine::new(bad_depth),
            Err(ConfigError::UnsupportedFormat { bits: 13, .. })
        ));
    }

    #[test]
    fn float_destination_is_a_plain_affine_map() {
        let engine = DitherEngine::new(gray(
            SampleFormat::int(8, true),
            SampleFormat::float(),
            DitherMode::FloydSteinberg,
        ))
        .unwrap();
        assert_eq!(engine.gain_offset(PlaneRole::Luma), (1.0 / 255.0, 0.0));
        let src = [0_u8, 51, 255];
        let mut dst = [0_u8; 12];
        engine
            .process_plane(PlaneMut::new(&mut dst, 12), PlaneRef::new(&src, 3), 3, 1, 0, 0)
            .unwrap();
        let values: Vec<f32> = dst
            .chunks(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert!((values[0] - 0.0).abs() < 1e-6);
        assert!((values[1] - 0.2).abs() < 1e-6);
        assert!((values[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn float_source_dithers_into_integers() {
        let engine = DitherEngine::new(gray(
            SampleFormat::float(),
            SampleFormat::int(10, true),
            DitherMode::Bayer,
        ))
        .unwrap();
        let src: Vec<u8> = [0.0_f32, 1.0, 2.0, -1.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let mut dst = [0_u8; 8];
        engine
            .process_plane(PlaneMut::new(&mut dst, 8), PlaneRef::new(&src, 16), 4, 1, 0, 0)
            .unwrap();
        let codes: Vec<u16> = dst
            .chunks(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(codes, [0, 1023, 1023, 0]);
    }

    #[test]
    fn bad_geometry_is_rejected_before_writing() {
        let engine = DitherEngine::new(full16_to_8(DitherMode::FloydSteinberg)).unwrap();
        let src = to_bytes(&[1_000; 8]);
        let mut dst = [9_u8; 7];
        let err = engine
            .process_plane(PlaneMut::new(&mut dst, 4), PlaneRef::new(&src, 8), 4, 2, 0, 0)
            .unwrap_err();
        assert!(matches!(err, ProcessError::BufferTooSmall { needed: 8, .. }));
        assert_eq!(dst, [9; 7]);

        let mut dst = [0_u8; 8];
        let err = engine
            .process_plane(PlaneMut::new(&mut dst, 4), PlaneRef::new(&src, 6), 4, 2, 0, 0)
            .unwrap_err();
        assert!(matches!(err, ProcessError::StrideTooSmall { .. }));

        let err = engine
            .process_plane(PlaneMut::new(&mut dst, 4), PlaneRef::new(&src, 8), 4, 2, 0, 1)
            .unwrap_err();
        assert!(matches!(err, ProcessError::PlaneIndex { index: 1, count: 1 }));
    }

    #[test]
    fn chroma_planes_use_their_own_range() {
        let engine = DitherEngine::new(DitherConfig {
            src: SampleFormat::int(16, false),
            dst: SampleFormat::int(8, false),
            mode: DitherMode::Round,
            ..DitherConfig::default()
        })
        .unwrap();
        // neutral chroma stays neutral, studio black stays black
        assert_eq!(run(&engine, &[32_768; 4], 4, 1, 0, 1), [128; 4]);
        assert_eq!(run(&engine, &[4_096; 4], 4, 1, 0, 0), [16; 4]);
    }
}
