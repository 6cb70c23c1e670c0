//! Ordered-dither threshold patterns.
//!
//! Patterns are square, power-of-two sized and read toroidally. Cells hold
//! thresholds in [-128, 127] (about [-256, 243] after the TPDF remap), with
//! 256 units per destination LSB at `ampo = 1`.

use tr_core::config::{DitherMode, MAX_PATTERN_SIZE};
use tr_core::error::ConfigError;

use crate::void_cluster::rank_matrix;

/// Added to the parent value for each cell of a 2×2 child block, indexed by
/// `(y & 1) * 2 + (x & 1)`.
const BAYER_QUADRANT: [i32; 4] = [0, 128, 192, 64];

// TPDF remap coefficients in Q15: x^2 and x^32 terms, summing to one so that
// the extreme cell doubles.
const TPDF_C2: i64 = 22_489;
const TPDF_C32: i64 = 32_768 - TPDF_C2;

/// One threshold matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DitherPattern {
    size: usize,
    cells: Vec<i16>,
}

impl DitherPattern {
    /// All-zero pattern: rounding only.
    #[must_use]
    pub fn flat(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Bayer matrix built by recursive doubling from a single cell.
    ///
    /// A size of 1 has no ordering to express and yields a flat pattern.
    ///
    /// # Example
    /// ```
    /// use tr_dither::pattern::DitherPattern;
    /// let p = DitherPattern::bayer(2);
    /// assert_eq!(p.row(0), &[-128, 0]);
    /// assert_eq!(p.row(1), &[64, -64]);
    /// ```
    #[must_use]
    pub fn bayer(size: usize) -> Self {
        if size <= 1 {
            return Self::flat(size);
        }
        let mut cells = vec![-128_i16];
        let mut side = 1;
        while side < size {
            let child = side * 2;
            let mut next = vec![0_i16; child * child];
            for y in 0..child {
                for x in 0..child {
                    let parent = i32::from(cells[(y / 2) * side + x / 2]);
                    let quadrant = BAYER_QUADRANT[(y & 1) * 2 + (x & 1)];
                    next[y * child + x] = (((parent + 128) >> 2) + quadrant - 128) as i16;
                }
            }
            cells = next;
            side = child;
        }
        Self { size, cells }
    }

    /// Void-and-cluster pattern: `rank * 256 / area - 128`.
    #[must_use]
    pub fn void_and_cluster(size: usize) -> Self {
        if size <= 1 {
            return Self::flat(size);
        }
        let area = size * size;
        let cells = rank_matrix(size)
            .into_iter()
            .map(|rank| (rank as usize * 256 / area) as i16 - 128)
            .collect();
        Self { size, cells }
    }

    #[must_use]
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row `y`, wrapped.
    #[must_use]
    #[inline(always)]
    pub fn row(&self, y: usize) -> &[i16] {
        let y = y & (self.size - 1);
        &self.cells[y * self.size..(y + 1) * self.size]
    }

    /// Threshold at `(x, y)`, wrapped.
    #[must_use]
    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> i16 {
        self.row(y)[x & (self.size - 1)]
    }

    /// Reshapes the uniform thresholds towards a triangular distribution.
    ///
    /// With `x = d / 128`, each cell becomes `d * (1 + c2·x² + c32·x³²)`, the
    /// low-order approximation of the inverse triangular CDF. Cells at ±128
    /// map to ±256.
    pub fn remap_tpdf(&mut self) {
        for cell in &mut self.cells {
            *cell = tpdf_remap(*cell);
        }
    }

    /// Quarter turn on the torus: `new(x, y) = old(y, -x)`.
    #[must_use]
    pub fn rotated(&self) -> Self {
        let n = self.size;
        let mask = n - 1;
        let mut cells = vec![0; n * n];
        for y in 0..n {
            for x in 0..n {
                cells[y * n + x] = self.get(y, n.wrapping_sub(x) & mask);
            }
        }
        Self { size: n, cells }
    }
}

/// Applies the TPDF polynomial to one cell.
#[must_use]
pub fn tpdf_remap(d: i16) -> i16 {
    let d = i64::from(d);
    let x = d << 8; // d / 128 in Q15
    let x2 = (x * x) >> 15;
    let x4 = (x2 * x2) >> 15;
    let x8 = (x4 * x4) >> 15;
    let x16 = (x8 * x8) >> 15;
    let x32 = (x16 * x16) >> 15;
    let corr = (TPDF_C2 * x2 + TPDF_C32 * x32) >> 15;
    (d + ((d * corr) >> 15)) as i16
}

/// Threshold variants for one engine: a single pattern, or four quarter-turns
/// cycled by frame index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    variants: Vec<DitherPattern>,
}

impl PatternSet {
    /// Builds the patterns for `mode`.
    ///
    /// Modes that do not read a pattern get a flat one so the ordered routine
    /// stays branch-free.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPatternSize`] when `pattern_size` is not a
    /// power of two dividing 32.
    ///
    /// # Example
    /// ```
    /// use tr_core::config::DitherMode;
    /// use tr_dither::pattern::PatternSet;
    /// let set = PatternSet::build(DitherMode::Bayer, 8, false, true).unwrap();
    /// assert_eq!(set.len(), 4);
    /// assert_eq!(set.for_frame(4), set.for_frame(0));
    /// ```
    pub fn build(
        mode: DitherMode,
        pattern_size: usize,
        tpdf: bool,
        dynamic: bool,
    ) -> Result<Self, ConfigError> {
        if !pattern_size.is_power_of_two() || MAX_PATTERN_SIZE % pattern_size != 0 {
            return Err(ConfigError::InvalidPatternSize(pattern_size));
        }
        let mut base = match mode {
            DitherMode::Bayer => DitherPattern::bayer(pattern_size),
            DitherMode::VoidAndCluster => DitherPattern::void_and_cluster(pattern_size),
            _ => DitherPattern::flat(pattern_size),
        };
        if tpdf {
            base.remap_tpdf();
        }
        let mut variants = vec![base];
        if dynamic && pattern_size > 1 && mode.uses_pattern() {
            for _ in 1..4 {
                let next = variants[variants.len() - 1].rotated();
                variants.push(next);
            }
        }
        Ok(Self { variants })
    }

    /// Pattern for `frame_index`.
    #[must_use]
    #[inline(always)]
    pub fn for_frame(&self, frame_index: u32) -> &DitherPattern {
        &self.variants[(frame_index & 3) as usize % self.variants.len()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL_4X4: [[i16; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

    const CANONICAL_8X8: [[i16; 8]; 8] = [
        [0, 32, 8, 40, 2, 34, 10, 42],
        [48, 16, 56, 24, 50, 18, 58, 26],
        [12, 44, 4, 36, 14, 46, 6, 38],
        [60, 28, 52, 20, 62, 30, 54, 22],
        [3, 35, 11, 43, 1, 33, 9, 41],
        [51, 19, 59, 27, 49, 17, 57, 25],
        [15, 47, 7, 39, 13, 45, 5, 37],
        [63, 31, 55, 23, 61, 29, 53, 21],
    ];

    #[test]
    fn bayer_4x4_matches_canonical_matrix() {
        let p = DitherPattern::bayer(4);
        for (y, row) in CANONICAL_4X4.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                assert_eq!(p.get(x, y), v * 16 - 128, "({x}, {y})");
            }
        }
    }

    #[test]
    fn bayer_8x8_matches_canonical_matrix() {
        let p = DitherPattern::bayer(8);
        for (y, row) in CANONICAL_8X8.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                assert_eq!(p.get(x, y), v * 4 - 128, "({x}, {y})");
            }
        }
    }

    #[test]
    fn bayer_32_uses_every_threshold_once() {
        let p = DitherPattern::bayer(32);
        let mut seen = vec![0_u32; 256];
        for y in 0..32 {
            for &c in p.row(y) {
                seen[(i32::from(c) + 128) as usize] += 1;
            }
        }
        // 1024 cells over 256 levels, each quarter-step level appears 4 times
        assert!(seen.iter().all(|&n| n == 4));
    }

    #[test]
    fn size_one_is_flat() {
        assert_eq!(DitherPattern::bayer(1).get(0, 0), 0);
        assert_eq!(DitherPattern::void_and_cluster(1).get(5, 9), 0);
    }

    #[test]
    fn access_wraps_toroidally() {
        let p = DitherPattern::bayer(8);
        assert_eq!(p.get(9, 17), p.get(1, 1));
        assert_eq!(p.row(8), p.row(0));
    }

    #[test]
    fn void_and_cluster_covers_full_range() {
        let p = DitherPattern::void_and_cluster(16);
        let mut values: Vec<i16> = (0..16).flat_map(|y| p.row(y).to_vec()).collect();
        values.sort_unstable();
        assert_eq!(values[0], -128);
        assert_eq!(values[255], 127);
    }

    #[test]
    fn tpdf_remap_doubles_extremes_and_keeps_centre() {
        assert_eq!(tpdf_remap(-128), -256);
        assert_eq!(tpdf_remap(0), 0);
        let r127 = tpdf_remap(127);
        assert!((236..=250).contains(&r127), "{r127}");
        // half amplitude lands near 2 - 2·sqrt(0.5) of the doubled range
        let r64 = f64::from(tpdf_remap(64)) / 128.0;
        assert!((r64 - 0.5858).abs() < 0.05, "{r64}");
    }

    #[test]
    fn tpdf_remap_is_monotonic() {
        let mut prev = tpdf_remap(-128);
        for d in -127..=127 {
            let cur = tpdf_remap(d);
            assert!(cur >= prev, "{d}");
            prev = cur;
        }
    }

    #[test]
    fn four_rotations_come_back_to_start() {
        let p = DitherPattern::bayer(8);
        let back = p.rotated().rotated().rotated().rotated();
        assert_eq!(back, p);
        assert_ne!(p.rotated(), p);
    }

    #[test]
    fn static_set_has_one_variant() {
        let set = PatternSet::build(DitherMode::Bayer, 8, false, false).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.for_frame(3), set.for_frame(0));
    }

    #[test]
    fn dynamic_set_cycles_by_frame() {
        let set = PatternSet::build(DitherMode::VoidAndCluster, 8, false, true).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.for_frame(1), &set.for_frame(0).rotated());
        assert_eq!(set.for_frame(6), set.for_frame(2));
    }

    #[test]
    fn flat_patterns_never_rotate() {
        for mode in [DitherMode::Round, DitherMode::Quasirandom, DitherMode::Stucki] {
            let set = PatternSet::build(mode, 8, false, true).unwrap();
            assert_eq!(set.len(), 1, "{mode}");
            assert_eq!(set.for_frame(1), &DitherPattern::flat(8));
        }
    }

    #[test]
    fn invalid_sizes_are_config_errors() {
        for size in [0, 3, 6, 64] {
            assert!(matches!(
                PatternSet::build(DitherMode::Bayer, size, false, false),
                Err(ConfigError::InvalidPatternSize(_))
            ));
        }
    }
}
