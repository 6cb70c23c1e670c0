//! Ostromoukhov variable error-diffusion coefficients.
//!
//! V. Ostromoukhov, "A Simple and Efficient Error-Diffusion Algorithm",
//! SIGGRAPH 2001. The published table covers intensities 0..=127 as
//! `[right, down-behind, down]`; 128..=255 mirror it around the middle.

/// One table row plus the reciprocal of its weight sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OstroEntry {
    /// Weight towards the next pixel on the current row.
    pub right: u32,
    /// Weight towards the previous column on the next row.
    pub down_behind: u32,
    /// Weight straight down. Receives the rounding remainder when applied.
    pub down: u32,
    /// `2^32 / (right + down_behind + down)`, truncated.
    pub inv_sum: u32,
}

impl OstroEntry {
    /// Share of `err` for one weight, rounded to nearest.
    #[must_use]
    #[inline(always)]
    pub fn share(self, err: i32, weight: u32) -> i32 {
        let scaled = i64::from(err) * i64::from(weight) * i64::from(self.inv_sum);
        ((scaled + (1 << 31)) >> 32) as i32
    }
}

#[rustfmt::skip]
const PUBLISHED: [[u32; 3]; 128] = [
    [13, 0, 5], [13, 0, 5], [21, 0, 10], [7, 0, 4],
    [8, 0, 5], [47, 3, 28], [23, 3, 13], [15, 3, 8],
    [22, 6, 11], [43, 15, 20], [7, 3, 3], [501, 224, 211],
    [249, 116, 103], [165, 80, 67], [123, 62, 49], [489, 256, 191],
    [81, 44, 31], [483, 272, 181], [60, 35, 22], [53, 32, 19],
    [237, 148, 83], [471, 304, 161], [3, 2, 1], [481, 314, 185],
    [354, 226, 155], [1389, 866, 685], [227, 138, 125], [267, 158, 163],
    [327, 188, 220], [61, 34, 45], [627, 338, 505], [1227, 638, 1075],
    [20, 10, 19], [1937, 1000, 1767], [977, 520, 855], [657, 360, 551],
    [71, 40, 57], [2005, 1160, 1539], [337, 200, 247], [2039, 1240, 1425],
    [257, 160, 171], [691, 440, 437], [1045, 680, 627], [301, 200, 171],
    [177, 120, 95], [2141, 1480, 1083], [1079, 760, 513], [725, 520, 323],
    [137, 100, 57], [2209, 1640, 855], [53, 40, 19], [2243, 1720, 741],
    [565, 440, 171], [759, 600, 209], [1147, 920, 285], [2311, 1880, 513],
    [97, 80, 19], [335, 280, 57], [1181, 1000, 171], [793, 680, 95],
    [599, 520, 57], [2413, 2120, 171], [405, 360, 19], [2447, 2200, 57],
    [11, 10, 0], [158, 151, 3], [178, 179, 7], [1030, 1091, 63],
    [248, 277, 21], [318, 375, 35], [458, 571, 63], [878, 1159, 147],
    [5, 7, 1], [172, 181, 37], [97, 76, 22], [72, 41, 17],
    [119, 47, 29], [4, 1, 1], [4, 1, 1], [4, 1, 1],
    [4, 1, 1], [4, 1, 1], [4, 1, 1], [4, 1, 1],
    [4, 1, 1], [4, 1, 1], [65, 18, 17], [95, 29, 26],
    [185, 62, 53], [30, 11, 9], [35, 14, 11], [85, 37, 28],
    [55, 26, 19], [80, 41, 29], [155, 86, 59], [5, 3, 2],
    [5, 3, 2], [5, 3, 2], [5, 3, 2], [5, 3, 2],
    [5, 3, 2], [5, 3, 2], [5, 3, 2], [5, 3, 2],
    [5, 3, 2], [5, 3, 2], [5, 3, 2], [5, 3, 2],
    [305, 176, 119], [155, 86, 59], [105, 56, 39], [80, 41, 29],
    [65, 32, 23], [55, 26, 19], [335, 152, 113], [85, 37, 28],
    [115, 48, 37], [35, 14, 11], [355, 136, 109], [30, 11, 9],
    [365, 128, 107], [185, 62, 53], [25, 8, 7], [95, 29, 26],
    [385, 112, 103], [65, 18, 17], [395, 104, 101], [4, 1, 1],
];

/// Full 256-entry table indexed by 8-bit intensity.
pub static OSTROMOUKHOV: [OstroEntry; 256] = build_table();

const fn build_table() -> [OstroEntry; 256] {
    let mut table = [OstroEntry {
        right: 0,
        down_behind: 0,
        down: 0,
        inv_sum: 0,
    }; 256];
    let mut level = 0;
    while level < 256 {
        let src = if level < 128 { level } else { 255 - level };
        let [right, down_behind, down] = PUBLISHED[src];
        let sum = (right + down_behind + down) as u64;
        table[level] = OstroEntry {
            right,
            down_behind,
            down,
            inv_sum: ((1_u64 << 32) / sum) as u32,
        };
        level += 1;
    }
    table
}
