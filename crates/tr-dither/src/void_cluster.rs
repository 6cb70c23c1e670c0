//! Void-and-cluster rank matrices (Ulichney, 1993).
//!
//! Ranks are generated once per size when a pattern set is built. The result
//! is deterministic: the initial binary pattern is scattered with the plane
//! noise LCG from a fixed seed, and ties always resolve to the lowest index.

use crate::noise::NoiseGenerator;

const SIGMA: f64 = 1.5;
const INITIAL_SEED: u32 = 0x5EED_0001;

/// Toroidal Gaussian energy field over a binary pattern.
struct EnergyField {
    size: usize,
    kernel: Vec<f64>,
    energy: Vec<f64>,
    ones: Vec<bool>,
}

impl EnergyField {
    fn new(size: usize) -> Self {
        let area = size * size;
        let two_sigma_sq = 2.0 * SIGMA * SIGMA;
        let kernel = (0..area)
            .map(|i| {
                let dx = wrap_dist(i % size, size) as f64;
                let dy = wrap_dist(i / size, size) as f64;
                (-(dx * dx + dy * dy) / two_sigma_sq).exp()
            })
            .collect();
        Self {
            size,
            kernel,
            energy: vec![0.0; area],
            ones: vec![false; area],
        }
    }

    fn set(&mut self, pos: usize, on: bool) {
        if self.ones[pos] == on {
            return;
        }
        self.ones[pos] = on;
        let sign = if on { 1.0 } else { -1.0 };
        let n = self.size;
        let (px, py) = (pos % n, pos / n);
        for y in 0..n {
            let dy = (y + n - py) % n;
            for x in 0..n {
                let dx = (x + n - px) % n;
                self.energy[y * n + x] += sign * self.kernel[dy * n + dx];
            }
        }
    }

    /// Set pixel with the highest energy.
    fn tightest_cluster(&self) -> Option<usize> {
        self.extreme(true, |a, b| a > b)
    }

    /// Empty pixel with the lowest energy.
    fn largest_void(&self) -> Option<usize> {
        self.extreme(false, |a, b| a < b)
    }

    fn extreme(&self, on: bool, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, (&e, &bit)) in self.energy.iter().zip(&self.ones).enumerate() {
            if bit != on {
                continue;
            }
            if best.is_none_or(|(_, b)| better(e, b)) {
                best = Some((i, e));
            }
        }
        best.map(|(i, _)| i)
    }
}

#[inline(always)]
fn wrap_dist(d: usize, size: usize) -> usize {
    d.min(size - d)
}

/// Rank matrix of `size × size` (row-major). Every rank in `0..size²`
/// appears exactly once.
///
/// # Example
/// ```
/// use tr_dither::void_cluster::rank_matrix;
/// let ranks = rank_matrix(8);
/// let mut sorted = ranks.clone();
/// sorted.sort_unstable();
/// assert!(sorted.iter().enumerate().all(|(i, &r)| r as usize == i));
/// ```
#[must_use]
pub fn rank_matrix(size: usize) -> Vec<u32> {
    let area = size * size;
    if area <= 1 {
        return vec![0; area];
    }

    let mut field = EnergyField::new(size);
    let mut noise = NoiseGenerator::new(INITIAL_SEED);
    let initial = (area / 10).max(1);
    let mut placed = 0;
    while placed < initial {
        noise.next_byte();
        let pos = (noise.state() >> 8) as usize % area;
        if !field.ones[pos] {
            field.set(pos, true);
            placed += 1;
        }
    }

    // Phase 0: move clusters into voids until the pattern settles.
    for _ in 0..area * 4 {
        let Some(cluster) = field.tightest_cluster() else {
            break;
        };
        field.set(cluster, false);
        let Some(void) = field.largest_void() else {
            field.set(cluster, true);
            break;
        };
        field.set(void, true);
        if void == cluster {
            break;
        }
    }

    let mut ranks = vec![0_u32; area];
    let settled_energy = field.energy.clone();
    let settled_ones = field.ones.clone();

    // Phase 1: rank the initial dots by removing clusters.
    let mut rank = initial;
    while rank > 0 {
        let Some(cluster) = field.tightest_cluster() else {
            break;
        };
        rank -= 1;
        field.set(cluster, false);
        ranks[cluster] = rank as u32;
    }

    // Phase 2: fill the largest voids up to a full pattern.
    field.energy = settled_energy;
    field.ones = settled_ones;
    for rank in initial..area {
        let Some(void) = field.largest_void() else {
            break;
        };
        field.set(void, true);
        ranks[void] = rank as u32;
    }
    ranks
}
