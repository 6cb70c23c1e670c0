//! Error accumulator scratch lines and their pool.
//!
//! Each line holds `width + 2 * MARGIN` cells; pixel `x` lives at cell
//! `x + MARGIN`, so a kernel reaching two pixels sideways never leaves the
//! line. Cells hold errors with [`crate::scale::FRAC_BITS`] fractional bits.

use std::sync::{Mutex, PoisonError};

use tr_core::error::ResourceError;

/// Spare cells on each side of a line.
pub const MARGIN: usize = 2;

/// Scratch state of one error-diffusion walk.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    width: usize,
    nbr_lines: usize,
    cells: Vec<i32>,
    carry: [i32; 2],
}

/// Lines seen by the kernel while processing row `y`.
pub struct Lines<'a> {
    /// Error arriving on row `y`; refilled with error for row `y + 1` (one-line
    /// kernels) or `y + 2` (two-line kernels) as it is consumed.
    pub cur: &'a mut [i32],
    /// Error for row `y + 1` on two-line kernels, empty otherwise.
    pub next: &'a mut [i32],
    /// Forward registers left over from the previous row.
    pub carry: &'a mut [i32; 2],
}

impl ErrorAccumulator {
    /// Cells per line.
    #[must_use]
    #[inline(always)]
    pub fn line_len(&self) -> usize {
        self.width + 2 * MARGIN
    }

    #[must_use]
    pub fn nbr_lines(&self) -> usize {
        self.nbr_lines
    }

    /// Resizes for `width` pixels and `nbr_lines` lines, all zero.
    ///
    /// # Errors
    /// Returns [`ResourceError::ScratchAllocation`] when the memory cannot be
    /// reserved.
    pub fn reset(&mut self, width: usize, nbr_lines: usize) -> Result<(), ResourceError> {
        let cells = (width + 2 * MARGIN) * nbr_lines;
        self.cells.clear();
        if self.cells.capacity() < cells {
            self.cells
                .try_reserve_exact(cells)
                .map_err(|_| ResourceError::ScratchAllocation { cells })?;
            log::debug!("error accumulator grown to {cells} cells");
        }
        self.cells.resize(cells, 0);
        self.width = width;
        self.nbr_lines = nbr_lines;
        self.carry = [0; 2];
        Ok(())
    }

    /// Splits the buffer for row `y`. Two-line buffers swap roles every row.
    pub fn lines(&mut self, y: usize) -> Lines<'_> {
        let len = self.line_len();
        let total = self.cells.len();
        let (first, rest) = self.cells.split_at_mut(len.min(total));
        let (cur, next) = if self.nbr_lines < 2 {
            (first, &mut rest[..0])
        } else if y & 1 == 0 {
            (first, &mut rest[..len])
        } else {
            (&mut rest[..len], first)
        };
        Lines {
            cur,
            next,
            carry: &mut self.carry,
        }
    }

    /// Whole buffer, for inspection.
    #[must_use]
    pub fn cells(&self) -> &[i32] {
        &self.cells
    }
}

/// Reusable accumulators shared by concurrent `process_plane` calls.
///
/// A checkout owns its buffer exclusively and hands it back on drop.
#[derive(Debug, Default)]
pub struct AccumulatorPool {
    free: Mutex<Vec<ErrorAccumulator>>,
}

impl AccumulatorPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a zeroed accumulator sized for `width` and `nbr_lines`.
    ///
    /// # Errors
    /// Returns [`ResourceError::ScratchAllocation`] if the buffer cannot grow.
    ///
    /// # Example
    /// ```
    /// use tr_dither::accumulator::AccumulatorPool;
    /// let pool = AccumulatorPool::new();
    /// {
    ///     let acc = pool.checkout(64, 2).unwrap();
    ///     assert_eq!(acc.line_len(), 68);
    /// }
    /// assert_eq!(pool.idle(), 1);
    /// ```
    pub fn checkout(&self, width: usize, nbr_lines: usize) -> Result<Checkout<'_>, ResourceError> {
        // A poisoned lock only ever guards plain scratch memory.
        let recycled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let mut acc = recycled.unwrap_or_default();
        acc.reset(width, nbr_lines)?;
        Ok(Checkout { pool: self, acc })
    }

    /// Accumulators waiting for reuse.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn give_back(&self, acc: ErrorAccumulator) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(acc);
    }
}

/// Scoped ownership of one pooled accumulator.
pub struct Checkout<'a> {
    pool: &'a AccumulatorPool,
    acc: ErrorAccumulator,
}

impl std::ops::Deref for Checkout<'_> {
    type Target = ErrorAccumulator;

    fn deref(&self) -> &Self::Target {
        &self.acc
    }
}

impl std::ops::DerefMut for Checkout<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.acc
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.acc));
    }
}
