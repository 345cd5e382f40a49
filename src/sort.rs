//! Bucket sort of agents by cell, and the per-cell range table.
//!
//! Cell ids are small bounded integers, so a counting sort does the job in
//! `O(N + cells)`: histogram the keys, turn the histogram into exclusive
//! prefix offsets, then scatter each key/value pair to its offset. The sort
//! is stable, although nothing downstream depends on that.
//!
//! After the scatter, slot `c` of the offset array holds the end of cell `c`'s
//! run, and slot `c - 1` holds its start. [`CellTable::rebuild`] reads both in
//! one parallel pass over cells. Cells nobody occupies get the [`EMPTY_CELL`]
//! sentinel in both slots, which reads as an empty range.

use std::ops::Range;

use rayon::prelude::*;

use crate::agents::allocate_filled;
use crate::error::Result;

/// Sentinel stored in both `start` and `end` of an unoccupied cell.
pub const EMPTY_CELL: u32 = u32::MAX;

/// Sort `values` by `keys` into `sorted_keys`/`sorted_values`.
///
/// `counts` has one slot per possible key; every key must be smaller than
/// `counts.len()`. On return `counts[c]` is one past the last sorted slot of
/// key `c`, ready for [`CellTable::rebuild`].
pub fn sort_by_cell(
    keys: &[u32],
    values: &[u32],
    counts: &mut [u32],
    sorted_keys: &mut [u32],
    sorted_values: &mut [u32],
) {
    debug_assert_eq!(keys.len(), values.len());
    debug_assert_eq!(keys.len(), sorted_keys.len());
    debug_assert_eq!(keys.len(), sorted_values.len());

    // Histogram
    counts.fill(0);
    for &key in keys {
        counts[key as usize] += 1;
    }

    // Exclusive prefix sum
    let mut running = 0u32;
    for count in counts.iter_mut() {
        let here = *count;
        *count = running;
        running += here;
    }

    // Scatter
    for (&key, &value) in keys.iter().zip(values) {
        let slot = &mut counts[key as usize];
        let dest = *slot as usize;
        sorted_keys[dest] = key;
        sorted_values[dest] = value;
        *slot += 1;
    }
}

/// Half-open `[start, end)` ranges into the sorted agent array, one per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CellTable {
    /// First sorted slot of each cell, or [`EMPTY_CELL`].
    pub start: Vec<u32>,
    /// One past the last sorted slot of each cell, or [`EMPTY_CELL`].
    pub end: Vec<u32>,
}

impl CellTable {
    /// Table for `cell_count` cells, all empty.
    pub fn new(cell_count: usize) -> Result<Self> {
        Ok(Self {
            start: allocate_filled("cell start", cell_count, EMPTY_CELL)?,
            end: allocate_filled("cell end", cell_count, EMPTY_CELL)?,
        })
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.start.len()
    }

    /// Rebuild the table from the offsets [`sort_by_cell`] leaves in its
    /// `counts` array.
    pub fn rebuild(&mut self, cell_ends: &[u32]) {
        debug_assert_eq!(cell_ends.len(), self.cell_count());

        self.start
            .par_iter_mut()
            .zip(self.end.par_iter_mut())
            .enumerate()
            .for_each(|(cell, (start, end))| {
                let lo = if cell == 0 { 0 } else { cell_ends[cell - 1] };
                let hi = cell_ends[cell];
                if lo == hi {
                    *start = EMPTY_CELL;
                    *end = EMPTY_CELL;
                } else {
                    *start = lo;
                    *end = hi;
                }
            });
    }

    /// Sorted slots owned by `cell`; empty for unoccupied cells.
    #[inline]
    pub fn range(&self, cell: u32) -> Range<usize> {
        let start = self.start[cell as usize];
        if start == EMPTY_CELL {
            return 0..0;
        }
        start as usize..self.end[cell as usize] as usize
    }

    /// Total number of agents across all cell ranges.
    pub fn occupancy(&self) -> usize {
        (0..self.cell_count() as u32)
            .map(|cell| self.range(cell).len())
            .sum()
    }

    /// Number of cells holding at least one agent.
    pub fn occupied_cells(&self) -> usize {
        self.start.iter().filter(|&&s| s != EMPTY_CELL).count()
    }
}
