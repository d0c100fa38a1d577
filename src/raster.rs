//! In-memory single-band rasters.
//!
//! A cell is `Some(value)` when present and `None` for no-data, so a real
//! zero is never confused with a hole.

use crate::alignment::Alignment;
use crate::casting::{isize_to_usize, usize_to_isize};
use crate::error::{MosaicError, Result};
use crate::geometry::{Extent, SnapType};

/// A grid of optional `f32` cells laid out on an [`Alignment`], row-major from the top row.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub alignment: Alignment,
    pub cells: Vec<Option<f32>>,
}

impl Raster {
    /// All cells absent.
    #[must_use]
    pub fn empty(alignment: Alignment) -> Self {
        Self {
            cells: vec![None; alignment.cell_count()],
            alignment,
        }
    }

    /// # Errors
    /// Returns [`MosaicError::InvalidLayout`] if `cells` does not hold exactly
    /// one entry per grid cell.
    pub fn from_cells(alignment: Alignment, cells: Vec<Option<f32>>) -> Result<Self> {
        if cells.len() != alignment.cell_count() {
            return Err(MosaicError::InvalidLayout(format!(
                "{} cells for a {}x{} grid",
                cells.len(),
                alignment.nrow,
                alignment.ncol
            )));
        }
        Ok(Self { alignment, cells })
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.alignment.nrow || col >= self.alignment.ncol {
            return None;
        }
        self.cells[self.alignment.cell_index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: Option<f32>) {
        if row < self.alignment.nrow && col < self.alignment.ncol {
            let idx = self.alignment.cell_index(row, col);
            self.cells[idx] = value;
        }
    }

    /// Value of the cell containing `(x, y)`, if any.
    #[must_use]
    pub fn value_at(&self, x: f64, y: f64) -> Option<f32> {
        self.alignment
            .cell_at(x, y)
            .and_then(|cell| self.cells[cell])
    }

    #[must_use]
    pub fn present_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Cells covering `extent`, snapped onto this raster's lattice.
    #[must_use]
    pub fn crop(&self, extent: &Extent, snap: SnapType) -> Option<Raster> {
        let target = self.alignment.crop(extent, snap)?;
        let mut out = Raster::empty(target);
        out.overlay_first_writer(self);
        Some(out)
    }

    /// Replace the metadata, keeping every cell value at the same index.
    ///
    /// No resampling happens; `alignment` must have the same row and column counts.
    #[must_use]
    pub fn with_alignment(self, alignment: Alignment) -> Raster {
        debug_assert_eq!(
            (alignment.nrow, alignment.ncol),
            (self.alignment.nrow, self.alignment.ncol)
        );
        Raster {
            alignment,
            cells: self.cells,
        }
    }

    /// Copy `other`'s present cells into cells that are still absent here.
    ///
    /// Cells already present are never overwritten. `other` must share this
    /// raster's resolution; its position is rounded onto this lattice.
    /// Returns how many cells were written.
    pub fn overlay_first_writer(&mut self, other: &Raster) -> usize {
        let (dcol, drow) = self.alignment.lattice_offset(&other.alignment);
        let nrow = usize_to_isize(self.alignment.nrow);
        let ncol = usize_to_isize(self.alignment.ncol);
        let mut written = 0;

        for src_row in 0..other.alignment.nrow {
            let dst_row = usize_to_isize(src_row) + drow;
            if dst_row >= nrow {
                break;
            }
            let Some(row) = isize_to_usize(dst_row) else {
                continue;
            };
            for src_col in 0..other.alignment.ncol {
                let dst_col = usize_to_isize(src_col) + dcol;
                if dst_col >= ncol {
                    break;
                }
                let Some(col) = isize_to_usize(dst_col) else {
                    continue;
                };
                let Some(value) = other.cells[other.alignment.cell_index(src_row, src_col)] else {
                    continue;
                };
                let idx = self.alignment.cell_index(row, col);
                if self.cells[idx].is_none() {
                    self.cells[idx] = Some(value);
                    written += 1;
                }
            }
        }
        written
    }
}
