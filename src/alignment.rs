//! Regular raster lattices.
//!
//! An [`Alignment`] is an origin, a cell size and row/column counts. Row 0 is
//! the top (`ymax`) row and cells are numbered row-major, matching the layout
//! of a GeoTIFF strip.

use crate::casting::{isize_to_f64, isize_to_usize, usize_to_f64, usize_to_isize};
use crate::geometry::{Extent, SnapType};

/// A regular grid: extent plus cell size and counts.
///
/// Copied freely; nothing holds a reference to another raster's alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub xmin: f64,
    pub ymin: f64,
    pub xres: f64,
    pub yres: f64,
    pub nrow: usize,
    pub ncol: usize,
    /// EPSG code, if known
    pub crs: Option<i32>,
}

/// Column/row index range on an alignment's lattice, relative to its
/// top-left cell. Bounds may fall outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    col0: isize,
    col1: isize,
    row0: isize,
    row1: isize,
}

impl Alignment {
    #[must_use]
    pub fn new(
        xmin: f64,
        ymin: f64,
        nrow: usize,
        ncol: usize,
        xres: f64,
        yres: f64,
        crs: Option<i32>,
    ) -> Self {
        Self {
            xmin,
            ymin,
            xres,
            yres,
            nrow,
            ncol,
            crs,
        }
    }

    #[inline]
    #[must_use]
    pub fn xmax(&self) -> f64 {
        self.xmin + usize_to_f64(self.ncol) * self.xres
    }

    #[inline]
    #[must_use]
    pub fn ymax(&self) -> f64 {
        self.ymin + usize_to_f64(self.nrow) * self.yres
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        Extent::new(self.xmin, self.ymin, self.xmax(), self.ymax()).with_crs(self.crs)
    }

    #[inline]
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.nrow * self.ncol
    }

    #[inline]
    #[must_use]
    pub fn cell_index(&self, row: usize, col: usize) -> usize {
        row * self.ncol + col
    }

    #[inline]
    #[must_use]
    pub fn row_col(&self, cell: usize) -> (usize, usize) {
        (cell / self.ncol, cell % self.ncol)
    }

    #[must_use]
    pub fn x_center(&self, col: usize) -> f64 {
        self.xmin + (usize_to_f64(col) + 0.5) * self.xres
    }

    #[must_use]
    pub fn y_center(&self, row: usize) -> f64 {
        self.ymax() - (usize_to_f64(row) + 0.5) * self.yres
    }

    /// Column containing `x`. The right edge of the grid belongs to the last column.
    #[must_use]
    pub fn col_of(&self, x: f64) -> Option<usize> {
        cell_along(x - self.xmin, self.xres, self.ncol)
    }

    /// Row containing `y`. The bottom edge of the grid belongs to the last row.
    #[must_use]
    pub fn row_of(&self, y: f64) -> Option<usize> {
        cell_along(self.ymax() - y, self.yres, self.nrow)
    }

    #[must_use]
    pub fn cell_at(&self, x: f64, y: f64) -> Option<usize> {
        Some(self.cell_index(self.row_of(y)?, self.col_of(x)?))
    }

    #[must_use]
    pub fn cell_extent(&self, cell: usize) -> Extent {
        let (row, col) = self.row_col(cell);
        let xmin = self.xmin + usize_to_f64(col) * self.xres;
        let ymax = self.ymax() - usize_to_f64(row) * self.yres;
        Extent::new(xmin, ymax - self.yres, xmin + self.xres, ymax).with_crs(self.crs)
    }

    fn span(&self, extent: &Extent, snap: SnapType) -> Span {
        let top = self.ymax();
        Span {
            col0: snap.lower((extent.xmin - self.xmin) / self.xres),
            col1: snap.upper((extent.xmax - self.xmin) / self.xres),
            row0: snap.lower((top - extent.ymax) / self.yres),
            row1: snap.upper((top - extent.ymin) / self.yres),
        }
    }

    /// Rebuild on the same lattice from a span of lattice indices.
    fn with_span(&self, col0: isize, col1: isize, row0: isize, row1: isize) -> Alignment {
        let top = self.ymax() - isize_to_f64(row0) * self.yres;
        let nrow = isize_to_usize(row1 - row0).unwrap_or(0);
        let ncol = isize_to_usize(col1 - col0).unwrap_or(0);
        Alignment {
            xmin: self.xmin + isize_to_f64(col0) * self.xres,
            ymin: top - usize_to_f64(nrow) * self.yres,
            nrow,
            ncol,
            ..*self
        }
    }

    /// Grow this alignment until it covers `extent`, staying on the lattice.
    ///
    /// The result always contains the original grid; `snap` decides how a
    /// boundary that falls mid-cell is rounded.
    #[must_use]
    pub fn extend(&self, extent: &Extent, snap: SnapType) -> Alignment {
        let s = self.span(extent, snap);
        self.with_span(
            s.col0.min(0),
            s.col1.max(usize_to_isize(self.ncol)),
            s.row0.min(0),
            s.row1.max(usize_to_isize(self.nrow)),
        )
    }

    /// Shrink this alignment to the cells covering `extent`, staying on the lattice.
    ///
    /// Returns `None` when `extent` does not overlap the grid. A query narrower
    /// than one cell still yields one cell.
    #[must_use]
    pub fn crop(&self, extent: &Extent, snap: SnapType) -> Option<Alignment> {
        if !self.extent().overlaps(extent) {
            return None;
        }
        let s = self.span(extent, snap);
        let ncol = usize_to_isize(self.ncol);
        let nrow = usize_to_isize(self.nrow);

        let (col0, col1) = clamp_range(s.col0, s.col1, ncol);
        let (row0, row1) = clamp_range(s.row0, s.row1, nrow);
        Some(self.with_span(col0, col1, row0, row1))
    }

    /// Integer `(col, row)` offset of `other`'s top-left cell on this lattice.
    ///
    /// Cell `(r, c)` of `other` lands on cell `(r + row, c + col)` here.
    /// Only meaningful when both share a resolution.
    #[must_use]
    pub fn lattice_offset(&self, other: &Alignment) -> (isize, isize) {
        use crate::casting::f64_to_lattice;
        (
            f64_to_lattice((other.xmin - self.xmin) / self.xres),
            f64_to_lattice((self.ymax() - other.ymax()) / self.yres),
        )
    }
}

fn cell_along(offset: f64, res: f64, count: usize) -> Option<usize> {
    let idx = SnapType::Out.lower(offset / res);
    let count = usize_to_isize(count);
    if idx == count && offset / res <= isize_to_f64(count) + crate::geometry::LATTICE_EPSILON {
        return isize_to_usize(count - 1);
    }
    if idx < 0 || idx >= count {
        return None;
    }
    isize_to_usize(idx)
}

fn clamp_range(lo: isize, hi: isize, count: isize) -> (isize, isize) {
    let lo = lo.clamp(0, (count - 1).max(0));
    let hi = hi.clamp(0, count);
    if hi <= lo {
        (lo, (lo + 1).min(count))
    } else {
        (lo, hi)
    }
}
