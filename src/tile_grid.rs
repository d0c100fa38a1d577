//! Tile layout of a dataset.
//!
//! A [`TileGrid`] partitions a rectangular domain into rows and columns of
//! equally sized tiles. Tile `index = row * ncol + col`, row 0 at the top.
//! Tiles that are part of the layout but have no data (outside the flight
//! boundary, for instance) are marked as not existing.

use crate::alignment::Alignment;
use crate::error::{MosaicError, Result};
use crate::geometry::projection::reproject_extent;
use crate::geometry::{Extent, SnapType};

/// Allowed slack, in tiles, when checking that tile extents form a regular layout.
const LAYOUT_TOLERANCE: f64 = 0.01;

/// Immutable tile layout: one lattice cell per tile plus an exists flag.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    layout: Alignment,
    exists: Vec<bool>,
}

impl TileGrid {
    /// # Errors
    /// Returns [`MosaicError::InvalidLayout`] if `exists` does not have one
    /// flag per layout cell.
    pub fn new(layout: Alignment, exists: Vec<bool>) -> Result<Self> {
        if exists.len() != layout.cell_count() {
            return Err(MosaicError::InvalidLayout(format!(
                "{} exists flags for {} tiles",
                exists.len(),
                layout.cell_count()
            )));
        }
        Ok(Self { layout, exists })
    }

    /// Layout where every tile has data.
    #[must_use]
    pub fn full(layout: Alignment) -> Self {
        Self {
            exists: vec![true; layout.cell_count()],
            layout,
        }
    }

    /// Build the grid from the extents listed in a tile layout file.
    ///
    /// The first extent sets the tile size. The union of all extents must
    /// divide into a whole number of tiles on both axes. Tiles not listed are
    /// marked as not existing.
    ///
    /// # Errors
    /// Returns [`MosaicError::InvalidLayout`] for an empty list, a zero-sized
    /// first tile, or extents that do not tile the domain evenly.
    pub fn from_tile_extents(extents: &[Extent]) -> Result<Self> {
        let Some(first) = extents.first() else {
            return Err(MosaicError::InvalidLayout("no tiles in layout".into()));
        };
        let (width, height) = (first.xspan(), first.yspan());
        if width <= 0.0 || height <= 0.0 {
            return Err(MosaicError::InvalidLayout(format!(
                "tile size {width} x {height} is not positive"
            )));
        }

        let full = extents.iter().fold(*first, |acc, e| acc.union(e));
        let ncol = whole_tiles(full.xspan() / width)?;
        let nrow = whole_tiles(full.yspan() / height)?;

        let layout = Alignment::new(full.xmin, full.ymin, nrow, ncol, width, height, first.crs);
        let mut exists = vec![false; layout.cell_count()];
        for e in extents {
            let c = e.center();
            if let Some(cell) = layout.cell_at(c.x, c.y) {
                exists[cell] = true;
            }
        }
        tracing::debug!(nrow, ncol, tiles = extents.len(), "Built tile grid from layout");
        Ok(Self { layout, exists })
    }

    #[must_use]
    pub fn layout(&self) -> &Alignment {
        &self.layout
    }

    #[must_use]
    pub fn crs(&self) -> Option<i32> {
        self.layout.crs
    }

    /// `alignment` read in the grid's CRS: an untagged tile takes the grid's
    /// CRS. `None` if the tile is tagged with a different CRS.
    #[must_use]
    pub fn conform_crs(&self, alignment: Alignment) -> Option<Alignment> {
        if alignment.extent().crs_conflicts(&self.domain()) {
            return None;
        }
        Some(Alignment {
            crs: alignment.crs.or(self.crs()),
            ..alignment
        })
    }

    /// Overall bounding extent of the grid.
    #[must_use]
    pub fn domain(&self) -> Extent {
        self.layout.extent()
    }

    #[must_use]
    pub fn nrow(&self) -> usize {
        self.layout.nrow
    }

    #[must_use]
    pub fn ncol(&self) -> usize {
        self.layout.ncol
    }

    /// Number of tile slots, existing or not.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.exists.len()
    }

    #[must_use]
    pub fn tiles_with_data(&self) -> usize {
        self.exists.iter().filter(|&&e| e).count()
    }

    #[must_use]
    pub fn should_exist(&self, index: usize) -> bool {
        self.exists.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn row_col(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.tile_count()).then(|| self.layout.row_col(index))
    }

    #[must_use]
    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.nrow() && col < self.ncol()).then(|| self.layout.cell_index(row, col))
    }

    /// Extent of an existing tile. `None` if out of range or the tile has no data.
    #[must_use]
    pub fn extent_of(&self, index: usize) -> Option<Extent> {
        self.should_exist(index).then(|| self.layout.cell_extent(index))
    }

    #[must_use]
    pub fn extent_of_row_col(&self, row: usize, col: usize) -> Option<Extent> {
        self.extent_of(self.index_of(row, col)?)
    }

    /// Human-readable tile name, `Col{col}_Row{row}`, 1-based and zero-padded.
    #[must_use]
    pub fn tile_name(&self, index: usize) -> Option<String> {
        let (row, col) = self.row_col(index)?;
        let widest = self.nrow().max(self.ncol()).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = (crate::casting::usize_to_f64(widest)).log10().ceil() as usize;
        Some(format!("Col{:0width$}_Row{:0width$}", col + 1, row + 1, width = width))
    }

    /// Tile slot whose area contains `(x, y)`, existing or not.
    ///
    /// Each tile owns its left and top edges; the right and bottom edges of
    /// the domain belong to the outermost tiles. Every point in the domain
    /// therefore has exactly one owner.
    #[must_use]
    pub fn tile_at(&self, x: f64, y: f64) -> Option<usize> {
        self.layout.cell_at(x, y)
    }

    /// True if `(x, y)` lies in tile `index`'s own area (see [`TileGrid::tile_at`]).
    #[must_use]
    pub fn owns(&self, index: usize, x: f64, y: f64) -> bool {
        self.tile_at(x, y) == Some(index)
    }

    /// Existing tiles overlapping `extent`, in row-major order.
    ///
    /// `extent` is reprojected into the grid's CRS first. An extent that
    /// misses the domain yields an empty iterator.
    ///
    /// # Errors
    /// Returns [`MosaicError::Projection`] if the extent cannot be reprojected.
    pub fn indices_overlapping(&self, extent: &Extent) -> Result<TileIndices<'_>> {
        let projected = reproject_extent(extent, self.crs())?;
        Ok(self.indices_overlapping_projected(&projected))
    }

    /// Same as [`TileGrid::indices_overlapping`] for an extent already in the grid's CRS.
    #[must_use]
    pub fn indices_overlapping_projected(&self, extent: &Extent) -> TileIndices<'_> {
        let Some(window) = self.layout.crop(extent, SnapType::Out) else {
            return TileIndices::empty(self);
        };
        let (col0, row0) = self.layout.lattice_offset(&window);
        let col0 = crate::casting::isize_to_usize(col0).unwrap_or(0);
        let row0 = crate::casting::isize_to_usize(row0).unwrap_or(0);
        TileIndices {
            grid: self,
            col0,
            col1: col0 + window.ncol,
            row1: row0 + window.nrow,
            row: row0,
            col: col0,
        }
    }

    /// All existing tiles, in index order.
    pub fn existing_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.exists
            .iter()
            .enumerate()
            .filter_map(|(i, &e)| e.then_some(i))
    }
}

fn whole_tiles(ratio: f64) -> Result<usize> {
    let rounded = ratio.round();
    if (ratio - rounded).abs() > LAYOUT_TOLERANCE || rounded < 1.0 {
        return Err(MosaicError::InvalidLayout(format!(
            "domain spans {ratio} tiles, not a whole number"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(rounded as usize)
}

/// Lazy row-major walk over the existing tiles in a window of the grid.
///
/// Cloning restarts from the clone's current position.
#[derive(Debug, Clone)]
pub struct TileIndices<'a> {
    grid: &'a TileGrid,
    col0: usize,
    col1: usize,
    row1: usize,
    row: usize,
    col: usize,
}

impl<'a> TileIndices<'a> {
    fn empty(grid: &'a TileGrid) -> Self {
        Self {
            grid,
            col0: 0,
            col1: 0,
            row1: 0,
            row: 0,
            col: 0,
        }
    }
}

impl Iterator for TileIndices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.row < self.row1 && self.col0 < self.col1 {
            let index = self.grid.layout.cell_index(self.row, self.col);
            self.col += 1;
            if self.col == self.col1 {
                self.col = self.col0;
                self.row += 1;
            }
            if self.grid.should_exist(index) {
                return Some(index);
            }
        }
        None
    }
}
