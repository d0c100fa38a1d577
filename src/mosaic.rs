//! Raster extent queries over a tiled dataset.
//!
//! [`MosaicAssembler`] composites every tile overlapping a query extent onto
//! one output lattice. The lattice comes from the first tile that decodes
//! (or from a supplied reference alignment), is grown to cover the query and
//! cropped back to it, always snapping outward. Later tiles are repaired
//! onto that lattice and merged first-writer-wins.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use mosaicrs::{Alignment, Extent, MosaicAssembler, QueryOptions, TileGrid};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grid = TileGrid::full(Alignment::new(0.0, 0.0, 2, 2, 500.0, 500.0, Some(32610)));
//!     let resolver = |i: usize| Some(PathBuf::from(format!("/data/csm/tile_{i}.tif")));
//!
//!     let mosaic = MosaicAssembler::new(&grid, resolver)
//!         .options(QueryOptions::default().with_threads(4))
//!         .query(&Extent::new(250.0, 250.0, 750.0, 750.0).with_crs(Some(32610)))?;
//!
//!     if let Some(raster) = mosaic {
//!         raster.write_geotiff("mosaic.tif")?;
//!     }
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::alignment::Alignment;
use crate::codec::{GeoTiffCodec, RasterCodec};
use crate::config::QueryOptions;
use crate::error::{DecodeError, Result};
use crate::geometry::projection::reproject_extent;
use crate::geometry::{Extent, SnapType};
use crate::raster::Raster;
use crate::repair::AlignmentRepair;
use crate::source::TileResolver;
use crate::tile_grid::TileGrid;

/// Result of fetching one tile, before merging.
enum TileOutcome {
    NoFile,
    Failed(PathBuf, DecodeError),
    Decoded(PathBuf, Raster),
}

/// Builds seamless rasters from a tile grid and a per-tile file resolver.
pub struct MosaicAssembler<'a, R> {
    grid: &'a TileGrid,
    resolver: R,
    codec: Arc<dyn RasterCodec>,
    options: QueryOptions,
    reference: Option<Alignment>,
}

impl<'a, R: TileResolver> MosaicAssembler<'a, R> {
    /// Assembler reading GeoTIFF tiles with default options.
    pub fn new(grid: &'a TileGrid, resolver: R) -> Self {
        Self {
            grid,
            resolver,
            codec: Arc::new(GeoTiffCodec::new()),
            options: QueryOptions::default(),
            reference: None,
        }
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn RasterCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `alignment`'s lattice for every output instead of the first decoded tile's.
    ///
    /// Typically the result of [`crate::AlignmentDiscovery::discover`].
    #[must_use]
    pub fn reference_alignment(mut self, alignment: Alignment) -> Self {
        self.reference = Some(alignment);
        self
    }

    /// Composite all tiles overlapping `extent` into one raster.
    ///
    /// Returns `Ok(None)` when `extent` misses the grid's domain or no
    /// overlapping tile has a present cell in it. Tiles without a file, tiles that
    /// fail to decode and tiles in a different CRS are skipped.
    ///
    /// # Errors
    /// - [`crate::MosaicError::UnrepairableAlignment`] if a tile's resolution is
    ///   out of tolerance against the output lattice
    /// - [`crate::MosaicError::Projection`] if `extent` cannot be reprojected
    /// - [`crate::MosaicError::ThreadPool`] if a dedicated pool cannot be built
    pub fn query(&self, extent: &Extent) -> Result<Option<Raster>> {
        let projected = reproject_extent(extent, self.grid.crs())?;
        let Some(window) = projected.intersection(&self.grid.domain()) else {
            debug!(?extent, "Query extent misses the tile grid");
            return Ok(None);
        };

        let indices: Vec<usize> = self.grid.indices_overlapping_projected(&window).collect();
        let batch = self.options.effective_batch_size();
        let repair = AlignmentRepair::new(self.options.repair_tolerance);

        self.options.run(|| {
            let mut output: Option<Raster> = None;
            let mut decoded = 0usize;
            let mut written = 0usize;

            for chunk in indices.chunks(batch) {
                let outcomes: Vec<(usize, TileOutcome)> = chunk
                    .par_iter()
                    .map(|&index| (index, self.fetch(index, Some(&window))))
                    .collect();

                for (index, outcome) in outcomes {
                    let (path, raster) = match outcome {
                        TileOutcome::NoFile => {
                            debug!(tile = index, "No file for tile");
                            continue;
                        }
                        TileOutcome::Failed(path, e) => {
                            warn!(tile = index, path = %path.display(), error = %e, "Skipping undecodable tile");
                            continue;
                        }
                        TileOutcome::Decoded(path, raster) => (path, raster),
                    };
                    let Some(raster) = self.adopt_crs(index, &path, raster) else {
                        continue;
                    };

                    if output.is_none() {
                        let lattice = self.reference.unwrap_or(raster.alignment);
                        let Some(target) = lattice
                            .extend(&window, SnapType::Out)
                            .crop(&window, SnapType::Out)
                        else {
                            debug!(tile = index, "Tile lattice does not cover the query");
                            continue;
                        };
                        debug!(tile = index, nrow = target.nrow, ncol = target.ncol, "Output lattice fixed");
                        output = Some(Raster::empty(Alignment {
                            crs: self.grid.crs().or(target.crs),
                            ..target
                        }));
                    }

                    if let Some(out) = output.as_mut() {
                        let repaired = repair.repair_raster(raster, &out.alignment)?;
                        let cells = out.overlay_first_writer(&repaired);
                        written += cells;
                        decoded += 1;
                        debug!(tile = index, written = cells, "Merged tile");
                    }
                }
            }

            info!(tiles = indices.len(), decoded, written, "Mosaic query finished");
            Ok(output.filter(|_| written > 0))
        })
    }

    /// Decode one whole tile.
    ///
    /// With a reference alignment, the tile is repaired onto its lattice.
    /// Returns `Ok(None)` if the tile has no file or is in a different CRS.
    ///
    /// # Errors
    /// Unlike [`MosaicAssembler::query`], a decode failure is returned as
    /// [`crate::MosaicError::Decode`]. Repair errors are returned as well.
    pub fn tile_raster(&self, index: usize) -> Result<Option<Raster>> {
        let (path, raster) = match self.fetch(index, None) {
            TileOutcome::NoFile => return Ok(None),
            TileOutcome::Failed(_, e) => return Err(e.into()),
            TileOutcome::Decoded(path, raster) => (path, raster),
        };
        let Some(raster) = self.adopt_crs(index, &path, raster) else {
            return Ok(None);
        };
        match &self.reference {
            Some(reference) => Ok(Some(
                AlignmentRepair::new(self.options.repair_tolerance).repair_raster(raster, reference)?,
            )),
            None => Ok(Some(raster)),
        }
    }

    fn fetch(&self, index: usize, clip: Option<&Extent>) -> TileOutcome {
        let Some(path) = self.resolver.resolve(index) else {
            return TileOutcome::NoFile;
        };
        match self.codec.decode(&path, clip) {
            Ok(raster) => TileOutcome::Decoded(path, raster),
            Err(e) => TileOutcome::Failed(path, e),
        }
    }

    /// Untagged tiles take the grid's CRS; tiles tagged with another CRS are dropped.
    fn adopt_crs(&self, index: usize, path: &Path, mut raster: Raster) -> Option<Raster> {
        let Some(alignment) = self.grid.conform_crs(raster.alignment) else {
            warn!(
                tile = index,
                path = %path.display(),
                tile_crs = ?raster.alignment.crs,
                grid_crs = ?self.grid.crs(),
                "Skipping tile with mismatched CRS"
            );
            return None;
        };
        raster.alignment = alignment;
        Some(raster)
    }
}
