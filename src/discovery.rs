//! Canonical lattice discovery for datasets whose tiles disagree slightly.
//!
//! The first readable tile in index order defines the dataset's cell size,
//! origin lattice and CRS. The result is extended over the whole tile grid so
//! it can seed [`crate::MosaicAssembler::reference_alignment`].

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::alignment::Alignment;
use crate::codec::{GeoTiffCodec, RasterCodec};
use crate::geometry::SnapType;
use crate::source::TileResolver;
use crate::tile_grid::TileGrid;

/// Finds, and remembers, a dataset's canonical alignment.
pub struct AlignmentDiscovery<'a, R> {
    grid: &'a TileGrid,
    resolver: R,
    codec: Arc<dyn RasterCodec>,
    cache: OnceLock<Option<Alignment>>,
}

impl<'a, R: TileResolver> AlignmentDiscovery<'a, R> {
    pub fn new(grid: &'a TileGrid, resolver: R) -> Self {
        Self {
            grid,
            resolver,
            codec: Arc::new(GeoTiffCodec::new()),
            cache: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn RasterCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Canonical alignment, computed on first call and reused afterwards.
    ///
    /// `None` if no existing tile has a readable file.
    pub fn discover(&self) -> Option<Alignment> {
        *self.cache.get_or_init(|| self.discover_uncached())
    }

    /// Scan the tiles again, ignoring any cached result.
    ///
    /// Tiles are read in index order. Unreadable files and files in a CRS
    /// other than the grid's are logged and skipped. An untagged file takes
    /// the grid's CRS.
    pub fn discover_uncached(&self) -> Option<Alignment> {
        let domain = self.grid.domain();
        for index in self.grid.existing_indices() {
            let Some(path) = self.resolver.resolve(index) else {
                continue;
            };
            let found = match self.codec.read_alignment(&path) {
                Ok(a) => a,
                Err(e) => {
                    warn!(tile = index, path = %path.display(), error = %e, "Cannot read tile alignment");
                    continue;
                }
            };
            let Some(alignment) = self.grid.conform_crs(found) else {
                warn!(tile = index, tile_crs = ?found.crs, grid_crs = ?self.grid.crs(), "Skipping tile with mismatched CRS");
                continue;
            };

            let canonical = alignment.extend(&domain, SnapType::Out);
            debug!(
                tile = index,
                xres = canonical.xres,
                yres = canonical.yres,
                nrow = canonical.nrow,
                ncol = canonical.ncol,
                "Discovered dataset alignment"
            );
            return Some(canonical);
        }
        None
    }
}
