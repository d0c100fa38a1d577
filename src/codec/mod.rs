//! File codecs used by the query engines.
//!
//! The engines only see the [`RasterCodec`] and [`VectorCodec`] traits, so
//! any format can be plugged in. GeoTIFF and GeoJSON implementations are
//! provided.

pub mod geojson;
pub mod geotiff;

use std::path::Path;

use crate::alignment::Alignment;
use crate::error::DecodeError;
use crate::geometry::Extent;
use crate::raster::Raster;
use crate::vector::VectorTile;

pub use self::geojson::GeoJsonCodec;
pub use self::geotiff::GeoTiffCodec;

/// Reads single-band grid files.
pub trait RasterCodec: Send + Sync {
    /// Grid metadata only, without reading cell values.
    ///
    /// # Errors
    /// Returns a [`DecodeError`] if the file is missing or not a valid grid.
    fn read_alignment(&self, path: &Path) -> Result<Alignment, DecodeError>;

    /// Decode the cells of `path`. With `clip`, only the cells covering the
    /// clip extent (snapped outward onto the file's lattice) are returned.
    /// A clip that misses the file yields an empty raster with no cells.
    ///
    /// The clip bounds the returned raster, not the bytes read: an
    /// implementation may decode the whole image and crop it afterwards, as
    /// [`GeoTiffCodec`] does for any clip that touches the file.
    ///
    /// # Errors
    /// Returns a [`DecodeError`] if the file is missing or not a valid grid.
    fn decode(&self, path: &Path, clip: Option<&Extent>) -> Result<Raster, DecodeError>;
}

/// Reads vector tiles: a field schema plus features in record order.
pub trait VectorCodec: Send + Sync {
    /// # Errors
    /// Returns a [`DecodeError`] if the file is missing or not a valid vector file.
    fn decode(&self, path: &Path) -> Result<VectorTile, DecodeError>;
}

/// Apply an optional clip to a fully decoded raster.
pub(crate) fn clip_raster(raster: Raster, clip: Option<&Extent>) -> Raster {
    match clip {
        None => raster,
        Some(extent) => raster
            .crop(extent, crate::geometry::SnapType::Out)
            .unwrap_or_else(|| {
                let mut a = raster.alignment;
                a.nrow = 0;
                a.ncol = 0;
                Raster::empty(a)
            }),
    }
}
