#![doc = include_str!("../README.md")]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`tile_grid`]: Tile layout, per-tile extents and edge ownership via [`TileGrid`]
//! - [`alignment`]: Regular lattices with lattice-snapped extend/crop ([`Alignment`])
//! - [`repair`]: Snapping drifted tile grids back onto a reference ([`AlignmentRepair`])
//! - [`mosaic`]: Raster extent queries with [`MosaicAssembler`]
//! - [`vector_query`]: De-duplicated feature queries with [`BoundaryDedupQuery`]
//! - [`discovery`]: Canonical alignment of a dataset via [`AlignmentDiscovery`]
//! - [`codec`]: GeoTIFF and GeoJSON tile decoding behind [`RasterCodec`] / [`VectorCodec`]
//! - [`source`]: Mapping tile indices to files on disk
//! - [`geometry`]: Coordinate types ([`Point`], [`Extent`]) and projections
//! - [`geotiff_writer`]: Write query results to GeoTIFF files

// ============================================================================
// Public modules
// ============================================================================

pub mod alignment;
pub mod casting;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod geometry;
pub mod geotiff_writer;
pub mod mosaic;
pub mod raster;
pub mod repair;
pub mod source;
pub mod tile_grid;
pub mod vector;
pub mod vector_query;

#[cfg(test)]
mod testing;

// ============================================================================
// Tile Layout & Lattices
// ============================================================================

pub use alignment::Alignment;
pub use raster::Raster;
pub use tile_grid::{TileGrid, TileIndices};

// ============================================================================
// Extent Queries
// ============================================================================
// Primary API: MosaicAssembler::new(&grid, resolver).query(&extent)

pub use config::{QueryOptions, DEFAULT_REPAIR_TOLERANCE};
pub use discovery::AlignmentDiscovery;
pub use mosaic::MosaicAssembler;
pub use repair::AlignmentRepair;
pub use vector_query::BoundaryDedupQuery;

// ============================================================================
// Vector Model
// ============================================================================

pub use vector::{
    Feature,
    FeatureCollection,
    Field,
    FieldKind,
    FieldPattern,
    FieldSchema,
    FieldValue,
    Geometry,
    PointLocator,
    ResolvedLocator,
    VectorTile,
};

// ============================================================================
// Geometry & Projections
// ============================================================================

pub use geometry::{Extent, Point, SnapType};
pub use geometry::projection::{
    project_point,
    reproject_extent,
    get_proj_string,
    is_geographic_crs,
};

// ============================================================================
// Codecs & Sources
// ============================================================================

pub use codec::{GeoJsonCodec, GeoTiffCodec, RasterCodec, VectorCodec};
pub use source::{
    LocalSourceOptions,
    LocalSourceStats,
    LocalTileSource,
    ProductKind,
    ProductResolver,
    TileResolver,
    TileSource,
};

// ============================================================================
// Errors
// ============================================================================

pub use error::{Axis, DecodeError, MosaicError, Result};

// ============================================================================
// GeoTIFF Writing
// ============================================================================

pub use geotiff_writer::{
    GeoTiffCompression,
    GeoTiffWriteError,
    GeoTiffWriter,
};
