//! Tile sources: where each tile's file lives.
//!
//! The query engines never look at directory layouts. They take a
//! [`TileResolver`], a pure function from tile index to an optional path.
//! A [`TileSource`] bundles a dataset's [`TileGrid`] with per-product
//! resolution and hands out resolvers bound to one product.
//!
//! # Example
//!
//! ```rust,no_run
//! use mosaicrs::source::{LocalSourceOptions, LocalTileSource, ProductKind, TileSource};
//! use mosaicrs::{Alignment, MosaicAssembler, TileGrid};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grid = TileGrid::full(Alignment::new(0.0, 0.0, 4, 4, 1000.0, 1000.0, Some(32610)));
//!     let source = LocalTileSource::scan("/data/run", grid, &LocalSourceOptions::default())?
//!         .with_template(ProductKind::CanopySurfaceModel, "CSM/{run}CSM_{tile}.tif");
//!
//!     let mosaic = MosaicAssembler::new(source.grid(), source.for_product(ProductKind::CanopySurfaceModel))
//!         .query(&source.grid().domain())?;
//!     println!("{:?}", mosaic.map(|r| r.present_count()));
//!     Ok(())
//! }
//! ```

pub mod local;

pub use local::{LocalSourceOptions, LocalSourceStats, LocalTileSource};

use std::fmt;
use std::path::PathBuf;

use crate::tile_grid::TileGrid;

/// Per-tile data products a processing run may produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductKind {
    CanopySurfaceModel,
    MaxHeight,
    Intensity,
    WatershedSegments,
    HighPoints,
    Polygons,
    Custom(String),
}

impl ProductKind {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ProductKind::CanopySurfaceModel => "CanopySurfaceModel",
            ProductKind::MaxHeight => "MaxHeight",
            ProductKind::Intensity => "Intensity",
            ProductKind::WatershedSegments => "WatershedSegments",
            ProductKind::HighPoints => "HighPoints",
            ProductKind::Polygons => "Polygons",
            ProductKind::Custom(name) => name,
        }
    }

    /// True for products stored as vector tiles.
    #[must_use]
    pub fn is_vector(&self) -> bool {
        matches!(self, ProductKind::HighPoints | ProductKind::Polygons)
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a tile index to the file holding that tile's data, if any.
///
/// Must be deterministic for a given on-disk state.
pub trait TileResolver: Send + Sync {
    fn resolve(&self, index: usize) -> Option<PathBuf>;
}

impl<F> TileResolver for F
where
    F: Fn(usize) -> Option<PathBuf> + Send + Sync,
{
    fn resolve(&self, index: usize) -> Option<PathBuf> {
        self(index)
    }
}

/// A tiled dataset: its layout plus per-product file lookup.
pub trait TileSource: Send + Sync {
    /// Run or dataset name, used in logs
    fn name(&self) -> &str;

    fn grid(&self) -> &TileGrid;

    fn resolve(&self, product: &ProductKind, index: usize) -> Option<PathBuf>;

    /// Resolver for one product of this source.
    fn for_product(&self, product: ProductKind) -> ProductResolver<'_, Self>
    where
        Self: Sized,
    {
        ProductResolver {
            source: self,
            product,
        }
    }
}

/// A [`TileSource`] bound to a single [`ProductKind`].
#[derive(Debug)]
pub struct ProductResolver<'a, S: ?Sized> {
    source: &'a S,
    product: ProductKind,
}

impl<'a, S: TileSource + ?Sized> ProductResolver<'a, S> {
    #[must_use]
    pub fn new(source: &'a S, product: ProductKind) -> Self {
        Self { source, product }
    }

    #[must_use]
    pub fn product(&self) -> &ProductKind {
        &self.product
    }
}

impl<S: TileSource + ?Sized> TileResolver for ProductResolver<'_, S> {
    fn resolve(&self, index: usize) -> Option<PathBuf> {
        self.source.resolve(&self.product, index)
    }
}
