//! Feature extent queries with boundary de-duplication.
//!
//! Vector tiles usually carry a fringe of features that belong to the
//! neighbouring tile, since adjacent tiles detect the same tree near their
//! shared edge. A feature from tile `T` is kept only when its representative
//! point lies in `T`'s own area (see [`TileGrid::owns`]) and inside the query
//! extent. Every feature therefore comes from exactly one tile.

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::codec::{GeoJsonCodec, VectorCodec};
use crate::config::QueryOptions;
use crate::error::{DecodeError, Result};
use crate::geometry::projection::reproject_extent;
use crate::geometry::Extent;
use crate::source::TileResolver;
use crate::tile_grid::TileGrid;
use crate::vector::{FeatureCollection, PointLocator, VectorTile};

enum TileOutcome {
    NoFile,
    Failed(PathBuf, DecodeError),
    Decoded(VectorTile),
}

/// De-duplicating feature query over a tiled vector dataset.
pub struct BoundaryDedupQuery<'a, R> {
    grid: &'a TileGrid,
    resolver: R,
    codec: Arc<dyn VectorCodec>,
    locator: PointLocator,
    options: QueryOptions,
}

impl<'a, R: TileResolver> BoundaryDedupQuery<'a, R> {
    /// Query reading GeoJSON tiles, locating features by their geometry.
    pub fn new(grid: &'a TileGrid, resolver: R) -> Self {
        Self {
            grid,
            resolver,
            codec: Arc::new(GeoJsonCodec::new()),
            locator: PointLocator::default(),
            options: QueryOptions::default(),
        }
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn VectorCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// How each feature's representative point is found.
    #[must_use]
    pub fn locator(mut self, locator: PointLocator) -> Self {
        self.locator = locator;
        self
    }

    #[must_use]
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Features whose representative point lies in `extent`, each exactly once.
    ///
    /// Tiles are visited in index order and each tile's records keep their
    /// file order. Tiles without a file or that fail to decode are skipped.
    ///
    /// # Errors
    /// - [`crate::MosaicError::SchemaMismatch`] if a tile's fields differ from
    ///   the first decoded tile's
    /// - [`crate::MosaicError::MissingField`] if the locator's fields are absent
    /// - [`crate::MosaicError::Projection`] if `extent` cannot be reprojected
    pub fn query(&self, extent: &Extent) -> Result<FeatureCollection> {
        let projected = reproject_extent(extent, self.grid.crs())?;
        // closed on both sides: a point on the query's edge may be owned by
        // a tile that only touches the query
        let Some(window) = projected.closed_intersection(&self.grid.domain()) else {
            debug!(?extent, "Query extent misses the tile grid");
            return Ok(FeatureCollection::new());
        };
        let indices: Vec<usize> = self
            .grid
            .existing_indices()
            .filter(|&i| self.grid.extent_of(i).is_some_and(|e| e.touches(&window)))
            .collect();
        self.collect(&indices, Some(&window))
    }

    /// Every feature in the dataset, each exactly once.
    ///
    /// # Errors
    /// See [`BoundaryDedupQuery::query`].
    pub fn all_features(&self) -> Result<FeatureCollection> {
        self.query(&self.grid.domain())
    }

    /// Features of one tile that the tile owns, without an extent filter.
    ///
    /// # Errors
    /// A decode failure is returned as [`crate::MosaicError::Decode`]; see
    /// also [`BoundaryDedupQuery::query`].
    pub fn tile_features(&self, index: usize) -> Result<FeatureCollection> {
        let mut out = FeatureCollection::new();
        match self.fetch(index) {
            TileOutcome::NoFile => {}
            TileOutcome::Failed(_, e) => return Err(e.into()),
            TileOutcome::Decoded(tile) => {
                self.merge(&mut out, index, tile, None)?;
            }
        }
        Ok(out)
    }

    /// Decode `indices` in parallel batches and merge them in order.
    fn collect(&self, indices: &[usize], window: Option<&Extent>) -> Result<FeatureCollection> {
        let batch = self.options.effective_batch_size();

        self.options.run(|| {
            let mut out = FeatureCollection::new();
            let mut dropped = 0usize;

            for chunk in indices.chunks(batch) {
                let outcomes: Vec<(usize, TileOutcome)> = chunk
                    .par_iter()
                    .map(|&index| (index, self.fetch(index)))
                    .collect();

                for (index, outcome) in outcomes {
                    let tile = match outcome {
                        TileOutcome::NoFile => {
                            debug!(tile = index, "No file for tile");
                            continue;
                        }
                        TileOutcome::Failed(path, e) => {
                            warn!(tile = index, path = %path.display(), error = %e, "Skipping undecodable tile");
                            continue;
                        }
                        TileOutcome::Decoded(tile) => tile,
                    };
                    let total = tile.features.len();
                    let kept = self.merge(&mut out, index, tile, window)?;
                    dropped += total - kept;
                }
            }

            info!(
                tiles = indices.len(),
                features = out.len(),
                dropped,
                "Vector query finished"
            );
            Ok(out)
        })
    }

    /// Append the features of `tile` that pass the ownership and extent tests.
    fn merge(
        &self,
        out: &mut FeatureCollection,
        index: usize,
        tile: VectorTile,
        window: Option<&Extent>,
    ) -> Result<usize> {
        if tile.features.is_empty() {
            return Ok(0);
        }
        out.adopt_schema(index, &tile.schema)?;
        let Some(locate) = out.bind_locator(&self.locator)? else {
            return Ok(0);
        };
        let total = tile.features.len();
        let before = out.len();

        for feature in tile.features {
            let keep = locate.locate(&feature).is_some_and(|p| {
                self.grid.owns(index, p.x, p.y) && window.map_or(true, |w| w.contains_point(p.x, p.y))
            });
            if keep {
                out.push(feature);
            }
        }
        let kept = out.len() - before;
        debug!(tile = index, kept, dropped = total - kept, "Filtered tile features");
        Ok(kept)
    }

    fn fetch(&self, index: usize) -> TileOutcome {
        let Some(path) = self.resolver.resolve(index) else {
            return TileOutcome::NoFile;
        };
        match self.codec.decode(&path) {
            Ok(tile) => TileOutcome::Decoded(tile),
            Err(e) => TileOutcome::Failed(path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::Alignment;
    use crate::error::MosaicError;
    use crate::geometry::Point;
    use crate::testing::{point_tile, resolver, MemoryVectorCodec};
    use crate::vector::{Feature, Field, FieldKind, FieldPattern, FieldSchema, FieldValue, Geometry};

    /// Two tiles side by side: tile 0 covers x 0..100, tile 1 covers x 100..200.
    fn grid() -> TileGrid {
        TileGrid::full(Alignment::new(0.0, 0.0, 1, 2, 100.0, 100.0, None))
    }

    fn ids(fc: &FeatureCollection) -> Vec<f64> {
        fc.iter().filter_map(|f| f.values[0].as_f64()).collect()
    }

    /// Each tile also holds the other tile's features within 5 units of the edge.
    fn fringe_codec() -> MemoryVectorCodec {
        MemoryVectorCodec::default()
            .with(
                "tile0",
                point_tile(&[(10.0, 50.0, 1.0), (98.0, 50.0, 2.0), (102.0, 40.0, 3.0)]),
            )
            .with(
                "tile1",
                point_tile(&[(98.0, 50.0, 2.0), (102.0, 40.0, 3.0), (150.0, 60.0, 4.0)]),
            )
    }

    #[test]
    fn test_fringe_features_appear_once() {
        let g = grid();
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(fringe_codec()));
        let fc = q.query(&g.domain()).unwrap();
        assert_eq!(ids(&fc), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_relevance_filter() {
        let g = grid();
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(fringe_codec()));
        let fc = q.query(&Extent::new(90.0, 0.0, 110.0, 100.0)).unwrap();
        assert_eq!(ids(&fc), [2.0, 3.0]);
    }

    #[test]
    fn test_outside_domain_is_empty() {
        let g = grid();
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(fringe_codec()));
        let fc = q.query(&Extent::new(500.0, 500.0, 600.0, 600.0)).unwrap();
        assert!(fc.is_empty());
        assert!(fc.schema().is_none());
    }

    #[test]
    fn test_shared_edge_belongs_to_one_tile() {
        let g = grid();
        let codec = MemoryVectorCodec::default()
            .with("tile0", point_tile(&[(100.0, 50.0, 7.0)]))
            .with("tile1", point_tile(&[(100.0, 50.0, 7.0)]));
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(codec));
        assert_eq!(q.all_features().unwrap().len(), 1);
    }

    #[test]
    fn test_point_on_query_edge_comes_from_touching_tile() {
        let g = grid();
        let codec = MemoryVectorCodec::default()
            .with("tile0", point_tile(&[(50.0, 50.0, 1.0), (100.0, 50.0, 7.0)]))
            .with("tile1", point_tile(&[(100.0, 50.0, 7.0), (150.0, 50.0, 8.0)]));
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(codec));

        // x = 100 is inside the query and owned by tile 1, which only touches it
        let left = q.query(&Extent::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        assert_eq!(ids(&left), [1.0, 7.0]);

        let line = q.query(&Extent::new(100.0, 0.0, 100.0, 100.0)).unwrap();
        assert_eq!(ids(&line), [7.0]);
    }

    #[test]
    fn test_point_on_domain_edge() {
        let g = grid();
        let codec = MemoryVectorCodec::default().with("tile1", point_tile(&[(200.0, 100.0, 9.0)]));
        let q = BoundaryDedupQuery::new(&g, resolver(&[1])).codec(Arc::new(codec));
        assert_eq!(ids(&q.query(&Extent::new(200.0, 0.0, 200.0, 100.0)).unwrap()), [9.0]);
        assert_eq!(ids(&q.query(&Extent::new(200.0, 100.0, 300.0, 300.0)).unwrap()), [9.0]);
        assert!(q.query(&Extent::new(200.5, 0.0, 300.0, 100.0)).unwrap().is_empty());
    }

    #[test]
    fn test_crown_columns_resolved_once() {
        let g = grid();
        let schema = FieldSchema::new(vec![
            Field { name: "HighX".into(), kind: FieldKind::Number },
            Field { name: "HighY".into(), kind: FieldKind::Number },
            Field { name: "Area".into(), kind: FieldKind::Number },
            Field { name: "MaxHt".into(), kind: FieldKind::Number },
        ]);
        let crown = |x: f64, y: f64, area: f64, height: f64| Feature {
            geometry: None,
            values: [x, y, area, height].map(FieldValue::Number).to_vec(),
        };
        let codec = MemoryVectorCodec::default()
            .with(
                "tile0",
                VectorTile {
                    schema: schema.clone(),
                    features: vec![crown(20.0, 20.0, 12.0, 25.0)],
                },
            )
            .with(
                "tile1",
                VectorTile {
                    schema,
                    features: vec![crown(120.0, 20.0, 30.0, 41.0)],
                },
            );
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1]))
            .codec(Arc::new(codec))
            .locator(PointLocator::crown_table());
        let fc = q.all_features().unwrap();
        let columns = fc.locator().copied().unwrap();
        let heights: Vec<f64> = fc.iter().filter_map(|f| columns.height(f)).collect();
        assert_eq!(heights, [25.0, 41.0]);
        assert_eq!(columns.area(&fc.features()[1]), Some(30.0));

        // point tiles have no crown columns at all
        let missing = BoundaryDedupQuery::new(&g, resolver(&[0]))
            .codec(Arc::new(fringe_codec()))
            .locator(PointLocator::crown_table());
        assert!(matches!(missing.all_features(), Err(MosaicError::MissingField { .. })));
    }

    #[test]
    fn test_schema_mismatch_fails() {
        let g = grid();
        let other = VectorTile {
            schema: FieldSchema::new(vec![Field {
                name: "treeID".into(),
                kind: FieldKind::Number,
            }]),
            features: vec![Feature {
                geometry: Some(Geometry::Point(Point::new(150.0, 50.0))),
                values: vec![FieldValue::Number(1.0)],
            }],
        };
        let codec = fringe_codec().with("tile1", other);
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(codec));
        let err = q.all_features().unwrap_err();
        assert!(matches!(err, MosaicError::SchemaMismatch { tile: 1, .. }));
    }

    #[test]
    fn test_empty_tile_does_not_fix_schema() {
        let g = grid();
        let codec = fringe_codec().with("tile0", VectorTile::default());
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(codec));
        let fc = q.all_features().unwrap();
        assert_eq!(ids(&fc), [3.0, 4.0]);
        assert_eq!(fc.schema().map(FieldSchema::len), Some(1));
    }

    #[test]
    fn test_corrupt_tile_is_skipped() {
        let g = grid();
        let codec = fringe_codec().corrupt("tile0");
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(codec));
        // tile 0's own features are lost, not recovered from tile 1's fringe
        assert_eq!(ids(&q.all_features().unwrap()), [3.0, 4.0]);
    }

    #[test]
    fn test_record_order_is_kept() {
        let g = grid();
        let codec = MemoryVectorCodec::default()
            .with("tile0", point_tile(&[(90.0, 10.0, 3.0), (10.0, 90.0, 1.0), (50.0, 50.0, 2.0)]))
            .with("tile1", point_tile(&[(190.0, 10.0, 6.0), (110.0, 90.0, 5.0)]));
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1]))
            .codec(Arc::new(codec))
            .options(QueryOptions::default().with_threads(2).with_batch_size(2));
        assert_eq!(ids(&q.all_features().unwrap()), [3.0, 1.0, 2.0, 6.0, 5.0]);
    }

    #[test]
    fn test_field_locator() {
        let g = grid();
        let schema = FieldSchema::new(vec![
            Field { name: "HighX".into(), kind: FieldKind::Number },
            Field { name: "HighY".into(), kind: FieldKind::Number },
        ]);
        let row = |x: f64, y: f64| Feature {
            geometry: None,
            values: vec![FieldValue::Number(x), FieldValue::Number(y)],
        };
        let codec = MemoryVectorCodec::default().with(
            "tile0",
            VectorTile {
                schema,
                features: vec![row(20.0, 20.0), row(120.0, 20.0)],
            },
        );
        let q = BoundaryDedupQuery::new(&g, resolver(&[0]))
            .codec(Arc::new(codec))
            .locator(PointLocator::fields(
                FieldPattern::regex("^High[Xx]$").unwrap(),
                FieldPattern::Exact("HighY".into()),
            ));
        assert_eq!(ids(&q.all_features().unwrap()), [20.0]);

        let missing = BoundaryDedupQuery::new(&g, resolver(&[0]))
            .codec(Arc::new(fringe_codec()))
            .locator(PointLocator::fields(
                FieldPattern::Exact("HighX".into()),
                FieldPattern::Exact("HighY".into()),
            ));
        assert!(matches!(missing.all_features(), Err(MosaicError::MissingField { .. })));
    }

    #[test]
    fn test_tile_features_ignores_extent() {
        let g = grid();
        let q = BoundaryDedupQuery::new(&g, resolver(&[0, 1])).codec(Arc::new(fringe_codec()));
        assert_eq!(ids(&q.tile_features(1).unwrap()), [3.0, 4.0]);
        assert!(q.tile_features(5).unwrap().is_empty());

        let broken = BoundaryDedupQuery::new(&g, resolver(&[0]))
            .codec(Arc::new(MemoryVectorCodec::default().corrupt("tile0")));
        assert!(matches!(broken.tile_features(0), Err(MosaicError::Decode(_))));
    }
}
