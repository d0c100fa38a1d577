//! In-memory codecs and fixtures shared by the engine tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::alignment::Alignment;
use crate::codec::{clip_raster, RasterCodec, VectorCodec};
use crate::error::DecodeError;
use crate::geometry::{Extent, Point};
use crate::raster::Raster;
use crate::vector::{Feature, Field, FieldKind, FieldSchema, FieldValue, Geometry, VectorTile};

/// Rasters keyed by path; a path mapped to `None` fails to decode.
#[derive(Default)]
pub(crate) struct MemoryRasterCodec {
    files: HashMap<PathBuf, Option<Raster>>,
    pub decodes: AtomicUsize,
    pub header_reads: AtomicUsize,
}

impl MemoryRasterCodec {
    pub fn with(mut self, path: &str, raster: Raster) -> Self {
        self.files.insert(PathBuf::from(path), Some(raster));
        self
    }

    pub fn corrupt(mut self, path: &str) -> Self {
        self.files.insert(PathBuf::from(path), None);
        self
    }

    fn lookup(&self, path: &Path) -> Result<&Raster, DecodeError> {
        match self.files.get(path) {
            Some(Some(r)) => Ok(r),
            Some(None) => Err(DecodeError::raster(path, "corrupt")),
            None => Err(DecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))),
        }
    }
}

impl RasterCodec for MemoryRasterCodec {
    fn read_alignment(&self, path: &Path) -> Result<Alignment, DecodeError> {
        self.header_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.lookup(path)?.alignment)
    }

    fn decode(&self, path: &Path, clip: Option<&Extent>) -> Result<Raster, DecodeError> {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        Ok(clip_raster(self.lookup(path)?.clone(), clip))
    }
}

/// Vector tiles keyed by path; a path mapped to `None` fails to decode.
#[derive(Default)]
pub(crate) struct MemoryVectorCodec {
    files: HashMap<PathBuf, Option<VectorTile>>,
}

impl MemoryVectorCodec {
    pub fn with(mut self, path: &str, tile: VectorTile) -> Self {
        self.files.insert(PathBuf::from(path), Some(tile));
        self
    }

    pub fn corrupt(mut self, path: &str) -> Self {
        self.files.insert(PathBuf::from(path), None);
        self
    }
}

impl VectorCodec for MemoryVectorCodec {
    fn decode(&self, path: &Path) -> Result<VectorTile, DecodeError> {
        match self.files.get(path) {
            Some(Some(t)) => Ok(t.clone()),
            Some(None) => Err(DecodeError::vector(path, "corrupt")),
            None => Err(DecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))),
        }
    }
}

/// Resolver mapping tile `i` to `tile{i}` for the listed indices.
pub(crate) fn resolver(present: &[usize]) -> impl Fn(usize) -> Option<PathBuf> + Send + Sync {
    let present = present.to_vec();
    move |i| present.contains(&i).then(|| PathBuf::from(format!("tile{i}")))
}

/// Raster of `nrow x ncol` unit cells whose bottom-left corner is `(xmin, ymin)`.
pub(crate) fn constant_raster(
    xmin: f64,
    ymin: f64,
    nrow: usize,
    ncol: usize,
    value: f32,
    crs: Option<i32>,
) -> Raster {
    let a = Alignment::new(xmin, ymin, nrow, ncol, 1.0, 1.0, crs);
    Raster {
        cells: vec![Some(value); a.cell_count()],
        alignment: a,
    }
}

pub(crate) fn id_schema() -> FieldSchema {
    FieldSchema::new(vec![Field {
        name: "id".into(),
        kind: FieldKind::Number,
    }])
}

/// Point features with an `id` field.
pub(crate) fn point_tile(points: &[(f64, f64, f64)]) -> VectorTile {
    VectorTile {
        schema: id_schema(),
        features: points
            .iter()
            .map(|&(x, y, id)| Feature {
                geometry: Some(Geometry::Point(Point::new(x, y))),
                values: vec![FieldValue::Number(id)],
            })
            .collect(),
    }
}
