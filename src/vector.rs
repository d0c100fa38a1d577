//! Vector features, field schemas and representative points.
//!
//! A decoded vector tile is a [`FieldSchema`] plus features whose values are
//! stored positionally against that schema. Tiles of one dataset must share
//! a schema; [`FeatureCollection`] enforces that when tiles are merged.

use std::fmt;

use regex::Regex;

use crate::error::{MosaicError, Result};
use crate::geometry::{Extent, Point};

/// Closed ring of vertices; the last vertex may or may not repeat the first.
pub type Ring = Vec<Point>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    /// Outer ring followed by holes
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Point used to decide which tile a feature belongs to.
    ///
    /// Points stand for themselves. Polygons use the area centroid of their
    /// outer ring (the largest outer ring for multipolygons); rings with no
    /// area fall back to the centre of their bounding box.
    #[must_use]
    pub fn representative_point(&self) -> Option<Point> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Polygon(rings) => rings.first().and_then(|r| ring_centroid(r)),
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .filter_map(|rings| rings.first())
                .max_by(|a, b| ring_area(a).abs().total_cmp(&ring_area(b).abs()))
                .and_then(|r| ring_centroid(r)),
        }
    }

    /// Planar area: outer rings minus holes. Zero for points.
    #[must_use]
    pub fn area(&self) -> f64 {
        fn polygon_area(rings: &[Ring]) -> f64 {
            let mut rings = rings.iter().map(|r| ring_area(r).abs());
            let outer = rings.next().unwrap_or(0.0);
            (outer - rings.sum::<f64>()).max(0.0)
        }
        match self {
            Geometry::Point(_) => 0.0,
            Geometry::Polygon(rings) => polygon_area(rings),
            Geometry::MultiPolygon(polygons) => polygons.iter().map(|p| polygon_area(p)).sum(),
        }
    }

    #[must_use]
    pub fn bbox(&self) -> Option<Extent> {
        let mut points: Box<dyn Iterator<Item = &Point>> = match self {
            Geometry::Point(p) => Box::new(std::iter::once(p)),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
            Geometry::MultiPolygon(polygons) => Box::new(polygons.iter().flatten().flatten()),
        };
        let first = points.next()?;
        Some(points.fold(Extent::new(first.x, first.y, first.x, first.y), |e, p| {
            e.union(&Extent::new(p.x, p.y, p.x, p.y))
        }))
    }
}

/// Signed shoelace area.
fn ring_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = &ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

fn ring_centroid(ring: &[Point]) -> Option<Point> {
    let area = ring_area(ring);
    if area.abs() < f64::EPSILON {
        let first = ring.first()?;
        let bbox = ring.iter().fold(Extent::new(first.x, first.y, first.x, first.y), |e, p| {
            e.union(&Extent::new(p.x, p.y, p.x, p.y))
        });
        return Some(bbox.center());
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for (i, a) in ring.iter().enumerate() {
        let b = &ring[(i + 1) % ring.len()];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    Some(Point::new(cx / (6.0 * area), cy / (6.0 * area)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered attribute layout of a vector tile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSchema {
    pub fields: Vec<Field>,
}

impl FieldSchema {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", field.name, field.kind)?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// One decoded record. `values` line up with the tile's [`FieldSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub values: Vec<FieldValue>,
}

impl Feature {
    #[must_use]
    pub fn value(&self, schema: &FieldSchema, name: &str) -> Option<&FieldValue> {
        self.values.get(schema.index_of(name)?)
    }
}

/// Contents of one decoded vector file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorTile {
    pub schema: FieldSchema,
    pub features: Vec<Feature>,
}

/// Features gathered from several tiles under one schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    schema: Option<FieldSchema>,
    locator: Option<ResolvedLocator>,
    features: Vec<Feature>,
}

impl FeatureCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema fixed by the first non-empty tile, if any has been added.
    #[must_use]
    pub fn schema(&self) -> Option<&FieldSchema> {
        self.schema.as_ref()
    }

    /// Column positions resolved against [`FeatureCollection::schema`], once
    /// the collection was filled by a query.
    #[must_use]
    pub fn locator(&self) -> Option<&ResolvedLocator> {
        self.locator.as_ref()
    }

    /// Resolve `locator` against the fixed schema, unless already done.
    ///
    /// # Errors
    /// Returns [`MosaicError::MissingField`] if a pattern matches no field.
    /// Does nothing, successfully, while no schema is fixed.
    pub fn bind_locator(&mut self, locator: &PointLocator) -> Result<Option<ResolvedLocator>> {
        if self.locator.is_none() {
            if let Some(schema) = &self.schema {
                self.locator = Some(locator.resolve(schema)?);
            }
        }
        Ok(self.locator)
    }

    /// Check `schema` against the collection's, fixing it if none is set yet.
    ///
    /// # Errors
    /// Returns [`MosaicError::SchemaMismatch`] if a different schema is already fixed.
    pub fn adopt_schema(&mut self, tile: usize, schema: &FieldSchema) -> Result<()> {
        match &self.schema {
            None => {
                self.schema = Some(schema.clone());
                Ok(())
            }
            Some(expected) if expected == schema => Ok(()),
            Some(expected) => Err(MosaicError::SchemaMismatch {
                tile,
                expected: expected.to_string(),
                found: schema.to_string(),
            }),
        }
    }

    /// Append a feature. Callers must have adopted the feature's schema first.
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// How a field is picked out of a schema.
#[derive(Debug, Clone)]
pub enum FieldPattern {
    Exact(String),
    /// First field whose name contains the text
    Containing(String),
    /// First field whose name matches
    Matching(Regex),
}

impl FieldPattern {
    /// # Errors
    /// Returns [`MosaicError::MissingField`] if `pattern` is not a valid regex.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(FieldPattern::Matching)
            .map_err(|e| MosaicError::MissingField {
                pattern: format!("{pattern} ({e})"),
            })
    }

    fn find(&self, schema: &FieldSchema) -> Option<usize> {
        schema.fields.iter().position(|f| match self {
            FieldPattern::Exact(name) => f.name == *name,
            FieldPattern::Containing(text) => f.name.contains(text.as_str()),
            FieldPattern::Matching(re) => re.is_match(&f.name),
        })
    }

    fn describe(&self) -> String {
        match self {
            FieldPattern::Exact(name) => format!("'{name}'"),
            FieldPattern::Containing(text) => format!("*{text}*"),
            FieldPattern::Matching(re) => format!("/{}/", re.as_str()),
        }
    }

    fn resolve(&self, schema: &FieldSchema) -> Result<usize> {
        self.find(schema).ok_or_else(|| MosaicError::MissingField {
            pattern: self.describe(),
        })
    }
}

/// Which columns describe a feature: its representative point and,
/// optionally, tree height and crown area.
///
/// Without point fields the feature's geometry is used (see
/// [`Geometry::representative_point`]).
#[derive(Debug, Clone, Default)]
pub struct PointLocator {
    point: Option<(FieldPattern, FieldPattern)>,
    height: Option<FieldPattern>,
    area: Option<FieldPattern>,
}

impl PointLocator {
    /// Locate features by their geometry.
    #[must_use]
    pub fn geometry() -> Self {
        Self::default()
    }

    /// Locate features by a pair of numeric attribute fields.
    #[must_use]
    pub fn fields(x: FieldPattern, y: FieldPattern) -> Self {
        Self {
            point: Some((x, y)),
            ..Self::default()
        }
    }

    /// Crown tables written by FUSION-style segmentations: `HighX`, `HighY`,
    /// `Area` and `MaxHt` columns, possibly with prefixes or suffixes.
    #[must_use]
    pub fn crown_table() -> Self {
        let containing = |text: &str| FieldPattern::Containing(text.to_string());
        Self::fields(containing("HighX"), containing("HighY"))
            .with_area(containing("Area"))
            .with_height(containing("MaxHt"))
    }

    #[must_use]
    pub fn with_height(mut self, height: FieldPattern) -> Self {
        self.height = Some(height);
        self
    }

    #[must_use]
    pub fn with_area(mut self, area: FieldPattern) -> Self {
        self.area = Some(area);
        self
    }

    /// Resolve field patterns against a concrete schema once, up front.
    ///
    /// # Errors
    /// Returns [`MosaicError::MissingField`] if any configured pattern
    /// matches no field.
    pub fn resolve(&self, schema: &FieldSchema) -> Result<ResolvedLocator> {
        let point = match &self.point {
            Some((x, y)) => Some((x.resolve(schema)?, y.resolve(schema)?)),
            None => None,
        };
        Ok(ResolvedLocator {
            point,
            height: self.height.as_ref().map(|p| p.resolve(schema)).transpose()?,
            area: self.area.as_ref().map(|p| p.resolve(schema)).transpose()?,
        })
    }
}

/// A [`PointLocator`] bound to field positions of one schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedLocator {
    point: Option<(usize, usize)>,
    height: Option<usize>,
    area: Option<usize>,
}

impl ResolvedLocator {
    #[must_use]
    pub fn locate(&self, feature: &Feature) -> Option<Point> {
        match self.point {
            None => feature.geometry.as_ref()?.representative_point(),
            Some((x, y)) => Some(Point::new(number(feature, x)?, number(feature, y)?)),
        }
    }

    /// Positions of the x and y fields, if the point comes from attributes.
    #[must_use]
    pub fn point_fields(&self) -> Option<(usize, usize)> {
        self.point
    }

    /// Tree height from the height column. `None` without a height column.
    #[must_use]
    pub fn height(&self, feature: &Feature) -> Option<f64> {
        number(feature, self.height?)
    }

    /// Crown area from the area column, or from the geometry without one.
    #[must_use]
    pub fn area(&self, feature: &Feature) -> Option<f64> {
        match self.area {
            Some(column) => number(feature, column),
            None => feature.geometry.as_ref().map(Geometry::area),
        }
    }

    /// Radius of the circle with the crown's area.
    #[must_use]
    pub fn radius(&self, feature: &Feature) -> Option<f64> {
        self.area(feature).map(|a| (a / std::f64::consts::PI).sqrt())
    }
}

fn number(feature: &Feature, column: usize) -> Option<f64> {
    feature.values.get(column)?.as_f64()
}
