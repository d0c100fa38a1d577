//! GeoJSON FeatureCollections as vector tiles.
//!
//! Supported geometries are Point, Polygon and MultiPolygon (a null geometry
//! is kept as `None`). The field schema is the sorted set of property names
//! seen in the file; each field takes the kind of its first non-null value,
//! and fields that are always null are text.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::VectorCodec;
use crate::error::DecodeError;
use crate::geometry::Point;
use crate::vector::{Feature, Field, FieldKind, FieldSchema, FieldValue, Geometry, Ring, VectorTile};

#[derive(Debug, Deserialize)]
struct RawCollection {
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum RawGeometry {
    Point(Vec<f64>),
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

/// Stateless GeoJSON reader and writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonCodec;

impl GeoJsonCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse a FeatureCollection from a string.
    ///
    /// # Errors
    /// Returns [`DecodeError::InvalidVector`] (reported against `path`) on
    /// malformed JSON, unsupported geometry types or short coordinates.
    pub fn parse(&self, path: &Path, text: &str) -> Result<VectorTile, DecodeError> {
        let raw: RawCollection =
            serde_json::from_str(text).map_err(|e| DecodeError::vector(path, e.to_string()))?;
        build_tile(path, raw)
    }

    /// Serialize features as a GeoJSON FeatureCollection.
    #[must_use]
    pub fn to_json(&self, schema: &FieldSchema, features: &[Feature]) -> Value {
        let features: Vec<Value> = features
            .iter()
            .map(|f| {
                let properties: Map<String, Value> = schema
                    .fields
                    .iter()
                    .zip(&f.values)
                    .map(|(field, value)| (field.name.clone(), value_to_json(value)))
                    .collect();
                json!({
                    "type": "Feature",
                    "geometry": f.geometry.as_ref().map_or(Value::Null, geometry_to_json),
                    "properties": properties,
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    /// Write features to `path` as GeoJSON.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be written.
    pub fn write(&self, path: &Path, schema: &FieldSchema, features: &[Feature]) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut out, &self.to_json(schema, features))?;
        out.flush()
    }
}

impl VectorCodec for GeoJsonCodec {
    fn decode(&self, path: &Path) -> Result<VectorTile, DecodeError> {
        let reader = BufReader::new(File::open(path)?);
        let raw: RawCollection =
            serde_json::from_reader(reader).map_err(|e| DecodeError::vector(path, e.to_string()))?;
        let tile = build_tile(path, raw)?;
        tracing::debug!(path = %path.display(), features = tile.features.len(), "Decoded GeoJSON");
        Ok(tile)
    }
}

fn build_tile(path: &Path, raw: RawCollection) -> Result<VectorTile, DecodeError> {
    let mut kinds: BTreeMap<String, Option<FieldKind>> = BTreeMap::new();
    for feature in &raw.features {
        for (name, value) in feature.properties.iter().flatten() {
            let slot = kinds.entry(name.clone()).or_insert(None);
            if slot.is_none() {
                *slot = kind_of(value);
            }
        }
    }
    let schema = FieldSchema::new(
        kinds
            .into_iter()
            .map(|(name, kind)| Field {
                name,
                kind: kind.unwrap_or(FieldKind::Text),
            })
            .collect(),
    );

    let features = raw
        .features
        .into_iter()
        .map(|f| {
            let geometry = f.geometry.map(|g| convert_geometry(path, g)).transpose()?;
            let values = schema
                .fields
                .iter()
                .map(|field| {
                    f.properties
                        .as_ref()
                        .and_then(|p| p.get(&field.name))
                        .map_or(FieldValue::Null, json_to_value)
                })
                .collect();
            Ok(Feature { geometry, values })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(VectorTile { schema, features })
}

fn kind_of(value: &Value) -> Option<FieldKind> {
    match value {
        Value::Null => None,
        Value::Number(_) => Some(FieldKind::Number),
        Value::Bool(_) => Some(FieldKind::Bool),
        _ => Some(FieldKind::Text),
    }
}

fn json_to_value(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Number(n) => n.as_f64().map_or(FieldValue::Null, FieldValue::Number),
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

fn value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Number(v) => json!(v),
        FieldValue::Text(s) => json!(s),
        FieldValue::Bool(b) => json!(b),
    }
}

fn convert_point(path: &Path, coords: &[f64]) -> Result<Point, DecodeError> {
    match coords {
        [x, y, ..] => Ok(Point::new(*x, *y)),
        _ => Err(DecodeError::vector(path, "position with fewer than 2 coordinates")),
    }
}

fn convert_rings(path: &Path, rings: &[Vec<Vec<f64>>]) -> Result<Vec<Ring>, DecodeError> {
    rings
        .iter()
        .map(|ring| ring.iter().map(|c| convert_point(path, c)).collect())
        .collect()
}

fn convert_geometry(path: &Path, raw: RawGeometry) -> Result<Geometry, DecodeError> {
    Ok(match raw {
        RawGeometry::Point(c) => Geometry::Point(convert_point(path, &c)?),
        RawGeometry::Polygon(rings) => Geometry::Polygon(convert_rings(path, &rings)?),
        RawGeometry::MultiPolygon(polys) => Geometry::MultiPolygon(
            polys
                .iter()
                .map(|rings| convert_rings(path, rings))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn geometry_to_json(geometry: &Geometry) -> Value {
    let ring = |r: &Ring| r.iter().map(|p| vec![p.x, p.y]).collect::<Vec<_>>();
    match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": [p.x, p.y] }),
        Geometry::Polygon(rings) => json!({
            "type": "Polygon",
            "coordinates": rings.iter().map(ring).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(polys) => json!({
            "type": "MultiPolygon",
            "coordinates": polys
                .iter()
                .map(|rings| rings.iter().map(ring).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [10.0, 20.0]},
             "properties": {"height": 31.5, "id": null, "species": "PSME"}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]},
             "properties": {"height": 12, "id": 7, "alive": true}},
            {"type": "Feature", "geometry": null, "properties": null}
        ]
    }"#;

    #[test]
    fn test_schema_is_sorted_and_typed() {
        let tile = GeoJsonCodec::new().parse(Path::new("a.geojson"), SAMPLE).unwrap();
        let names: Vec<_> = tile.schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["alive", "height", "id", "species"]);
        let kinds: Vec<_> = tile.schema.fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            [FieldKind::Bool, FieldKind::Number, FieldKind::Number, FieldKind::Text]
        );
    }

    #[test]
    fn test_values_follow_schema_order() {
        let tile = GeoJsonCodec::new().parse(Path::new("a.geojson"), SAMPLE).unwrap();
        assert_eq!(tile.features.len(), 3);
        let first = &tile.features[0];
        assert_eq!(first.values[0], FieldValue::Null);
        assert_eq!(first.values[1], FieldValue::Number(31.5));
        assert_eq!(first.values[3], FieldValue::Text("PSME".into()));
        assert_eq!(first.geometry, Some(Geometry::Point(Point::new(10.0, 20.0))));
        assert!(tile.features[2].geometry.is_none());
        assert!(tile.features[2].values.iter().all(|v| *v == FieldValue::Null));
    }

    #[test]
    fn test_unsupported_geometry_is_invalid() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":{}}]}"#;
        let err = GeoJsonCodec::new().parse(Path::new("b.geojson"), text).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidVector { .. }));
    }

    #[test]
    fn test_short_position_is_invalid() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1.0]},"properties":{}}]}"#;
        assert!(GeoJsonCodec::new().parse(Path::new("c.geojson"), text).is_err());
    }

    #[test]
    fn test_write_then_decode() {
        let codec = GeoJsonCodec::new();
        let original = codec.parse(Path::new("a.geojson"), SAMPLE).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");
        codec.write(&path, &original.schema, &original.features).unwrap();
        let back = codec.decode(&path).unwrap();

        assert_eq!(back.schema, original.schema);
        assert_eq!(back.features[0], original.features[0]);
        assert_eq!(back.features[1].geometry, original.features[1].geometry);
    }
}
