//! Mapping between GeoJSON text values and the sfpack data model.
//!
//! Only two ordinates are kept; any further ordinates are dropped with a
//! warning. Numeric feature ids become strings. The legacy `crs` member is
//! read for the SRID and written back when the SRID is not 4326. Members
//! GeoJSON does not define are kept as extensions.
//!
//! See <https://datatracker.ietf.org/doc/html/rfc7946>.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};
use tracing::warn;

use sfpack::model::{
    FEATURE_COLLECTION_RESERVED_KEYS, FEATURE_RESERVED_KEYS, GEOMETRY_COLLECTION_RESERVED_KEYS,
};
use sfpack::{
    AttrMap, AttrValue, BoundingBox, Coord, DEFAULT_SCALE, DEFAULT_SRID, Document, Feature,
    FeatureCollection, Geometry, GeometryCollection,
};

const CRS: &str = "crs";

/// GeoJSON root object.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
enum GeoJson {
    FeatureCollection(FeatureCollectionObject),
    Feature(FeatureObject),
    GeometryCollection(GeometryCollectionObject),
    #[serde(untagged)]
    Geometry(GeometryObject),
}

#[derive(Debug, Deserialize, Serialize)]
struct FeatureCollectionObject {
    features: Vec<FeatureMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<Vec<f64>>,
    #[serde(flatten)]
    foreign: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GeometryCollectionObject {
    geometries: Vec<GeometryObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<Vec<f64>>,
    #[serde(flatten)]
    foreign: Map<String, Value>,
}

/// Feature inside a collection, which carries its own `type` member.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
enum FeatureMember {
    Feature(FeatureObject),
}

#[derive(Debug, Deserialize, Serialize)]
struct FeatureObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<FeatureId>,
    geometry: Option<GeometryObject>,
    properties: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bbox: Option<Vec<f64>>,
    #[serde(flatten)]
    foreign: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum FeatureId {
    String(String),
    Number(Number),
}

type Position = Vec<f64>;

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
enum GeometryObject {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

/// Reads the SRID from a `crs` member such as
/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::28992"}}`.
pub fn srid_from_crs(value: &Value) -> Option<u32> {
    let crs = value.get(CRS)?;
    if crs.get("type")?.as_str()? != "name" {
        return None;
    }
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if !name.contains("EPSG") {
        return None;
    }
    name.rsplit(':').next()?.parse().ok()
}

/// Builds the `crs` member for an SRID.
pub fn crs_member(srid: u32) -> Value {
    json!({
        "type": "name",
        "properties": { "name": format!("urn:ogc:def:crs:EPSG::{srid}") }
    })
}

/// Scale used when none is given: 1e-7 degrees for geographic EPSG codes
/// (4000-4999), centimetres otherwise.
pub fn default_scale(srid: u32) -> i64 {
    if (4000..5000).contains(&srid) {
        DEFAULT_SCALE
    } else {
        100
    }
}

// =============================================================================
// READING
// =============================================================================

/// Converts a GeoJSON value to a document. The root `crs` member is consumed
/// by [`srid_from_crs`]; a `crs` on a nested feature stays an extension.
pub fn parse_document(value: &Value) -> Result<Document> {
    let root = GeoJson::deserialize(value).context("not a supported GeoJSON object")?;
    let mut parser = Parser::default();
    let document = parser.document(root)?;
    if parser.dropped_ordinates > 0 {
        warn!(
            positions = parser.dropped_ordinates,
            "dropped ordinates beyond x and y"
        );
    }
    Ok(document)
}

#[derive(Default)]
struct Parser {
    dropped_ordinates: usize,
}

impl Parser {
    fn document(&mut self, root: GeoJson) -> Result<Document> {
        Ok(match root {
            GeoJson::FeatureCollection(mut fc) => {
                fc.foreign.remove(CRS);
                Document::FeatureCollection(self.feature_collection(fc)?)
            }
            GeoJson::Feature(mut f) => {
                f.foreign.remove(CRS);
                Document::Feature(self.feature(f)?)
            }
            GeoJson::GeometryCollection(mut gc) => {
                gc.foreign.remove(CRS);
                Document::GeometryCollection(self.geometry_collection(gc)?)
            }
            GeoJson::Geometry(g) => Document::Geometry(self.geometry(g)?),
        })
    }

    fn feature_collection(&mut self, fc: FeatureCollectionObject) -> Result<FeatureCollection> {
        let features = fc
            .features
            .into_iter()
            .enumerate()
            .map(|(index, FeatureMember::Feature(f))| {
                self.feature(f).with_context(|| format!("feature {index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FeatureCollection {
            features,
            bbox: bbox(fc.bbox)?,
            name: fc.name,
            extensions: extensions(&fc.foreign, &FEATURE_COLLECTION_RESERVED_KEYS),
        })
    }

    fn geometry_collection(&mut self, gc: GeometryCollectionObject) -> Result<GeometryCollection> {
        let geometries = gc
            .geometries
            .into_iter()
            .enumerate()
            .map(|(index, g)| self.geometry(g).with_context(|| format!("geometry {index}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(GeometryCollection {
            geometries,
            bbox: bbox(gc.bbox)?,
            name: gc.name,
            extensions: extensions(&gc.foreign, &GEOMETRY_COLLECTION_RESERVED_KEYS),
        })
    }

    fn feature(&mut self, f: FeatureObject) -> Result<Feature> {
        Ok(Feature {
            geometry: f.geometry.map(|g| self.geometry(g)).transpose()?,
            properties: f.properties.as_ref().map(attr_map),
            id: f.id.map(|id| match id {
                FeatureId::String(s) => s,
                FeatureId::Number(n) => n.to_string(),
            }),
            bbox: bbox(f.bbox)?,
            extensions: extensions(&f.foreign, &FEATURE_RESERVED_KEYS),
        })
    }

    fn geometry(&mut self, g: GeometryObject) -> Result<Geometry> {
        Ok(match g {
            GeometryObject::Point { coordinates } => Geometry::Point(self.coord(&coordinates)?),
            GeometryObject::MultiPoint { coordinates } => {
                Geometry::MultiPoint(self.coords(&coordinates)?)
            }
            GeometryObject::LineString { coordinates } => {
                Geometry::LineString(self.coords(&coordinates)?)
            }
            GeometryObject::MultiLineString { coordinates } => {
                Geometry::MultiLineString(self.lines(&coordinates)?)
            }
            GeometryObject::Polygon { coordinates } => Geometry::Polygon(self.lines(&coordinates)?),
            GeometryObject::MultiPolygon { coordinates } => Geometry::MultiPolygon(
                coordinates
                    .iter()
                    .map(|p| self.lines(p))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    fn coord(&mut self, position: &[f64]) -> Result<Coord> {
        match position {
            [x, y] => Ok(Coord::new(*x, *y)),
            [x, y, ..] => {
                self.dropped_ordinates += 1;
                Ok(Coord::new(*x, *y))
            }
            _ => bail!("position needs at least two numbers, found {}", position.len()),
        }
    }

    fn coords(&mut self, positions: &[Position]) -> Result<Vec<Coord>> {
        positions.iter().map(|p| self.coord(p)).collect()
    }

    fn lines(&mut self, lines: &[Vec<Position>]) -> Result<Vec<Vec<Coord>>> {
        lines.iter().map(|l| self.coords(l)).collect()
    }
}

fn bbox(values: Option<Vec<f64>>) -> Result<Option<BoundingBox>> {
    let Some(values) = values else {
        return Ok(None);
    };
    BoundingBox::from_slice(&values)
        .map(Some)
        .with_context(|| format!("bbox must hold 4 or 6 numbers, found {}", values.len()))
}

fn extensions(foreign: &Map<String, Value>, reserved: &[&str]) -> AttrMap {
    foreign
        .iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), attr_value(v)))
        .collect()
}

fn attr_map(map: &Map<String, Value>) -> AttrMap {
    map.iter().map(|(k, v)| (k.clone(), attr_value(v))).collect()
}

fn attr_value(value: &Value) -> AttrValue {
    match value {
        Value::Null => AttrValue::Null,
        Value::Bool(b) => AttrValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttrValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                AttrValue::UInt(u)
            } else {
                AttrValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => AttrValue::String(s.clone()),
        Value::Array(items) => AttrValue::Array(items.iter().map(attr_value).collect()),
        Value::Object(map) => AttrValue::Object(attr_map(map)),
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Converts a document to a GeoJSON value.
pub fn document_to_json(document: &Document, srid: u32) -> Result<Value> {
    let root = match document {
        Document::Geometry(g) => GeoJson::Geometry(geometry_object(g)),
        Document::Feature(f) => GeoJson::Feature(feature_object(f)),
        Document::GeometryCollection(gc) => {
            GeoJson::GeometryCollection(GeometryCollectionObject {
                geometries: gc.geometries.iter().map(geometry_object).collect(),
                name: gc.name.clone(),
                bbox: gc.bbox.map(|b| b.as_slice().to_vec()),
                foreign: map_to_json(&gc.extensions),
            })
        }
        Document::FeatureCollection(fc) => GeoJson::FeatureCollection(FeatureCollectionObject {
            features: fc
                .features
                .iter()
                .map(|f| FeatureMember::Feature(feature_object(f)))
                .collect(),
            name: fc.name.clone(),
            bbox: fc.bbox.map(|b| b.as_slice().to_vec()),
            foreign: map_to_json(&fc.extensions),
        }),
    };

    let mut value = serde_json::to_value(&root).context("failed to build GeoJSON")?;
    if srid != DEFAULT_SRID {
        if let Value::Object(object) = &mut value {
            object.insert(CRS.into(), crs_member(srid));
        }
    }
    Ok(value)
}

fn feature_object(feature: &Feature) -> FeatureObject {
    FeatureObject {
        id: feature.id.clone().map(FeatureId::String),
        geometry: feature.geometry.as_ref().map(geometry_object),
        properties: feature.properties.as_ref().map(map_to_json),
        bbox: feature.bbox.map(|b| b.as_slice().to_vec()),
        foreign: map_to_json(&feature.extensions),
    }
}

fn position(c: &Coord) -> Position {
    vec![c.x, c.y]
}

fn positions(coords: &[Coord]) -> Vec<Position> {
    coords.iter().map(position).collect()
}

fn rings(parts: &[Vec<Coord>]) -> Vec<Vec<Position>> {
    parts.iter().map(|p| positions(p)).collect()
}

fn geometry_object(geometry: &Geometry) -> GeometryObject {
    match geometry {
        Geometry::Point(c) => GeometryObject::Point {
            coordinates: position(c),
        },
        Geometry::MultiPoint(points) => GeometryObject::MultiPoint {
            coordinates: positions(points),
        },
        Geometry::LineString(points) => GeometryObject::LineString {
            coordinates: positions(points),
        },
        Geometry::MultiLineString(lines) => GeometryObject::MultiLineString {
            coordinates: rings(lines),
        },
        Geometry::Polygon(parts) => GeometryObject::Polygon {
            coordinates: rings(parts),
        },
        Geometry::MultiPolygon(polygons) => GeometryObject::MultiPolygon {
            coordinates: polygons.iter().map(|p| rings(p)).collect(),
        },
    }
}

fn map_to_json(map: &AttrMap) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), attr_to_json(v)))
        .collect()
}

fn attr_to_json(value: &AttrValue) -> Value {
    match value {
        AttrValue::Null => Value::Null,
        AttrValue::Bool(b) => Value::Bool(*b),
        AttrValue::Int(i) => Value::from(*i),
        AttrValue::UInt(u) => Value::from(*u),
        AttrValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AttrValue::String(s) => Value::String(s.clone()),
        AttrValue::Array(items) => items.iter().map(attr_to_json).collect(),
        AttrValue::Object(map) => Value::Object(map_to_json(map)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srid_from_crs() {
        let value = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::28992" } },
            "features": []
        });
        assert_eq!(srid_from_crs(&value), Some(28992));
        assert_eq!(srid_from_crs(&json!({ "type": "Point" })), None);
        assert_eq!(
            srid_from_crs(&json!({ "crs": { "type": "link", "properties": {} } })),
            None
        );
    }

    #[test]
    fn test_default_scale() {
        assert_eq!(default_scale(4326), 10_000_000);
        assert_eq!(default_scale(28992), 100);
    }

    #[test]
    fn test_parse_feature_collection() {
        let value = json!({
            "type": "FeatureCollection",
            "name": "stations",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::4326" } },
            "features": [
                {
                    "type": "Feature",
                    "id": 7,
                    "geometry": { "type": "Point", "coordinates": [4.9, 52.37, 3.0] },
                    "properties": { "name": "Centraal", "platforms": 15, "open": true }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
                    "properties": null,
                    "source": "survey"
                }
            ]
        });

        let Document::FeatureCollection(fc) = parse_document(&value).unwrap() else {
            panic!("expected a feature collection");
        };
        assert_eq!(fc.name.as_deref(), Some("stations"));
        assert!(fc.extensions.is_empty());
        assert_eq!(fc.features.len(), 2);

        let first = &fc.features[0];
        assert_eq!(first.id.as_deref(), Some("7"));
        assert_eq!(first.geometry, Some(Geometry::Point(Coord::new(4.9, 52.37))));
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props["platforms"], AttrValue::Int(15));
        assert_eq!(props["open"], AttrValue::Bool(true));

        let second = &fc.features[1];
        assert_eq!(second.properties, None);
        assert_eq!(second.extensions.len(), 1);
        assert_eq!(second.extensions["source"], AttrValue::from("survey"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_document(&json!([1, 2])).is_err());
        assert!(parse_document(&json!({ "type": "Point", "coordinates": [1] })).is_err());
        assert!(parse_document(&json!({ "type": "Circle", "coordinates": [1, 2] })).is_err());
        assert!(
            parse_document(&json!({
                "type": "GeometryCollection",
                "geometries": [{ "type": "GeometryCollection", "geometries": [] }]
            }))
            .is_err()
        );
        assert!(
            parse_document(&json!({
                "type": "FeatureCollection",
                "features": [{ "type": "Point", "coordinates": [1, 2] }]
            }))
            .is_err()
        );
        assert!(
            parse_document(&json!({
                "type": "Feature",
                "geometry": null,
                "properties": null,
                "bbox": [1, 2, 3]
            }))
            .is_err()
        );
    }

    #[test]
    fn test_nested_crs_kept_as_extension() {
        let value = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::28992" } },
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
                "properties": null,
                "crs": { "type": "name", "properties": { "name": "local" } }
            }]
        });
        let document = parse_document(&value).unwrap();
        let Document::FeatureCollection(fc) = &document else {
            panic!("expected a feature collection");
        };
        assert!(fc.extensions.is_empty());
        assert!(fc.features[0].extensions.contains_key(CRS));

        assert_eq!(document_to_json(&document, 28992).unwrap(), value);
    }

    #[test]
    fn test_json_roundtrip() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": "a",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                },
                "properties": { "tags": ["x", 1, null], "h": 2.5 },
                "bbox": [0.0, 0.0, 1.0, 1.0]
            }],
            "name": "parcels"
        });
        let document = parse_document(&value).unwrap();
        assert_eq!(document_to_json(&document, 4326).unwrap(), value);
    }

    #[test]
    fn test_crs_written_for_other_srids() {
        let document = Document::Geometry(Geometry::Point(Coord::new(1.0, 2.0)));
        let value = document_to_json(&document, 28992).unwrap();
        assert_eq!(value["type"], "Point");
        assert_eq!(srid_from_crs(&value), Some(28992));
        assert!(document_to_json(&document, 4326).unwrap().get(CRS).is_none());
    }
}
