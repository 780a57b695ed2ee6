//! Document validation run before encoding.
//!
//! Structural rules of individual geometries (ring and line sizes) are
//! checked while flattening; this module checks what the encoder would
//! otherwise discover halfway through a message: missing geometries,
//! non-finite coordinates, reserved extension names, unrepresentable
//! attribute values and oversized strings.

use crate::error::EncodeError;
use crate::limits::{MAX_ATTR_DEPTH, MAX_STRING_LEN};
use crate::model::{
    AttrMap, AttrValue, BoundingBox, Document, Feature, Geometry,
    FEATURE_COLLECTION_RESERVED_KEYS, FEATURE_RESERVED_KEYS, GEOMETRY_COLLECTION_RESERVED_KEYS,
};

/// Validates a document for encoding.
pub fn validate_document(document: &Document) -> Result<(), EncodeError> {
    match document {
        Document::Geometry(g) => validate_geometry(g),
        Document::Feature(f) => validate_feature(f, 0),
        Document::GeometryCollection(gc) => {
            validate_collection_meta(
                gc.bbox.as_ref(),
                gc.name.as_deref(),
                &gc.extensions,
                &GEOMETRY_COLLECTION_RESERVED_KEYS,
            )?;
            gc.geometries.iter().try_for_each(validate_geometry)
        }
        Document::FeatureCollection(fc) => {
            validate_collection_meta(
                fc.bbox.as_ref(),
                fc.name.as_deref(),
                &fc.extensions,
                &FEATURE_COLLECTION_RESERVED_KEYS,
            )?;
            fc.features
                .iter()
                .enumerate()
                .try_for_each(|(index, f)| validate_feature(f, index))
        }
    }
}

/// Checks that every coordinate is finite.
pub fn validate_geometry(geometry: &Geometry) -> Result<(), EncodeError> {
    let mut result = Ok(());
    geometry.for_each_coord(|c| {
        if result.is_ok() && !c.is_finite() {
            result = Err(EncodeError::NonFiniteCoordinate { x: c.x, y: c.y });
        }
    });
    result
}

/// Validates one feature; `index` is its position in the collection.
pub fn validate_feature(feature: &Feature, index: usize) -> Result<(), EncodeError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or(EncodeError::MissingGeometry { index })?;
    validate_geometry(geometry)?;

    if let Some(id) = &feature.id {
        validate_string("id", id)?;
    }
    if let Some(bbox) = &feature.bbox {
        validate_bbox(bbox)?;
    }
    if let Some(props) = &feature.properties {
        validate_attr_map(props, 0)?;
    }
    validate_extensions(&feature.extensions, &FEATURE_RESERVED_KEYS)
}

fn validate_collection_meta(
    bbox: Option<&BoundingBox>,
    name: Option<&str>,
    extensions: &AttrMap,
    reserved: &[&str],
) -> Result<(), EncodeError> {
    if let Some(bbox) = bbox {
        validate_bbox(bbox)?;
    }
    if let Some(name) = name {
        validate_string("name", name)?;
    }
    validate_extensions(extensions, reserved)
}

fn validate_extensions(extensions: &AttrMap, reserved: &[&str]) -> Result<(), EncodeError> {
    if let Some(key) = extensions.keys().find(|k| reserved.contains(&k.as_str())) {
        return Err(EncodeError::ReservedExtensionKey { key: key.clone() });
    }
    validate_attr_map(extensions, 0)
}

fn validate_bbox(bbox: &BoundingBox) -> Result<(), EncodeError> {
    if bbox.as_slice().iter().any(|v| v.is_nan()) {
        return Err(EncodeError::FloatIsNan);
    }
    Ok(())
}

fn validate_string(field: &'static str, s: &str) -> Result<(), EncodeError> {
    if s.len() > MAX_STRING_LEN {
        return Err(EncodeError::LengthExceedsLimit {
            field,
            len: s.len(),
            max: MAX_STRING_LEN,
        });
    }
    Ok(())
}

fn validate_attr_map(map: &AttrMap, depth: usize) -> Result<(), EncodeError> {
    for (key, value) in map {
        validate_string("attribute key", key)?;
        validate_attr_value(value, depth)?;
    }
    Ok(())
}

/// Validates a single attribute value.
///
/// This checks:
/// - NaN not allowed in floats
/// - Nesting depth
/// - String length
pub fn validate_attr_value(value: &AttrValue, depth: usize) -> Result<(), EncodeError> {
    match value {
        AttrValue::Float(v) if v.is_nan() => Err(EncodeError::FloatIsNan),
        AttrValue::String(s) => validate_string("string", s),
        AttrValue::Array(items) => {
            if depth >= MAX_ATTR_DEPTH {
                return Err(EncodeError::NestingTooDeep { max: MAX_ATTR_DEPTH });
            }
            items.iter().try_for_each(|v| validate_attr_value(v, depth + 1))
        }
        AttrValue::Object(map) => {
            if depth >= MAX_ATTR_DEPTH {
                return Err(EncodeError::NestingTooDeep { max: MAX_ATTR_DEPTH });
            }
            validate_attr_map(map, depth + 1)
        }
        _ => Ok(()),
    }
}
