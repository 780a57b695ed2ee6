//! Data model types for sfpack.
//!
//! This module contains the values the codec carries:
//! - Geometries (six kinds over 2D coordinates)
//! - Attribute values (JSON-like trees)
//! - Features, collections and the top-level document
//! - Builders (ergonomic construction)

pub mod attr;
pub mod builder;
pub mod feature;
pub mod geometry;

pub use attr::{AttrMap, AttrValue};
pub use builder::{FeatureBuilder, FeatureCollectionBuilder, GeometryCollectionBuilder};
pub use feature::{
    BoundingBox, Document, Feature, FeatureCollection, GeometryCollection,
    FEATURE_COLLECTION_RESERVED_KEYS, FEATURE_RESERVED_KEYS, GEOMETRY_COLLECTION_RESERVED_KEYS,
};
pub use geometry::{Coord, Geometry, GeometryKind};
