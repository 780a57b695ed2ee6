//! Builder API for ergonomic feature and collection construction.
//!
//! # Example
//!
//! ```rust
//! use sfpack::model::builder::FeatureCollectionBuilder;
//! use sfpack::{Coord, Geometry};
//!
//! let fc = FeatureCollectionBuilder::new()
//!     .name("stations")
//!     .feature(Geometry::Point(Coord::new(4.9, 52.37)), |f| f
//!         .id("ams")
//!         .property("name", "Amsterdam Centraal")
//!         .property("platforms", 15i64)
//!     )
//!     .feature(Geometry::Point(Coord::new(5.0, 52.40)), |f| f.id("ams-noord"))
//!     .build();
//!
//! assert_eq!(fc.features.len(), 2);
//! ```

use crate::model::{
    AttrMap, AttrValue, BoundingBox, Feature, FeatureCollection, Geometry, GeometryCollection,
};

/// Builder for a single [`Feature`].
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    geometry: Option<Geometry>,
    properties: AttrMap,
    id: Option<String>,
    bbox: Option<BoundingBox>,
    extensions: AttrMap,
}

impl FeatureBuilder {
    /// Creates a builder for a feature with the given geometry.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// Creates a builder with no geometry.
    ///
    /// Encoding the resulting feature fails with a missing-geometry error.
    pub fn without_geometry() -> Self {
        Self::default()
    }

    /// Sets one property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Extends the properties.
    pub fn properties(mut self, entries: impl IntoIterator<Item = (String, AttrValue)>) -> Self {
        self.properties.extend(entries);
        self
    }

    /// Sets the identifier.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the bounding box.
    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Sets a non-reserved top-level member.
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Builds the feature. An empty property map becomes `None`.
    pub fn build(self) -> Feature {
        Feature {
            geometry: self.geometry,
            properties: if self.properties.is_empty() {
                None
            } else {
                Some(self.properties)
            },
            id: self.id,
            bbox: self.bbox,
            extensions: self.extensions,
        }
    }
}

/// Builder for a [`FeatureCollection`].
#[derive(Debug, Clone, Default)]
pub struct FeatureCollectionBuilder {
    inner: FeatureCollection,
}

impl FeatureCollectionBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature using a builder function.
    pub fn feature<F>(mut self, geometry: Geometry, f: F) -> Self
    where
        F: FnOnce(FeatureBuilder) -> FeatureBuilder,
    {
        self.inner.features.push(f(FeatureBuilder::new(geometry)).build());
        self
    }

    /// Adds a feature with only a geometry.
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.inner.features.push(Feature::new(geometry));
        self
    }

    /// Adds an already built feature.
    pub fn push(mut self, feature: Feature) -> Self {
        self.inner.features.push(feature);
        self
    }

    /// Sets the collection name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = Some(name.into());
        self
    }

    /// Sets the collection bounding box.
    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.inner.bbox = Some(bbox);
        self
    }

    /// Sets a non-reserved top-level member.
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.inner.extensions.insert(key.into(), value.into());
        self
    }

    /// Builds the collection.
    pub fn build(self) -> FeatureCollection {
        self.inner
    }
}

/// Builder for a [`GeometryCollection`].
#[derive(Debug, Clone, Default)]
pub struct GeometryCollectionBuilder {
    inner: GeometryCollection,
}

impl GeometryCollectionBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a geometry.
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.inner.geometries.push(geometry);
        self
    }

    /// Sets the collection name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = Some(name.into());
        self
    }

    /// Sets the collection bounding box.
    pub fn bbox(mut self, bbox: BoundingBox) -> Self {
        self.inner.bbox = Some(bbox);
        self
    }

    /// Sets a non-reserved top-level member.
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.inner.extensions.insert(key.into(), value.into());
        self
    }

    /// Builds the collection.
    pub fn build(self) -> GeometryCollection {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coord;

    #[test]
    fn test_feature_builder() {
        let feature = FeatureBuilder::new(Geometry::Point(Coord::new(1.0, 2.0)))
            .id("a")
            .property("height", 12.5)
            .property("floors", 3i64)
            .extension("source", "survey")
            .build();

        assert_eq!(feature.id.as_deref(), Some("a"));
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props.get("floors"), Some(&AttrValue::Int(3)));
        assert_eq!(feature.extensions.len(), 1);
    }

    #[test]
    fn test_empty_properties_build_as_none() {
        let feature = FeatureBuilder::new(Geometry::Point(Coord::default())).build();
        assert!(feature.properties.is_none());
    }

    #[test]
    fn test_collection_builders() {
        let fc = FeatureCollectionBuilder::new()
            .name("layer")
            .geometry(Geometry::Point(Coord::new(0.0, 0.0)))
            .feature(Geometry::Point(Coord::new(1.0, 1.0)), |f| f.id("b"))
            .build();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(fc.metadata_field(), Some("name"));

        let gc = GeometryCollectionBuilder::new()
            .geometry(Geometry::LineString(vec![Coord::new(0.0, 0.0), Coord::new(1.0, 1.0)]))
            .build();
        assert_eq!(gc.geometries.len(), 1);
        assert_eq!(gc.metadata_field(), None);
    }
}
