//! Features, collections and the top-level document.

use crate::model::{AttrMap, Geometry};

/// Top-level feature members that can never appear as extensions.
pub const FEATURE_RESERVED_KEYS: [&str; 5] = ["type", "geometry", "properties", "id", "bbox"];

/// Top-level feature collection members that can never appear as extensions.
pub const FEATURE_COLLECTION_RESERVED_KEYS: [&str; 4] = ["type", "features", "bbox", "name"];

/// Top-level geometry collection members that can never appear as extensions.
pub const GEOMETRY_COLLECTION_RESERVED_KEYS: [&str; 4] = ["type", "geometries", "bbox", "name"];

/// A bounding box, either `[minx, miny, maxx, maxy]` or the 3D variant
/// `[minx, miny, minz, maxx, maxy, maxz]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingBox {
    TwoD([f64; 4]),
    ThreeD([f64; 6]),
}

impl BoundingBox {
    /// Creates a bounding box from a slice of 4 or 6 values.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values.len() {
            4 => {
                let mut b = [0.0; 4];
                b.copy_from_slice(values);
                Some(BoundingBox::TwoD(b))
            }
            6 => {
                let mut b = [0.0; 6];
                b.copy_from_slice(values);
                Some(BoundingBox::ThreeD(b))
            }
            _ => None,
        }
    }

    /// Returns the values in wire order.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            BoundingBox::TwoD(b) => b,
            BoundingBox::ThreeD(b) => b,
        }
    }
}

/// A geometry with optional attributes.
///
/// `geometry` is optional in the model so that the encoder can report a
/// missing geometry by position instead of the caller failing earlier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    /// `None` and an empty map are equivalent on the wire; both decode as `None`.
    pub properties: Option<AttrMap>,
    pub id: Option<String>,
    pub bbox: Option<BoundingBox>,
    /// Top-level members outside [`FEATURE_RESERVED_KEYS`].
    pub extensions: AttrMap,
}

impl Feature {
    /// Creates a feature with only a geometry.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// Returns the properties if present and non-empty.
    pub fn non_empty_properties(&self) -> Option<&AttrMap> {
        self.properties.as_ref().filter(|p| !p.is_empty())
    }
}

/// An ordered sequence of features sharing one coordinate frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub bbox: Option<BoundingBox>,
    pub name: Option<String>,
    /// Top-level members outside [`FEATURE_COLLECTION_RESERVED_KEYS`].
    pub extensions: AttrMap,
}

impl FeatureCollection {
    /// Returns the name of the first collection-level member that is set.
    pub fn metadata_field(&self) -> Option<&'static str> {
        metadata_field(self.bbox.as_ref(), self.name.as_deref(), &self.extensions)
    }
}

/// An ordered sequence of bare geometries sharing one coordinate frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryCollection {
    pub geometries: Vec<Geometry>,
    pub bbox: Option<BoundingBox>,
    pub name: Option<String>,
    /// Top-level members outside [`GEOMETRY_COLLECTION_RESERVED_KEYS`].
    pub extensions: AttrMap,
}

impl GeometryCollection {
    /// Returns the name of the first collection-level member that is set.
    pub fn metadata_field(&self) -> Option<&'static str> {
        metadata_field(self.bbox.as_ref(), self.name.as_deref(), &self.extensions)
    }
}

fn metadata_field(
    bbox: Option<&BoundingBox>,
    name: Option<&str>,
    extensions: &AttrMap,
) -> Option<&'static str> {
    if bbox.is_some() {
        Some("bbox")
    } else if name.is_some() {
        Some("name")
    } else if !extensions.is_empty() {
        Some("extensions")
    } else {
        None
    }
}

/// Any value the codec can carry in one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Geometry(Geometry),
    GeometryCollection(GeometryCollection),
    Feature(Feature),
    FeatureCollection(FeatureCollection),
}

impl Document {
    /// Returns the GeoJSON type name of the document.
    pub fn type_name(&self) -> &'static str {
        match self {
            Document::Geometry(g) => g.kind().name(),
            Document::GeometryCollection(_) => "GeometryCollection",
            Document::Feature(_) => "Feature",
            Document::FeatureCollection(_) => "FeatureCollection",
        }
    }

    /// Visits every coordinate of every geometry in stream order.
    pub fn for_each_coord(&self, mut f: impl FnMut(&crate::model::Coord)) {
        match self {
            Document::Geometry(g) => g.for_each_coord(f),
            Document::GeometryCollection(gc) => {
                gc.geometries.iter().for_each(|g| g.for_each_coord(&mut f))
            }
            Document::Feature(feat) => {
                if let Some(g) = &feat.geometry {
                    g.for_each_coord(f)
                }
            }
            Document::FeatureCollection(fc) => fc
                .features
                .iter()
                .filter_map(|feat| feat.geometry.as_ref())
                .for_each(|g| g.for_each_coord(&mut f)),
        }
    }
}

impl From<Geometry> for Document {
    fn from(g: Geometry) -> Self {
        Document::Geometry(g)
    }
}

impl From<GeometryCollection> for Document {
    fn from(gc: GeometryCollection) -> Self {
        Document::GeometryCollection(gc)
    }
}

impl From<Feature> for Document {
    fn from(f: Feature) -> Self {
        Document::Feature(f)
    }
}

impl From<FeatureCollection> for Document {
    fn from(fc: FeatureCollection) -> Self {
        Document::FeatureCollection(fc)
    }
}
