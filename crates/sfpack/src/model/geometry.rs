//! Geometry types.
//!
//! Six geometry kinds are supported. Polygon rings are held closed (first
//! point repeated at the end) after decoding; on input either closed or open
//! rings are accepted.

/// A two-dimensional coordinate in the units of the collection's reference system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Creates a coordinate.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both ordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Coord {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Wire discriminant of a geometry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GeometryKind {
    Point = 1,
    MultiPoint = 2,
    LineString = 3,
    MultiLineString = 4,
    Polygon = 5,
    MultiPolygon = 6,
}

impl GeometryKind {
    /// Creates a GeometryKind from its wire representation.
    pub fn from_u8(v: u8) -> Option<GeometryKind> {
        match v {
            1 => Some(GeometryKind::Point),
            2 => Some(GeometryKind::MultiPoint),
            3 => Some(GeometryKind::LineString),
            4 => Some(GeometryKind::MultiLineString),
            5 => Some(GeometryKind::Polygon),
            6 => Some(GeometryKind::MultiPolygon),
            _ => None,
        }
    }

    /// Returns the GeoJSON type name.
    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::LineString => "LineString",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPolygon => "MultiPolygon",
        }
    }
}

/// A single geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    /// Exterior ring followed by holes.
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
}

impl Geometry {
    /// Returns the wire kind of this geometry.
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Visits every coordinate in stream order, closing points included.
    pub fn for_each_coord(&self, mut f: impl FnMut(&Coord)) {
        match self {
            Geometry::Point(c) => f(c),
            Geometry::MultiPoint(cs) | Geometry::LineString(cs) => cs.iter().for_each(f),
            Geometry::MultiLineString(parts) | Geometry::Polygon(parts) => {
                parts.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(f),
        }
    }

    /// Returns the first coordinate, if the geometry has any.
    pub fn first_coord(&self) -> Option<Coord> {
        match self {
            Geometry::Point(c) => Some(*c),
            Geometry::MultiPoint(cs) | Geometry::LineString(cs) => cs.first().copied(),
            Geometry::MultiLineString(parts) | Geometry::Polygon(parts) => {
                parts.iter().flatten().next().copied()
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().next().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for v in 1..=6u8 {
            let kind = GeometryKind::from_u8(v).unwrap();
            assert_eq!(kind as u8, v);
        }
        assert_eq!(GeometryKind::from_u8(0), None);
        assert_eq!(GeometryKind::from_u8(7), None);
    }

    #[test]
    fn test_first_coord_skips_empty_parts() {
        let g = Geometry::MultiPolygon(vec![
            vec![],
            vec![vec![Coord::new(1.0, 2.0), Coord::new(3.0, 4.0)]],
        ]);
        assert_eq!(g.first_coord(), Some(Coord::new(1.0, 2.0)));
        assert_eq!(Geometry::MultiPoint(vec![]).first_coord(), None);
    }
}
