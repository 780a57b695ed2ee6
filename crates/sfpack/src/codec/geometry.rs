//! Geometry flattening and the geometry message body.
//!
//! Every geometry kind is reduced to one flat point sequence plus the sizes
//! needed to slice it back into parts:
//!
//! | Kind            | `part_sizes`                         | `poly_ring_counts` |
//! |-----------------|--------------------------------------|--------------------|
//! | Point           | `[]`                                 | `[]`               |
//! | MultiPoint      | `[n]`                                | `[]`               |
//! | LineString      | `[n]`, n >= 2                        | `[]`               |
//! | MultiLineString | one per line, each >= 2              | `[]`               |
//! | Polygon         | one per ring, each >= 3              | `[]`               |
//! | MultiPolygon    | every ring, polygon-major            | rings per polygon  |
//!
//! Ring sizes exclude the closing point, which is dropped on encode and
//! appended again on decode. Encoding also requires three distinct points
//! per ring; decoding checks the count only, since quantization may merge
//! nearby points.

use crate::codec::cursor::PointCodec;
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_PARTS, MAX_POINTS};
use crate::model::{Coord, Geometry, GeometryKind};

/// A geometry reduced to a flat point sequence and its structure.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamGeometry {
    pub kind: GeometryKind,
    pub part_sizes: Vec<usize>,
    pub poly_ring_counts: Vec<usize>,
    pub points: Vec<Coord>,
}

impl StreamGeometry {
    /// Number of points in the flat sequence.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

/// Returns the ring without its closing point, if it has one.
fn open_ring(ring: &[Coord]) -> &[Coord] {
    match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

fn push_line(out: &mut StreamGeometry, line: &[Coord]) -> Result<(), EncodeError> {
    if line.len() < 2 {
        return Err(EncodeError::DegenerateLineString { points: line.len() });
    }
    out.part_sizes.push(line.len());
    out.points.extend_from_slice(line);
    Ok(())
}

/// Counts distinct coordinates, stopping once `limit` are found.
fn distinct_points(ring: &[Coord], limit: usize) -> usize {
    let mut seen: Vec<Coord> = Vec::with_capacity(limit);
    for p in ring {
        if !seen.contains(p) {
            seen.push(*p);
            if seen.len() == limit {
                break;
            }
        }
    }
    seen.len()
}

fn push_polygon(out: &mut StreamGeometry, rings: &[Vec<Coord>]) -> Result<(), EncodeError> {
    if rings.is_empty() {
        return Err(EncodeError::EmptyPolygon);
    }
    for ring in rings {
        let ring = open_ring(ring);
        let distinct = distinct_points(ring, 3);
        if distinct < 3 {
            return Err(EncodeError::DegenerateRing { points: distinct });
        }
        out.part_sizes.push(ring.len());
        out.points.extend_from_slice(ring);
    }
    Ok(())
}

/// Flattens a geometry, checking the per-kind size rules.
pub fn flatten(geometry: &Geometry) -> Result<StreamGeometry, EncodeError> {
    let mut out = StreamGeometry {
        kind: geometry.kind(),
        part_sizes: Vec::new(),
        poly_ring_counts: Vec::new(),
        points: Vec::new(),
    };

    match geometry {
        Geometry::Point(c) => out.points.push(*c),
        Geometry::MultiPoint(points) => {
            out.part_sizes.push(points.len());
            out.points.extend_from_slice(points);
        }
        Geometry::LineString(line) => push_line(&mut out, line)?,
        Geometry::MultiLineString(lines) => {
            for line in lines {
                push_line(&mut out, line)?;
            }
        }
        Geometry::Polygon(rings) => push_polygon(&mut out, rings)?,
        Geometry::MultiPolygon(polygons) => {
            for rings in polygons {
                push_polygon(&mut out, rings)?;
                out.poly_ring_counts.push(rings.len());
            }
        }
    }

    check_encode_limits(&out)?;
    Ok(out)
}

fn check_encode_limits(stream: &StreamGeometry) -> Result<(), EncodeError> {
    if stream.points.len() > MAX_POINTS {
        return Err(EncodeError::LengthExceedsLimit {
            field: "points",
            len: stream.points.len(),
            max: MAX_POINTS,
        });
    }
    if stream.part_sizes.len() > MAX_PARTS {
        return Err(EncodeError::LengthExceedsLimit {
            field: "part_sizes",
            len: stream.part_sizes.len(),
            max: MAX_PARTS,
        });
    }
    Ok(())
}

/// Splits `points` into consecutive runs of the given sizes.
fn slice_parts(points: Vec<Coord>, sizes: &[usize]) -> Vec<Vec<Coord>> {
    let mut iter = points.into_iter();
    sizes
        .iter()
        .map(|&n| iter.by_ref().take(n).collect::<Vec<_>>())
        .collect()
}

fn close_ring(mut ring: Vec<Coord>) -> Vec<Coord> {
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}

fn check_rings(parts: &[usize]) -> Result<(), DecodeError> {
    match parts.iter().find(|&&n| n < 3) {
        Some(&n) => Err(DecodeError::DegenerateRing { points: n }),
        None => Ok(()),
    }
}

/// Rebuilds a geometry, checking that the structure matches the points.
pub fn unflatten(stream: StreamGeometry) -> Result<Geometry, DecodeError> {
    let StreamGeometry {
        kind,
        part_sizes,
        poly_ring_counts,
        points,
    } = stream;
    let point_count = points.len();

    if kind != GeometryKind::MultiPolygon && !poly_ring_counts.is_empty() {
        return Err(DecodeError::MalformedGeometry {
            kind,
            context: "ring counts are only valid on multipolygons",
        });
    }

    if kind != GeometryKind::Point {
        let sum = part_sizes
            .iter()
            .try_fold(0usize, |acc, &n| acc.checked_add(n))
            .unwrap_or(usize::MAX);
        if sum != point_count {
            return Err(DecodeError::PartSizeMismatch {
                kind,
                sum,
                point_count,
            });
        }
    }

    match kind {
        GeometryKind::Point => {
            if !part_sizes.is_empty() {
                return Err(DecodeError::MalformedGeometry {
                    kind,
                    context: "point must not carry part sizes",
                });
            }
            match points.as_slice() {
                [c] => Ok(Geometry::Point(*c)),
                _ => Err(DecodeError::MalformedGeometry {
                    kind,
                    context: "point must carry exactly one coordinate",
                }),
            }
        }
        GeometryKind::MultiPoint => {
            if part_sizes.len() != 1 {
                return Err(DecodeError::MalformedGeometry {
                    kind,
                    context: "multipoint must have exactly one part",
                });
            }
            Ok(Geometry::MultiPoint(points))
        }
        GeometryKind::LineString => match part_sizes.as_slice() {
            [n] if *n >= 2 => Ok(Geometry::LineString(points)),
            [n] => Err(DecodeError::DegenerateLineString { points: *n }),
            _ => Err(DecodeError::MalformedGeometry {
                kind,
                context: "line string must have exactly one part",
            }),
        },
        GeometryKind::MultiLineString => {
            if let Some(&n) = part_sizes.iter().find(|&&n| n < 2) {
                return Err(DecodeError::DegenerateLineString { points: n });
            }
            Ok(Geometry::MultiLineString(slice_parts(points, &part_sizes)))
        }
        GeometryKind::Polygon => {
            if part_sizes.is_empty() {
                return Err(DecodeError::MalformedGeometry {
                    kind,
                    context: "polygon must have at least one ring",
                });
            }
            check_rings(&part_sizes)?;
            let rings = slice_parts(points, &part_sizes);
            Ok(Geometry::Polygon(rings.into_iter().map(close_ring).collect()))
        }
        GeometryKind::MultiPolygon => {
            if poly_ring_counts.contains(&0) {
                return Err(DecodeError::MalformedGeometry {
                    kind,
                    context: "every polygon must have at least one ring",
                });
            }
            let ring_sum = poly_ring_counts
                .iter()
                .try_fold(0usize, |acc, &n| acc.checked_add(n))
                .unwrap_or(usize::MAX);
            if ring_sum != part_sizes.len() {
                return Err(DecodeError::RingCountMismatch {
                    sum: ring_sum,
                    parts: part_sizes.len(),
                });
            }
            check_rings(&part_sizes)?;

            let mut rings = slice_parts(points, &part_sizes).into_iter().map(close_ring);
            let polygons = poly_ring_counts
                .iter()
                .map(|&n| rings.by_ref().take(n).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            Ok(Geometry::MultiPolygon(polygons))
        }
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

fn write_sizes(writer: &mut Writer, sizes: &[usize]) {
    writer.write_varint(sizes.len() as u64);
    for &n in sizes {
        writer.write_varint(n as u64);
    }
}

fn read_sizes(reader: &mut Reader<'_>, field: &'static str) -> Result<Vec<usize>, DecodeError> {
    let count = reader.read_count(MAX_PARTS, 1, field)?;
    let mut sizes = Vec::with_capacity(count);
    for _ in 0..count {
        let n = reader.read_varint(field)?;
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        if n > MAX_POINTS {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len: n,
                max: MAX_POINTS,
            });
        }
        sizes.push(n);
    }
    Ok(sizes)
}

/// Writes one geometry body through the message's point codec.
pub(crate) fn write_geometry(
    writer: &mut Writer,
    geometry: &Geometry,
    points: &mut PointCodec,
) -> Result<(), EncodeError> {
    let stream = flatten(geometry)?;
    writer.write_byte(stream.kind as u8);
    writer.write_varint(stream.point_count() as u64);
    write_sizes(writer, &stream.part_sizes);
    write_sizes(writer, &stream.poly_ring_counts);
    points.write_points(writer, &stream.points)
}

/// Reads one geometry body through the message's point codec.
pub(crate) fn read_geometry(
    reader: &mut Reader<'_>,
    points: &mut PointCodec,
) -> Result<Geometry, DecodeError> {
    let kind_byte = reader.read_byte("geometry kind")?;
    let kind = GeometryKind::from_u8(kind_byte)
        .ok_or(DecodeError::InvalidGeometryKind { kind: kind_byte })?;

    let declared = reader.read_varint("point_count")?;
    let declared = usize::try_from(declared).unwrap_or(usize::MAX);
    if declared > MAX_POINTS {
        return Err(DecodeError::LengthExceedsLimit {
            field: "point_count",
            len: declared,
            max: MAX_POINTS,
        });
    }

    let part_sizes = read_sizes(reader, "part_sizes")?;
    let poly_ring_counts = read_sizes(reader, "poly_ring_counts")?;

    let actual = reader.read_count(MAX_POINTS, points.min_point_bytes(), "points")?;
    if actual != declared {
        return Err(DecodeError::PointCountMismatch {
            kind,
            declared,
            actual,
        });
    }

    let mut coords = Vec::new();
    points.read_points(reader, actual, &mut coords)?;

    unflatten(StreamGeometry {
        kind,
        part_sizes,
        poly_ring_counts,
        points: coords,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::cursor::CursorChaining;
    use crate::codec::quantize::{CoordEncoding, Scale};

    fn c(x: f64, y: f64) -> Coord {
        Coord::new(x, y)
    }

    fn square() -> Vec<Coord> {
        vec![c(0.0, 0.0), c(10.0, 0.0), c(10.0, 10.0), c(0.0, 10.0), c(0.0, 0.0)]
    }

    #[test]
    fn test_point_has_no_parts() {
        let stream = flatten(&Geometry::Point(c(1.0, 2.0))).unwrap();
        assert!(stream.part_sizes.is_empty());
        assert_eq!(stream.point_count(), 1);
    }

    #[test]
    fn test_empty_multipoint_has_one_empty_part() {
        let stream = flatten(&Geometry::MultiPoint(vec![])).unwrap();
        assert_eq!(stream.part_sizes, vec![0]);
        assert_eq!(stream.point_count(), 0);
        assert_eq!(unflatten(stream).unwrap(), Geometry::MultiPoint(vec![]));
    }

    #[test]
    fn test_polygon_closure_dropped() {
        let stream = flatten(&Geometry::Polygon(vec![square()])).unwrap();
        assert_eq!(stream.part_sizes, vec![4]);
        assert_eq!(stream.point_count(), 4);

        let open: Vec<_> = square()[..4].to_vec();
        let open_stream = flatten(&Geometry::Polygon(vec![open])).unwrap();
        assert_eq!(stream, open_stream);

        assert_eq!(unflatten(stream).unwrap(), Geometry::Polygon(vec![square()]));
    }

    #[test]
    fn test_three_point_ring() {
        let ring = vec![c(0.0, 0.0), c(1.0, 0.0), c(0.0, 1.0), c(0.0, 0.0)];
        let stream = flatten(&Geometry::Polygon(vec![ring.clone()])).unwrap();
        assert_eq!(stream.part_sizes, vec![3]);
        assert_eq!(unflatten(stream).unwrap(), Geometry::Polygon(vec![ring]));
    }

    #[test]
    fn test_degenerate_ring() {
        let ring = vec![c(0.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)];
        assert!(matches!(
            flatten(&Geometry::Polygon(vec![ring])),
            Err(EncodeError::DegenerateRing { points: 2 })
        ));
    }

    #[test]
    fn test_ring_needs_three_distinct_points() {
        let ring = vec![c(0.0, 0.0), c(0.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)];
        assert!(matches!(
            flatten(&Geometry::Polygon(vec![ring])),
            Err(EncodeError::DegenerateRing { points: 2 })
        ));

        // Repeated vertices are kept as long as three distinct ones remain.
        let ring = vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)];
        let stream = flatten(&Geometry::Polygon(vec![ring])).unwrap();
        assert_eq!(stream.part_sizes, vec![4]);
    }

    #[test]
    fn test_degenerate_lines() {
        assert!(matches!(
            flatten(&Geometry::LineString(vec![c(0.0, 0.0)])),
            Err(EncodeError::DegenerateLineString { points: 1 })
        ));
        assert!(matches!(
            flatten(&Geometry::MultiLineString(vec![vec![c(0.0, 0.0), c(1.0, 1.0)], vec![]])),
            Err(EncodeError::DegenerateLineString { points: 0 })
        ));
        assert!(matches!(flatten(&Geometry::Polygon(vec![])), Err(EncodeError::EmptyPolygon)));
    }

    #[test]
    fn test_multipolygon_single_ring_polygon() {
        let hole = vec![c(2.0, 2.0), c(4.0, 2.0), c(4.0, 4.0), c(2.0, 2.0)];
        let other = vec![c(20.0, 20.0), c(30.0, 20.0), c(30.0, 30.0), c(20.0, 20.0)];
        let mp = Geometry::MultiPolygon(vec![vec![square(), hole], vec![other]]);

        let stream = flatten(&mp).unwrap();
        assert_eq!(stream.poly_ring_counts, vec![2, 1]);
        assert_eq!(stream.part_sizes, vec![4, 3, 3]);
        assert_eq!(stream.point_count(), 10);
        assert_eq!(unflatten(stream).unwrap(), mp);
    }

    #[test]
    fn test_unflatten_rejects_mismatches() {
        let mut stream = flatten(&Geometry::Polygon(vec![square()])).unwrap();
        stream.part_sizes = vec![3];
        assert!(matches!(
            unflatten(stream),
            Err(DecodeError::PartSizeMismatch { sum: 3, point_count: 4, .. })
        ));

        let mut stream = flatten(&Geometry::MultiPolygon(vec![vec![square()]])).unwrap();
        stream.poly_ring_counts = vec![2];
        assert!(matches!(
            unflatten(stream),
            Err(DecodeError::RingCountMismatch { sum: 2, parts: 1 })
        ));

        let stream = StreamGeometry {
            kind: GeometryKind::Point,
            part_sizes: vec![],
            poly_ring_counts: vec![],
            points: vec![],
        };
        assert!(matches!(unflatten(stream), Err(DecodeError::MalformedGeometry { .. })));
    }

    #[test]
    fn test_body_point_count_cross_check() {
        let scale = Scale::new(1000).unwrap();
        let mut codec = PointCodec::for_encode(
            CoordEncoding::QuantizedDelta,
            scale,
            CursorChaining::Collection,
            Some(c(0.0, 0.0)),
        )
        .unwrap();

        let mut writer = Writer::new();
        write_geometry(&mut writer, &Geometry::LineString(vec![c(0.0, 0.0), c(1.0, 1.0)]), &mut codec)
            .unwrap();
        let mut bytes = writer.into_bytes();
        // point_count follows the kind byte
        bytes[1] = 3;

        let mut decoder = PointCodec::Delta {
            scale,
            anchor: Default::default(),
            cursor: Default::default(),
            chaining: CursorChaining::Collection,
        };
        let result = read_geometry(&mut Reader::new(&bytes), &mut decoder);
        assert!(matches!(
            result,
            Err(DecodeError::PointCountMismatch { declared: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_kind() {
        let bytes = [9u8, 0, 0, 0, 0];
        let mut codec = PointCodec::Float;
        assert!(matches!(
            read_geometry(&mut Reader::new(&bytes), &mut codec),
            Err(DecodeError::InvalidGeometryKind { kind: 9 })
        ));
    }
}
