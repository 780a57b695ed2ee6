//! Delta stream codec.
//!
//! A [`DeltaCursor`] holds the last quantized point written or read. Each
//! point is stored as the difference from the cursor, after which the cursor
//! moves to that point. Within one collection the cursor is carried from one
//! geometry to the next, so the bytes of a geometry depend on the geometry
//! written before it.

use crate::codec::primitives::{Reader, Writer};
use crate::codec::quantize::{CoordEncoding, QuantizedPoint, Scale};
use crate::error::{DecodeError, EncodeError};
use crate::model::Coord;

/// Difference between a quantized point and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeltaPoint {
    pub dx: i64,
    pub dy: i64,
}

impl DeltaPoint {
    /// Creates a delta.
    pub const fn new(dx: i64, dy: i64) -> Self {
        Self { dx, dy }
    }
}

/// Running position of a delta stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaCursor {
    position: QuantizedPoint,
}

impl DeltaCursor {
    /// Creates a cursor positioned at `anchor`.
    pub fn new(anchor: QuantizedPoint) -> Self {
        Self { position: anchor }
    }

    /// Returns the current position.
    pub fn position(&self) -> QuantizedPoint {
        self.position
    }

    /// Moves the cursor back to `anchor`.
    pub fn reset(&mut self, anchor: QuantizedPoint) {
        self.position = anchor;
    }

    /// Returns `point - cursor` and moves the cursor to `point`.
    pub fn encode_next(&mut self, point: QuantizedPoint) -> Result<DeltaPoint, EncodeError> {
        let dx = point.x.checked_sub(self.position.x).ok_or(EncodeError::DeltaOverflow)?;
        let dy = point.y.checked_sub(self.position.y).ok_or(EncodeError::DeltaOverflow)?;
        self.position = point;
        Ok(DeltaPoint { dx, dy })
    }

    /// Returns `cursor + delta` and moves the cursor there.
    pub fn decode_next(&mut self, delta: DeltaPoint) -> Result<QuantizedPoint, DecodeError> {
        let x = self.position.x.checked_add(delta.dx).ok_or(DecodeError::CoordinateOverflow)?;
        let y = self.position.y.checked_add(delta.dy).ok_or(DecodeError::CoordinateOverflow)?;
        self.position = QuantizedPoint { x, y };
        Ok(self.position)
    }
}

/// Whether the cursor carries over between elements of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorChaining {
    /// One cursor runs through the whole collection.
    #[default]
    Collection,
    /// The cursor returns to the anchor before every element.
    PerElement,
}

/// Coordinate state for one message.
///
/// Both the encoder and the decoder walk a message's geometries in the same
/// order through one `PointCodec`, which keeps their cursors in step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PointCodec {
    Float,
    Delta {
        scale: Scale,
        anchor: QuantizedPoint,
        cursor: DeltaCursor,
        chaining: CursorChaining,
    },
}

impl PointCodec {
    /// Creates the encoder state. The anchor is the first coordinate of the
    /// message, or the origin when the message has no coordinates.
    pub fn for_encode(
        coords: CoordEncoding,
        scale: Scale,
        chaining: CursorChaining,
        first: Option<Coord>,
    ) -> Result<Self, EncodeError> {
        match coords {
            CoordEncoding::Float => Ok(PointCodec::Float),
            CoordEncoding::QuantizedDelta => {
                let anchor = match first {
                    Some(c) => QuantizedPoint::from_coord(c, scale)?,
                    None => QuantizedPoint::default(),
                };
                Ok(PointCodec::Delta {
                    scale,
                    anchor,
                    cursor: DeltaCursor::new(anchor),
                    chaining,
                })
            }
        }
    }

    /// Reads the anchor (quantized mode only) and creates the decoder state.
    pub fn read(
        reader: &mut Reader<'_>,
        coords: CoordEncoding,
        scale: Scale,
        chaining: CursorChaining,
    ) -> Result<Self, DecodeError> {
        match coords {
            CoordEncoding::Float => Ok(PointCodec::Float),
            CoordEncoding::QuantizedDelta => {
                let x = reader.read_signed_varint("anchor.x")?;
                let y = reader.read_signed_varint("anchor.y")?;
                let anchor = QuantizedPoint { x, y };
                Ok(PointCodec::Delta {
                    scale,
                    anchor,
                    cursor: DeltaCursor::new(anchor),
                    chaining,
                })
            }
        }
    }

    /// Writes the anchor (quantized mode only).
    pub fn write_anchor(&self, writer: &mut Writer) {
        if let PointCodec::Delta { anchor, .. } = self {
            writer.write_signed_varint(anchor.x);
            writer.write_signed_varint(anchor.y);
        }
    }

    /// Minimum encoded size of one point.
    pub fn min_point_bytes(&self) -> usize {
        match self {
            PointCodec::Float => 16,
            PointCodec::Delta { .. } => 2,
        }
    }

    /// Called before each element of a collection.
    pub fn begin_element(&mut self) {
        if let PointCodec::Delta {
            anchor,
            cursor,
            chaining: CursorChaining::PerElement,
            ..
        } = self
        {
            cursor.reset(*anchor);
        }
    }

    /// Writes a point count followed by the points.
    pub fn write_points(&mut self, writer: &mut Writer, points: &[Coord]) -> Result<(), EncodeError> {
        writer.write_varint(points.len() as u64);
        match self {
            PointCodec::Float => {
                for p in points {
                    if !p.is_finite() {
                        return Err(EncodeError::NonFiniteCoordinate { x: p.x, y: p.y });
                    }
                    writer.write_f64(p.x);
                    writer.write_f64(p.y);
                }
            }
            PointCodec::Delta { scale, cursor, .. } => {
                for p in points {
                    let q = QuantizedPoint::from_coord(*p, *scale)?;
                    let d = cursor.encode_next(q)?;
                    writer.write_signed_varint(d.dx);
                    writer.write_signed_varint(d.dy);
                }
            }
        }
        Ok(())
    }

    /// Reads `count` points, appending them to `out`.
    pub fn read_points(
        &mut self,
        reader: &mut Reader<'_>,
        count: usize,
        out: &mut Vec<Coord>,
    ) -> Result<(), DecodeError> {
        out.reserve(count);
        match self {
            PointCodec::Float => {
                for _ in 0..count {
                    let x = reader.read_f64("point.x")?;
                    let y = reader.read_f64("point.y")?;
                    out.push(Coord::new(x, y));
                }
            }
            PointCodec::Delta { scale, cursor, .. } => {
                for _ in 0..count {
                    let dx = reader.read_signed_varint("point.dx")?;
                    let dy = reader.read_signed_varint("point.dy")?;
                    let q = cursor.decode_next(DeltaPoint { dx, dy })?;
                    out.push(q.to_coord(*scale));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_sequence() {
        let anchor = QuantizedPoint::new(100, 200);
        let points = [
            QuantizedPoint::new(100, 200),
            QuantizedPoint::new(110, 190),
            QuantizedPoint::new(-5, 0),
        ];

        let mut enc = DeltaCursor::new(anchor);
        let deltas: Vec<_> = points.iter().map(|p| enc.encode_next(*p).unwrap()).collect();
        assert_eq!(
            deltas,
            vec![DeltaPoint::new(0, 0), DeltaPoint::new(10, -10), DeltaPoint::new(-115, -190)]
        );

        let mut dec = DeltaCursor::new(anchor);
        let decoded: Vec<_> = deltas.iter().map(|d| dec.decode_next(*d).unwrap()).collect();
        assert_eq!(decoded, points);
        assert_eq!(enc.position(), dec.position());
    }

    #[test]
    fn test_deltas_depend_on_order() {
        let a = QuantizedPoint::new(0, 0);
        let b = QuantizedPoint::new(50, 50);

        let mut forward = DeltaCursor::default();
        forward.encode_next(a).unwrap();
        let fwd = forward.encode_next(b).unwrap();

        let mut backward = DeltaCursor::default();
        backward.encode_next(b).unwrap();
        let bwd = backward.encode_next(a).unwrap();

        assert_eq!(fwd, DeltaPoint::new(50, 50));
        assert_eq!(bwd, DeltaPoint::new(-50, -50));
    }

    #[test]
    fn test_decoding_out_of_order_gives_wrong_points() {
        let anchor = QuantizedPoint::new(10, 10);
        let points = [
            QuantizedPoint::new(10, 10),
            QuantizedPoint::new(30, 15),
            QuantizedPoint::new(25, 40),
        ];
        let mut enc = DeltaCursor::new(anchor);
        let mut deltas: Vec<_> = points.iter().map(|p| enc.encode_next(*p).unwrap()).collect();
        deltas.swap(1, 2);

        let mut dec = DeltaCursor::new(anchor);
        let decoded: Vec<_> = deltas.iter().map(|d| dec.decode_next(*d).unwrap()).collect();
        assert_ne!(decoded, points);
        assert_eq!(decoded[0], points[0]);
        assert_ne!(decoded[1], points[1]);
        assert_eq!(decoded[1], QuantizedPoint::new(5, 35));
        // Every delta is still applied once, so the chain ends where it started to.
        assert_eq!(decoded[2], points[2]);
    }

    #[test]
    fn test_decode_overflow() {
        let mut cursor = DeltaCursor::new(QuantizedPoint::new(i64::MAX, 0));
        assert!(matches!(
            cursor.decode_next(DeltaPoint::new(1, 0)),
            Err(DecodeError::CoordinateOverflow)
        ));
    }

    #[test]
    fn test_encode_overflow() {
        let mut cursor = DeltaCursor::new(QuantizedPoint::new(i64::MIN, 0));
        assert!(matches!(
            cursor.encode_next(QuantizedPoint::new(i64::MAX, 0)),
            Err(EncodeError::DeltaOverflow)
        ));
    }

    #[test]
    fn test_per_element_reset() {
        let scale = Scale::new(10).unwrap();
        let mut codec = PointCodec::for_encode(
            CoordEncoding::QuantizedDelta,
            scale,
            CursorChaining::PerElement,
            Some(Coord::new(1.0, 1.0)),
        )
        .unwrap();

        let mut first = Writer::new();
        codec.begin_element();
        codec.write_points(&mut first, &[Coord::new(2.0, 2.0)]).unwrap();

        let mut second = Writer::new();
        codec.begin_element();
        codec.write_points(&mut second, &[Coord::new(2.0, 2.0)]).unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
    }
}
