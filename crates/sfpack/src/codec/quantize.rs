//! Coordinate quantization.
//!
//! A coordinate is stored as `round(value * scale)`, rounding half away from
//! zero, and restored as `quantized / scale`. The restored value is within
//! `0.5 / scale` of the original on each axis.

use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_QUANTIZED;
use crate::model::Coord;

/// Default scale: 1e7 gives ~1 cm resolution for degrees of longitude/latitude.
pub const DEFAULT_SCALE: i64 = 10_000_000;

/// Default spatial reference identifier (WGS 84).
pub const DEFAULT_SRID: u32 = 4326;

/// A positive quantization scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale(i64);

impl Scale {
    /// Creates a scale, rejecting zero and negative values.
    pub fn new(scale: i64) -> Result<Self, EncodeError> {
        if scale <= 0 {
            return Err(EncodeError::NonPositiveScale { scale });
        }
        Ok(Self(scale))
    }

    /// Creates a scale from its wire representation.
    pub(crate) fn from_wire(scale: u64) -> Result<Self, DecodeError> {
        match i64::try_from(scale) {
            Ok(s) if s > 0 => Ok(Self(s)),
            _ => Err(DecodeError::InvalidScale { scale }),
        }
    }

    /// Returns the scale factor.
    pub fn get(self) -> i64 {
        self.0
    }

    /// Largest absolute error introduced by quantizing with this scale.
    pub fn max_error(self) -> f64 {
        0.5 / self.0 as f64
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self(DEFAULT_SCALE)
    }
}

/// Spatial reference and scale shared by every coordinate in one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordFrame {
    pub srid: u32,
    pub scale: Scale,
}

impl CoordFrame {
    /// Creates a frame, rejecting a non-positive scale.
    pub fn new(srid: u32, scale: i64) -> Result<Self, EncodeError> {
        Ok(Self {
            srid,
            scale: Scale::new(scale)?,
        })
    }
}

impl Default for CoordFrame {
    fn default() -> Self {
        Self {
            srid: DEFAULT_SRID,
            scale: Scale::default(),
        }
    }
}

/// How coordinates are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordEncoding {
    /// Quantized integers, delta-encoded against a running cursor.
    #[default]
    QuantizedDelta,
    /// Plain `f64` pairs, lossless.
    Float,
}

/// A coordinate after quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QuantizedPoint {
    pub x: i64,
    pub y: i64,
}

impl QuantizedPoint {
    /// Creates a quantized point.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Quantizes both ordinates of a coordinate.
    pub fn from_coord(coord: Coord, scale: Scale) -> Result<Self, EncodeError> {
        if !coord.is_finite() {
            return Err(EncodeError::NonFiniteCoordinate {
                x: coord.x,
                y: coord.y,
            });
        }
        Ok(Self {
            x: quantize(coord.x, scale)?,
            y: quantize(coord.y, scale)?,
        })
    }

    /// Restores the floating-point coordinate.
    pub fn to_coord(self, scale: Scale) -> Coord {
        Coord::new(dequantize(self.x, scale), dequantize(self.y, scale))
    }
}

/// Quantizes one value.
///
/// Fails if the value is not finite or the scaled magnitude exceeds
/// [`MAX_QUANTIZED`].
pub fn quantize(value: f64, scale: Scale) -> Result<i64, EncodeError> {
    let scaled = (value * scale.get() as f64).round();
    if !scaled.is_finite() || scaled.abs() > MAX_QUANTIZED as f64 {
        return Err(EncodeError::QuantizationOverflow {
            value,
            scale: scale.get(),
        });
    }
    Ok(scaled as i64)
}

/// Restores one quantized value.
pub fn dequantize(value: i64, scale: Scale) -> f64 {
    value as f64 / scale.get() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_must_be_positive() {
        assert!(matches!(Scale::new(0), Err(EncodeError::NonPositiveScale { scale: 0 })));
        assert!(matches!(Scale::new(-5), Err(EncodeError::NonPositiveScale { scale: -5 })));
        assert_eq!(Scale::new(1000).unwrap().get(), 1000);
    }

    #[test]
    fn test_scale_from_wire() {
        assert!(matches!(Scale::from_wire(0), Err(DecodeError::InvalidScale { scale: 0 })));
        assert!(Scale::from_wire(u64::MAX).is_err());
        assert_eq!(Scale::from_wire(100).unwrap().get(), 100);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        let scale = Scale::new(10).unwrap();
        assert_eq!(quantize(0.25, scale).unwrap(), 3);
        assert_eq!(quantize(-0.25, scale).unwrap(), -3);
        assert_eq!(quantize(0.24, scale).unwrap(), 2);
    }

    #[test]
    fn test_quantize_known_values() {
        let scale = Scale::new(10_000_000).unwrap();
        assert_eq!(quantize(4.9, scale).unwrap(), 49_000_000);
        assert_eq!(quantize(52.37, scale).unwrap(), 523_700_000);
        assert_eq!(dequantize(523_700_000, scale), 52.37);
    }

    #[test]
    fn test_error_bound() {
        let scale = Scale::new(1000).unwrap();
        for v in [0.0, 0.0004, 0.0005, 1.23456, -179.99951, 89.123456789] {
            let restored = dequantize(quantize(v, scale).unwrap(), scale);
            assert!((restored - v).abs() <= scale.max_error() + 1e-12, "{v} -> {restored}");
        }
    }

    #[test]
    fn test_overflow_rejected() {
        let scale = Scale::new(DEFAULT_SCALE).unwrap();
        assert!(matches!(
            quantize(1e12, scale),
            Err(EncodeError::QuantizationOverflow { .. })
        ));
        assert!(matches!(
            quantize(f64::INFINITY, scale),
            Err(EncodeError::QuantizationOverflow { .. })
        ));
    }

    #[test]
    fn test_non_finite_coordinate() {
        let result = QuantizedPoint::from_coord(Coord::new(f64::NAN, 1.0), Scale::default());
        assert!(matches!(result, Err(EncodeError::NonFiniteCoordinate { .. })));
    }
}
