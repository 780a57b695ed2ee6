//! Error types for sfpack encoding and decoding.

use thiserror::Error;

use crate::model::GeometryKind;

/// Error categories shared by encode and decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Invalid configuration (scale, missing geometry)
    Configuration,
    /// E002: Structural corruption of the encoded bytes
    StructuralCorruption,
    /// E003: Geometry or value is not representable
    DomainValidity,
    /// E004: Declared size exceeds a decoding limit
    LimitExceeded,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Configuration => "E001",
            ErrorCode::StructuralCorruption => "E002",
            ErrorCode::DomainValidity => "E003",
            ErrorCode::LimitExceeded => "E004",
        }
    }
}

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === E001: Configuration carried in the bytes ===
    #[error("[E001] scale must be a positive integer, found {scale}")]
    InvalidScale { scale: u64 },

    // === E002: Structural corruption ===
    #[error("[E002] input of {len} bytes is too short for an envelope tag")]
    TooShort { len: usize },

    #[error("[E002] unknown envelope tag {found:?}")]
    UnknownTag { found: [u8; 4] },

    #[error("[E002] {tag} envelope must hold {expected} chunk(s), found {found}")]
    UnexpectedChunkCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("[E002] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[E002] {remaining} trailing byte(s) after {context}")]
    TrailingBytes {
        context: &'static str,
        remaining: usize,
    },

    #[error("[E002] varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("[E002] varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("[E002] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[E002] unsupported message version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("[E002] srid {srid} does not fit in 32 bits")]
    InvalidSrid { srid: u64 },

    #[error("[E002] chunk {index} header differs from the header of chunk 0")]
    InconsistentHeader { index: usize },

    #[error("[E002] reserved bits are non-zero in {context}")]
    ReservedBitsSet { context: &'static str },

    #[error("[E002] invalid attribute value tag: {tag}")]
    InvalidValueTag { tag: u8 },

    #[error("[E002] invalid bounding box length {len} (expected 4 or 6)")]
    InvalidBBoxLength { len: usize },

    #[error("[E002] {dict} index {index} out of bounds (size: {size})")]
    IndexOutOfBounds {
        dict: &'static str,
        index: usize,
        size: usize,
    },

    #[error("[E002] {kind:?} declares {declared} points but carries {actual}")]
    PointCountMismatch {
        kind: GeometryKind,
        declared: usize,
        actual: usize,
    },

    #[error("[E002] {kind:?} part sizes sum to {sum}, expected {point_count}")]
    PartSizeMismatch {
        kind: GeometryKind,
        sum: usize,
        point_count: usize,
    },

    #[error("[E002] multipolygon ring counts sum to {sum}, but {parts} ring sizes are present")]
    RingCountMismatch { sum: usize, parts: usize },

    #[error("[E002] malformed {kind:?}: {context}")]
    MalformedGeometry {
        kind: GeometryKind,
        context: &'static str,
    },

    #[error("[E002] coordinate overflow while applying delta")]
    CoordinateOverflow,

    #[error("[E002] duplicate key {key:?} in attribute map")]
    DuplicateKey { key: String },

    // === E003: Domain validity ===
    #[error("[E003] unsupported geometry kind: {kind}")]
    InvalidGeometryKind { kind: u8 },

    #[error("[E003] ring has {points} point(s) after closure removal, at least 3 required")]
    DegenerateRing { points: usize },

    #[error("[E003] line string has {points} point(s), at least 2 required")]
    DegenerateLineString { points: usize },

    #[error("[E003] float value is NaN")]
    FloatIsNan,

    // === E004: Limits ===
    #[error("[E004] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E004] attribute nesting exceeds maximum depth {max}")]
    NestingTooDeep { max: usize },
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidScale { .. } => ErrorCode::Configuration,
            DecodeError::InvalidGeometryKind { .. }
            | DecodeError::DegenerateRing { .. }
            | DecodeError::DegenerateLineString { .. }
            | DecodeError::FloatIsNan => ErrorCode::DomainValidity,
            DecodeError::LengthExceedsLimit { .. } | DecodeError::NestingTooDeep { .. } => {
                ErrorCode::LimitExceeded
            }
            _ => ErrorCode::StructuralCorruption,
        }
    }
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    // === E001: Configuration ===
    #[error("[E001] scale must be a positive integer, got {scale}")]
    NonPositiveScale { scale: i64 },

    #[error("[E001] feature {index} has no geometry")]
    MissingGeometry { index: usize },

    #[error("[E001] chunked layout cannot carry collection-level {field}")]
    UnsupportedByLayout { field: &'static str },

    // === E003: Domain validity ===
    #[error("[E003] coordinate ({x}, {y}) is not finite")]
    NonFiniteCoordinate { x: f64, y: f64 },

    #[error("[E003] coordinate {value} times scale {scale} does not fit the quantized range")]
    QuantizationOverflow { value: f64, scale: i64 },

    #[error("[E003] delta between consecutive points overflows")]
    DeltaOverflow,

    #[error("[E003] ring has {points} point(s) after closure removal, at least 3 required")]
    DegenerateRing { points: usize },

    #[error("[E003] line string has {points} point(s), at least 2 required")]
    DegenerateLineString { points: usize },

    #[error("[E003] polygon must have at least one ring")]
    EmptyPolygon,

    #[error("[E003] float value is NaN")]
    FloatIsNan,

    #[error("[E003] extension key {key:?} collides with a reserved member")]
    ReservedExtensionKey { key: String },

    // === E004: Limits ===
    #[error("[E004] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E004] attribute nesting exceeds maximum depth {max}")]
    NestingTooDeep { max: usize },
}

impl EncodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EncodeError::NonPositiveScale { .. }
            | EncodeError::MissingGeometry { .. }
            | EncodeError::UnsupportedByLayout { .. } => ErrorCode::Configuration,
            EncodeError::LengthExceedsLimit { .. } | EncodeError::NestingTooDeep { .. } => {
                ErrorCode::LimitExceeded
            }
            _ => ErrorCode::DomainValidity,
        }
    }
}
