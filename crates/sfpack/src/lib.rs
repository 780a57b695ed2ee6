//! sfpack: quantized, delta-streamed binary codec for vector geographic data.
//!
//! This crate re-encodes point, line and polygon geometries, optionally with
//! attributes, into a compact binary form and back. Coordinates are
//! quantized with a caller-supplied scale, so every decoded ordinate is
//! within `0.5 / scale` of the original while topology is preserved exactly.
//!
//! # Quick Start
//!
//! ```rust
//! use sfpack::{decode, encode, Coord, Document, Geometry};
//!
//! let ring = vec![
//!     Coord::new(0.0, 0.0),
//!     Coord::new(10.0, 0.0),
//!     Coord::new(10.0, 10.0),
//!     Coord::new(0.0, 10.0),
//!     Coord::new(0.0, 0.0),
//! ];
//! let doc = Document::Geometry(Geometry::Polygon(vec![ring]));
//!
//! let bytes = encode(&doc, 4326, 1000).unwrap();
//! assert_eq!(&bytes[..4], b"GEOM");
//! assert_eq!(decode(&bytes).unwrap(), doc);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Geometries, attribute values, features and collections
//! - [`codec`]: Binary encoding/decoding
//! - [`validate`]: Checks run before encoding
//! - [`error`]: Error types
//! - [`limits`]: Security limits for decoding
//!
//! # Wire Format
//!
//! Every encoding starts with a four-byte tag followed by a big-endian chunk
//! count and length-prefixed chunks:
//! - `GEOM` / `FEAT`: one geometry or feature message
//! - `GCV7` / `FCV7`: one streaming collection message (default)
//! - `GCOL` / `FCOL`: one message per element (legacy layout)
//!
//! Inside a streaming message a single cursor runs through every point of
//! every element; each point is stored as a zigzag varint delta from the
//! previous one.
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - All allocations are bounded by limits and by the remaining input
//! - Varints are limited to prevent overflow
//! - Cursor arithmetic is checked
//! - Truncated or over-long input is rejected with descriptive errors

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{
    decode, decode_framed, decode_with_options, encode, encode_with_options, AttributeMode,
    CollectionLayout, CoordEncoding, CoordFrame, CursorChaining, EncodeOptions, Scale, Tag,
    DEFAULT_SCALE, DEFAULT_SRID,
};
pub use error::{DecodeError, EncodeError, ErrorCode};
pub use model::{
    AttrMap, AttrValue, BoundingBox, Coord, Document, Feature, FeatureBuilder, FeatureCollection,
    FeatureCollectionBuilder, Geometry, GeometryCollection, GeometryCollectionBuilder,
    GeometryKind,
};
pub use validate::validate_document;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
