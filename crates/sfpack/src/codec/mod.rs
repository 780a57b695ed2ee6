//! Binary encoding/decoding for sfpack.
//!
//! Layers, from the bytes inward:
//! - [`envelope`]: tag and chunk framing, top-level entry points
//! - [`message`]: per-chunk payloads (headers, key dictionaries, anchors)
//! - [`feature`] and [`attr`]: feature members and attribute values
//! - [`geometry`]: flattening geometries to one point sequence
//! - [`cursor`] and [`quantize`]: the delta-encoded integer point stream

pub mod attr;
pub mod cursor;
pub mod envelope;
pub mod feature;
pub mod geometry;
pub mod header;
pub mod message;
pub mod primitives;
pub mod quantize;

pub use attr::KeyDictionary;
pub use cursor::{CursorChaining, DeltaCursor, DeltaPoint};
pub use envelope::{
    decode, decode_framed, decode_with_options, encode, encode_with_options, pack_chunks,
    unpack_chunks, unwrap, wrap, CollectionLayout, EncodeOptions, Tag,
};
pub use geometry::{flatten, unflatten, StreamGeometry};
pub use header::{AttributeMode, MessageHeader};
pub use primitives::{zigzag_decode, zigzag_encode, Reader, Writer};
pub use quantize::{
    dequantize, quantize, CoordEncoding, CoordFrame, QuantizedPoint, Scale, DEFAULT_SCALE,
    DEFAULT_SRID,
};
