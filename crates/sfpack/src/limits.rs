//! Decoding limits and format constants.
//!
//! Every count read from untrusted input is checked against one of these
//! before anything is allocated for it.

/// Current message version written after every header.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum bytes in an unsigned LEB128 varint.
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum points in a single geometry.
pub const MAX_POINTS: usize = 1 << 26;

/// Maximum entries in `part_sizes` or `poly_ring_counts`.
pub const MAX_PARTS: usize = 1 << 24;

/// Maximum geometries or features in one collection.
pub const MAX_ELEMENTS: usize = 1 << 24;

/// Maximum chunks in one envelope.
pub const MAX_CHUNKS: usize = 1 << 24;

/// Maximum length of a string (keys, ids, names, string values).
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum distinct attribute keys in one message.
pub const MAX_DICT_SIZE: usize = 1 << 20;

/// Maximum entries in a single attribute map or array.
pub const MAX_ATTR_ENTRIES: usize = 1 << 20;

/// Maximum nesting depth of attribute arrays and objects.
pub const MAX_ATTR_DEPTH: usize = 64;

/// Largest quantized magnitude accepted. Values up to 2^53 survive the
/// integer to float conversion in dequantization exactly.
pub const MAX_QUANTIZED: i64 = 1 << 53;
