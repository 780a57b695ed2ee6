//! Attribute map and value encoding.
//!
//! Map keys go through a [`KeyEncoder`]: inside feature messages they are
//! interned into a per-message [`KeyDictionary`] and written as indices,
//! while collection metadata writes them inline.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_ATTR_DEPTH, MAX_ATTR_ENTRIES, MAX_DICT_SIZE, MAX_STRING_LEN};
use crate::model::{AttrMap, AttrValue};

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_UINT: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_OBJECT: u8 = 8;

/// Writes attribute map keys.
pub(crate) trait KeyEncoder {
    fn write_key(&mut self, writer: &mut Writer, key: &str);
}

/// Reads attribute map keys.
pub(crate) trait KeyDecoder {
    fn read_key(&self, reader: &mut Reader<'_>) -> Result<String, DecodeError>;
}

/// Keys written as length-prefixed strings.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InlineKeys;

impl KeyEncoder for InlineKeys {
    fn write_key(&mut self, writer: &mut Writer, key: &str) {
        writer.write_string(key);
    }
}

impl KeyDecoder for InlineKeys {
    fn read_key(&self, reader: &mut Reader<'_>) -> Result<String, DecodeError> {
        reader.read_string(MAX_STRING_LEN, "attribute key")
    }
}

/// Builder for the key dictionary of one message.
///
/// Keys are numbered in first-use order. Uses FxHashMap for fast lookups of
/// short strings.
#[derive(Debug, Clone, Default)]
pub struct KeyDictionary {
    keys: Vec<String>,
    indices: FxHashMap<String, usize>,
}

impl KeyDictionary {
    /// Creates a new empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or gets the index for a key.
    pub fn add(&mut self, key: &str) -> usize {
        if let Some(&idx) = self.indices.get(key) {
            idx
        } else {
            let idx = self.keys.len();
            self.keys.push(key.to_string());
            self.indices.insert(key.to_string(), idx);
            idx
        }
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key has been added.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Fails if the dictionary outgrew the decoding limit.
    pub fn validate_limits(&self) -> Result<(), EncodeError> {
        if self.keys.len() > MAX_DICT_SIZE {
            return Err(EncodeError::LengthExceedsLimit {
                field: "keys",
                len: self.keys.len(),
                max: MAX_DICT_SIZE,
            });
        }
        Ok(())
    }

    /// Writes the dictionary as a count followed by the keys.
    pub fn write(&self, writer: &mut Writer) {
        writer.write_varint(self.keys.len() as u64);
        for key in &self.keys {
            writer.write_string(key);
        }
    }

    /// Reads a dictionary written by [`KeyDictionary::write`].
    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<WireKeys, DecodeError> {
        let count = reader.read_count(MAX_DICT_SIZE, 1, "keys")?;
        let mut keys = Vec::with_capacity(count);
        let mut seen = FxHashSet::with_capacity_and_hasher(count, Default::default());
        for _ in 0..count {
            let key = reader.read_string(MAX_STRING_LEN, "key")?;
            if !seen.insert(key.clone()) {
                return Err(DecodeError::DuplicateKey { key });
            }
            keys.push(key);
        }
        Ok(WireKeys { keys })
    }
}

impl KeyEncoder for KeyDictionary {
    fn write_key(&mut self, writer: &mut Writer, key: &str) {
        let idx = self.add(key);
        writer.write_varint(idx as u64);
    }
}

/// A decoded key dictionary.
#[derive(Debug, Clone, Default)]
pub(crate) struct WireKeys {
    keys: Vec<String>,
}

impl KeyDecoder for WireKeys {
    fn read_key(&self, reader: &mut Reader<'_>) -> Result<String, DecodeError> {
        let index = reader.read_varint("key index")? as usize;
        self.keys
            .get(index)
            .cloned()
            .ok_or(DecodeError::IndexOutOfBounds {
                dict: "keys",
                index,
                size: self.keys.len(),
            })
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes an attribute map.
pub(crate) fn encode_attr_map<K: KeyEncoder>(
    writer: &mut Writer,
    map: &AttrMap,
    keys: &mut K,
) -> Result<(), EncodeError> {
    encode_map(writer, map, keys, 0)
}

fn encode_map<K: KeyEncoder>(
    writer: &mut Writer,
    map: &AttrMap,
    keys: &mut K,
    depth: usize,
) -> Result<(), EncodeError> {
    if map.len() > MAX_ATTR_ENTRIES {
        return Err(EncodeError::LengthExceedsLimit {
            field: "attribute map",
            len: map.len(),
            max: MAX_ATTR_ENTRIES,
        });
    }
    writer.write_varint(map.len() as u64);
    for (key, value) in map {
        keys.write_key(writer, key);
        encode_value(writer, value, keys, depth)?;
    }
    Ok(())
}

fn encode_value<K: KeyEncoder>(
    writer: &mut Writer,
    value: &AttrValue,
    keys: &mut K,
    depth: usize,
) -> Result<(), EncodeError> {
    match value {
        AttrValue::Null => writer.write_byte(TAG_NULL),
        AttrValue::Bool(false) => writer.write_byte(TAG_FALSE),
        AttrValue::Bool(true) => writer.write_byte(TAG_TRUE),
        AttrValue::Int(v) => {
            writer.write_byte(TAG_INT);
            writer.write_signed_varint(*v);
        }
        AttrValue::UInt(v) => {
            writer.write_byte(TAG_UINT);
            writer.write_varint(*v);
        }
        AttrValue::Float(v) => {
            if v.is_nan() {
                return Err(EncodeError::FloatIsNan);
            }
            writer.write_byte(TAG_FLOAT);
            writer.write_f64(*v);
        }
        AttrValue::String(s) => {
            writer.write_byte(TAG_STRING);
            writer.write_string(s);
        }
        AttrValue::Array(items) => {
            if depth >= MAX_ATTR_DEPTH {
                return Err(EncodeError::NestingTooDeep { max: MAX_ATTR_DEPTH });
            }
            if items.len() > MAX_ATTR_ENTRIES {
                return Err(EncodeError::LengthExceedsLimit {
                    field: "attribute array",
                    len: items.len(),
                    max: MAX_ATTR_ENTRIES,
                });
            }
            writer.write_byte(TAG_ARRAY);
            writer.write_varint(items.len() as u64);
            for item in items {
                encode_value(writer, item, keys, depth + 1)?;
            }
        }
        AttrValue::Object(map) => {
            if depth >= MAX_ATTR_DEPTH {
                return Err(EncodeError::NestingTooDeep { max: MAX_ATTR_DEPTH });
            }
            writer.write_byte(TAG_OBJECT);
            encode_map(writer, map, keys, depth + 1)?;
        }
    }
    Ok(())
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes an attribute map.
pub(crate) fn decode_attr_map<K: KeyDecoder>(
    reader: &mut Reader<'_>,
    keys: &K,
) -> Result<AttrMap, DecodeError> {
    decode_map(reader, keys, 0)
}

fn decode_map<K: KeyDecoder>(
    reader: &mut Reader<'_>,
    keys: &K,
    depth: usize,
) -> Result<AttrMap, DecodeError> {
    // Each entry is at least a one-byte key and a one-byte tag.
    let count = reader.read_count(MAX_ATTR_ENTRIES, 2, "attribute map")?;
    let mut map = AttrMap::new();
    for _ in 0..count {
        let key = keys.read_key(reader)?;
        let value = decode_value(reader, keys, depth)?;
        if map.contains_key(&key) {
            return Err(DecodeError::DuplicateKey { key });
        }
        map.insert(key, value);
    }
    Ok(map)
}

fn decode_value<K: KeyDecoder>(
    reader: &mut Reader<'_>,
    keys: &K,
    depth: usize,
) -> Result<AttrValue, DecodeError> {
    let tag = reader.read_byte("attribute tag")?;
    match tag {
        TAG_NULL => Ok(AttrValue::Null),
        TAG_FALSE => Ok(AttrValue::Bool(false)),
        TAG_TRUE => Ok(AttrValue::Bool(true)),
        TAG_INT => Ok(AttrValue::Int(reader.read_signed_varint("int")?)),
        TAG_UINT => Ok(AttrValue::UInt(reader.read_varint("uint")?)),
        TAG_FLOAT => Ok(AttrValue::Float(reader.read_f64("float")?)),
        TAG_STRING => Ok(AttrValue::String(reader.read_string(MAX_STRING_LEN, "string")?)),
        TAG_ARRAY => {
            if depth >= MAX_ATTR_DEPTH {
                return Err(DecodeError::NestingTooDeep { max: MAX_ATTR_DEPTH });
            }
            let count = reader.read_count(MAX_ATTR_ENTRIES, 1, "attribute array")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_value(reader, keys, depth + 1)?);
            }
            Ok(AttrValue::Array(items))
        }
        TAG_OBJECT => {
            if depth >= MAX_ATTR_DEPTH {
                return Err(DecodeError::NestingTooDeep { max: MAX_ATTR_DEPTH });
            }
            Ok(AttrValue::Object(decode_map(reader, keys, depth + 1)?))
        }
        _ => Err(DecodeError::InvalidValueTag { tag }),
    }
}
