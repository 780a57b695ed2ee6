//! Envelope framing and the top-level encode/decode entry points.
//!
//! ```text
//! Envelope := Tag(4 bytes) Count(u32 BE) Chunk*
//! Chunk    := Length(u32 BE) Bytes[Length]
//! ```
//!
//! The declared count and lengths must consume the payload exactly.

use tracing::debug;

use crate::codec::cursor::CursorChaining;
use crate::codec::header::{AttributeMode, MessageHeader};
use crate::codec::message::{
    decode_feature_message, decode_feature_stream, decode_geometry_message,
    decode_geometry_stream, encode_feature_message, encode_feature_stream,
    encode_geometry_message, encode_geometry_stream,
};
use crate::codec::primitives::{Reader, Writer};
use crate::codec::quantize::{CoordEncoding, CoordFrame};
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_CHUNKS;
use crate::model::{Document, FeatureCollection, GeometryCollection};
use crate::validate::validate_document;

/// Length of an envelope tag.
pub const TAG_LEN: usize = 4;

/// Envelope type tag. Each tag has exactly one chunk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `GEOM`: one geometry message.
    Geometry,
    /// `GCV7`: one streaming geometry collection message.
    GeometryStream,
    /// `GCOL`: one geometry message per geometry.
    GeometryChunks,
    /// `FEAT`: one feature message.
    Feature,
    /// `FCV7`: one streaming feature collection message.
    FeatureStream,
    /// `FCOL`: one feature message per feature.
    FeatureChunks,
}

impl Tag {
    /// Returns the four tag bytes.
    pub const fn as_bytes(self) -> &'static [u8; TAG_LEN] {
        match self {
            Tag::Geometry => b"GEOM",
            Tag::GeometryStream => b"GCV7",
            Tag::GeometryChunks => b"GCOL",
            Tag::Feature => b"FEAT",
            Tag::FeatureStream => b"FCV7",
            Tag::FeatureChunks => b"FCOL",
        }
    }

    /// Returns the tag as text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::Geometry => "GEOM",
            Tag::GeometryStream => "GCV7",
            Tag::GeometryChunks => "GCOL",
            Tag::Feature => "FEAT",
            Tag::FeatureStream => "FCV7",
            Tag::FeatureChunks => "FCOL",
        }
    }

    /// Parses tag bytes.
    pub fn from_bytes(bytes: [u8; TAG_LEN]) -> Option<Tag> {
        match &bytes {
            b"GEOM" => Some(Tag::Geometry),
            b"GCV7" => Some(Tag::GeometryStream),
            b"GCOL" => Some(Tag::GeometryChunks),
            b"FEAT" => Some(Tag::Feature),
            b"FCV7" => Some(Tag::FeatureStream),
            b"FCOL" => Some(Tag::FeatureChunks),
            _ => None,
        }
    }
}

/// Prefixes a payload with its tag.
pub fn wrap(tag: Tag, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TAG_LEN + payload.len());
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Splits an envelope into its tag and payload.
pub fn unwrap(data: &[u8]) -> Result<(Tag, &[u8]), DecodeError> {
    if data.len() < TAG_LEN {
        return Err(DecodeError::TooShort { len: data.len() });
    }
    let mut found = [0u8; TAG_LEN];
    found.copy_from_slice(&data[..TAG_LEN]);
    let tag = Tag::from_bytes(found).ok_or(DecodeError::UnknownTag { found })?;
    Ok((tag, &data[TAG_LEN..]))
}

fn u32_len(field: &'static str, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::LengthExceedsLimit {
        field,
        len,
        max: u32::MAX as usize,
    })
}

/// Frames chunks as a big-endian count followed by length-prefixed chunks.
pub fn pack_chunks<C: AsRef<[u8]>>(chunks: &[C]) -> Result<Vec<u8>, EncodeError> {
    let total: usize = chunks.iter().map(|c| 4 + c.as_ref().len()).sum();
    let mut writer = Writer::with_capacity(4 + total);
    writer.write_u32_be(u32_len("chunks", chunks.len())?);
    for chunk in chunks {
        let chunk = chunk.as_ref();
        writer.write_u32_be(u32_len("chunk", chunk.len())?);
        writer.write_bytes(chunk);
    }
    Ok(writer.into_bytes())
}

/// Splits a payload framed by [`pack_chunks`].
///
/// Fails if a chunk runs past the end of the payload or if bytes remain
/// after the last chunk.
pub fn unpack_chunks(payload: &[u8]) -> Result<Vec<&[u8]>, DecodeError> {
    let mut reader = Reader::new(payload);
    let count = reader.read_u32_be("chunk count")? as usize;
    if count > MAX_CHUNKS {
        return Err(DecodeError::LengthExceedsLimit {
            field: "chunks",
            len: count,
            max: MAX_CHUNKS,
        });
    }
    if count.saturating_mul(4) > reader.remaining_len() {
        return Err(DecodeError::UnexpectedEof {
            context: "chunk lengths",
        });
    }

    let mut chunks = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u32_be("chunk length")? as usize;
        chunks.push(reader.read_bytes(len, "chunk")?);
    }
    reader.finish("last chunk")?;
    Ok(chunks)
}

// =============================================================================
// OPTIONS
// =============================================================================

/// How collections are laid out in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionLayout {
    /// One streaming message (`GCV7` / `FCV7`).
    #[default]
    Stream,
    /// One standalone message per element (`GCOL` / `FCOL`).
    ///
    /// Every element gets its own anchor, so no cursor state crosses element
    /// boundaries. Collection-level metadata cannot be represented.
    Chunked,
}

/// Options for encoding.
///
/// The defaults quantize at [`DEFAULT_SCALE`](crate::codec::DEFAULT_SCALE)
/// in [`DEFAULT_SRID`](crate::codec::DEFAULT_SRID), attach attributes, chain
/// the cursor across the whole collection and write streaming collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub frame: CoordFrame,
    pub coords: CoordEncoding,
    pub attributes: AttributeMode,
    pub chaining: CursorChaining,
    pub layout: CollectionLayout,
}

impl EncodeOptions {
    /// Creates default options for the given frame.
    pub fn new(srid: u32, scale: i64) -> Result<Self, EncodeError> {
        Ok(Self {
            frame: CoordFrame::new(srid, scale)?,
            ..Self::default()
        })
    }

    /// Sets the coordinate encoding.
    pub fn coords(mut self, coords: CoordEncoding) -> Self {
        self.coords = coords;
        self
    }

    /// Sets the attribute mode.
    pub fn attributes(mut self, attributes: AttributeMode) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the cursor chaining.
    pub fn chaining(mut self, chaining: CursorChaining) -> Self {
        self.chaining = chaining;
        self
    }

    /// Sets the collection layout.
    pub fn layout(mut self, layout: CollectionLayout) -> Self {
        self.layout = layout;
        self
    }

    fn header(&self) -> MessageHeader {
        MessageHeader {
            frame: self.frame,
            coords: self.coords,
            attributes: self.attributes,
            chaining: self.chaining,
        }
    }

    fn from_header(header: MessageHeader, layout: CollectionLayout) -> Self {
        Self {
            frame: header.frame,
            coords: header.coords,
            attributes: header.attributes,
            chaining: header.chaining,
            layout,
        }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a document with default options in the given frame.
pub fn encode(document: &Document, srid: u32, scale: i64) -> Result<Vec<u8>, EncodeError> {
    encode_with_options(document, EncodeOptions::new(srid, scale)?)
}

fn chunked_geometries(
    collection: &GeometryCollection,
    header: &MessageHeader,
) -> Result<Vec<Vec<u8>>, EncodeError> {
    if let Some(field) = collection.metadata_field() {
        return Err(EncodeError::UnsupportedByLayout { field });
    }
    collection
        .geometries
        .iter()
        .map(|g| encode_geometry_message(g, header))
        .collect()
}

fn chunked_features(
    collection: &FeatureCollection,
    header: &MessageHeader,
) -> Result<Vec<Vec<u8>>, EncodeError> {
    if let Some(field) = collection.metadata_field() {
        return Err(EncodeError::UnsupportedByLayout { field });
    }
    collection
        .features
        .iter()
        .enumerate()
        .map(|(index, f)| encode_feature_message(f, index, header))
        .collect()
}

/// Encodes a document.
///
/// The document is validated first; nothing is written for an invalid
/// document.
pub fn encode_with_options(
    document: &Document,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    validate_document(document)?;
    let header = options.header();

    let (tag, chunks) = match document {
        Document::Geometry(g) => (Tag::Geometry, vec![encode_geometry_message(g, &header)?]),
        Document::Feature(f) => (Tag::Feature, vec![encode_feature_message(f, 0, &header)?]),
        Document::GeometryCollection(gc) => match options.layout {
            CollectionLayout::Stream => {
                (Tag::GeometryStream, vec![encode_geometry_stream(gc, &header)?])
            }
            CollectionLayout::Chunked => (Tag::GeometryChunks, chunked_geometries(gc, &header)?),
        },
        Document::FeatureCollection(fc) => match options.layout {
            CollectionLayout::Stream => {
                (Tag::FeatureStream, vec![encode_feature_stream(fc, &header)?])
            }
            CollectionLayout::Chunked => (Tag::FeatureChunks, chunked_features(fc, &header)?),
        },
    };

    let bytes = wrap(tag, &pack_chunks(&chunks)?);
    debug!(
        tag = tag.as_str(),
        chunks = chunks.len(),
        bytes = bytes.len(),
        "encoded envelope"
    );
    Ok(bytes)
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a document.
pub fn decode(data: &[u8]) -> Result<Document, DecodeError> {
    decode_with_options(data).map(|(document, _)| document)
}

/// Decodes a document together with its coordinate frame.
pub fn decode_framed(data: &[u8]) -> Result<(Document, CoordFrame), DecodeError> {
    decode_with_options(data).map(|(document, options)| (document, options.frame))
}

fn single_chunk<'a>(tag: Tag, chunks: &[&'a [u8]]) -> Result<&'a [u8], DecodeError> {
    match chunks {
        [chunk] => Ok(*chunk),
        _ => Err(DecodeError::UnexpectedChunkCount {
            tag: tag.as_str(),
            expected: 1,
            found: chunks.len(),
        }),
    }
}

/// Decodes every chunk with `decode_chunk`, requiring identical headers.
fn decode_chunked<'a, T>(
    chunks: &[&'a [u8]],
    decode_chunk: impl Fn(&'a [u8]) -> Result<(T, MessageHeader), DecodeError>,
) -> Result<(Vec<T>, EncodeOptions), DecodeError> {
    let mut items = Vec::with_capacity(chunks.len());
    let mut first: Option<MessageHeader> = None;
    for (index, &chunk) in chunks.iter().enumerate() {
        let (item, header) = decode_chunk(chunk)?;
        match first {
            None => first = Some(header),
            Some(expected) if expected != header => {
                return Err(DecodeError::InconsistentHeader { index });
            }
            Some(_) => {}
        }
        items.push(item);
    }
    let options = match first {
        Some(header) => EncodeOptions::from_header(header, CollectionLayout::Chunked),
        None => EncodeOptions::default().layout(CollectionLayout::Chunked),
    };
    Ok((items, options))
}

/// Decodes a document together with the options that reproduce its bytes.
///
/// An empty chunked collection carries no header; default options are
/// returned for it.
pub fn decode_with_options(data: &[u8]) -> Result<(Document, EncodeOptions), DecodeError> {
    let (tag, payload) = unwrap(data)?;
    let chunks = unpack_chunks(payload)?;
    debug!(
        tag = tag.as_str(),
        chunks = chunks.len(),
        bytes = data.len(),
        "decoding envelope"
    );

    let stream = |header| EncodeOptions::from_header(header, CollectionLayout::Stream);
    match tag {
        Tag::Geometry => {
            let (g, header) = decode_geometry_message(single_chunk(tag, &chunks)?)?;
            Ok((Document::Geometry(g), stream(header)))
        }
        Tag::Feature => {
            let (f, header) = decode_feature_message(single_chunk(tag, &chunks)?)?;
            Ok((Document::Feature(f), stream(header)))
        }
        Tag::GeometryStream => {
            let (gc, header) = decode_geometry_stream(single_chunk(tag, &chunks)?)?;
            Ok((Document::GeometryCollection(gc), stream(header)))
        }
        Tag::FeatureStream => {
            let (fc, header) = decode_feature_stream(single_chunk(tag, &chunks)?)?;
            Ok((Document::FeatureCollection(fc), stream(header)))
        }
        Tag::GeometryChunks => {
            let (geometries, options) = decode_chunked(&chunks, decode_geometry_message)?;
            let gc = GeometryCollection {
                geometries,
                ..GeometryCollection::default()
            };
            Ok((Document::GeometryCollection(gc), options))
        }
        Tag::FeatureChunks => {
            let (features, options) = decode_chunked(&chunks, decode_feature_message)?;
            let fc = FeatureCollection {
                features,
                ..FeatureCollection::default()
            };
            Ok((Document::FeatureCollection(fc), options))
        }
    }
}
