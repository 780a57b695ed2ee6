//! Message payloads carried in envelope chunks.
//!
//! ```text
//! Geometry message   := Header [Anchor] Geometry
//! Feature message    := Header [Keys] [Anchor] Feature
//! Geometry stream    := Header Meta [Anchor] Count Geometry*
//! Feature stream     := Header Meta [Keys] [Anchor] Count Feature*
//! Meta               := Flags(u8) [BBox] [Name] [Extensions]
//! ```
//!
//! `Keys` is present in attached mode only; `Anchor` in quantized mode only.
//! A stream message runs one cursor through all of its elements, so the
//! first point of each element is a delta from the last point of the one
//! before it.

use crate::codec::attr::{
    decode_attr_map, encode_attr_map, InlineKeys, KeyDictionary, WireKeys,
};
use crate::codec::cursor::PointCodec;
use crate::codec::feature::{drop_reserved, read_bbox, read_feature, write_bbox, write_feature};
use crate::codec::geometry::{read_geometry, write_geometry};
use crate::codec::header::{AttributeMode, MessageHeader};
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_ELEMENTS, MAX_STRING_LEN};
use crate::model::{
    AttrMap, BoundingBox, Coord, Feature, FeatureCollection, Geometry, GeometryCollection,
    FEATURE_COLLECTION_RESERVED_KEYS, GEOMETRY_COLLECTION_RESERVED_KEYS,
};

const META_HAS_BBOX: u8 = 0x01;
const META_HAS_NAME: u8 = 0x02;
const META_HAS_EXTENSIONS: u8 = 0x04;
const META_FLAGS_KNOWN: u8 = META_HAS_BBOX | META_HAS_NAME | META_HAS_EXTENSIONS;

/// Smallest possible geometry body: kind plus four empty counts.
const MIN_GEOMETRY_BYTES: usize = 5;

/// Collection-level members.
#[derive(Debug, Default)]
struct CollectionMeta {
    bbox: Option<BoundingBox>,
    name: Option<String>,
    extensions: AttrMap,
}

fn write_meta(
    writer: &mut Writer,
    bbox: Option<&BoundingBox>,
    name: Option<&str>,
    extensions: &AttrMap,
) -> Result<(), EncodeError> {
    let mut flags = 0u8;
    if bbox.is_some() {
        flags |= META_HAS_BBOX;
    }
    if name.is_some() {
        flags |= META_HAS_NAME;
    }
    if !extensions.is_empty() {
        flags |= META_HAS_EXTENSIONS;
    }
    writer.write_byte(flags);

    if let Some(bbox) = bbox {
        write_bbox(writer, bbox)?;
    }
    if let Some(name) = name {
        writer.write_string(name);
    }
    if !extensions.is_empty() {
        encode_attr_map(writer, extensions, &mut InlineKeys)?;
    }
    Ok(())
}

fn read_meta(reader: &mut Reader<'_>, reserved: &[&str]) -> Result<CollectionMeta, DecodeError> {
    let flags = reader.read_byte("collection flags")?;
    if flags & !META_FLAGS_KNOWN != 0 {
        return Err(DecodeError::ReservedBitsSet {
            context: "collection flags",
        });
    }

    let mut meta = CollectionMeta::default();
    if flags & META_HAS_BBOX != 0 {
        meta.bbox = Some(read_bbox(reader)?);
    }
    if flags & META_HAS_NAME != 0 {
        meta.name = Some(reader.read_string(MAX_STRING_LEN, "name")?);
    }
    if flags & META_HAS_EXTENSIONS != 0 {
        meta.extensions = drop_reserved(decode_attr_map(reader, &InlineKeys)?, reserved);
    }
    Ok(meta)
}

fn read_keys(reader: &mut Reader<'_>, mode: AttributeMode) -> Result<WireKeys, DecodeError> {
    match mode {
        AttributeMode::Attached => KeyDictionary::read(reader),
        AttributeMode::Bare => Ok(WireKeys::default()),
    }
}

fn first_coord<'a>(mut geometries: impl Iterator<Item = &'a Geometry>) -> Option<Coord> {
    geometries.find_map(Geometry::first_coord)
}

fn point_codec(header: &MessageHeader, first: Option<Coord>) -> Result<PointCodec, EncodeError> {
    PointCodec::for_encode(header.coords, header.frame.scale, header.chaining, first)
}

fn read_point_codec(
    reader: &mut Reader<'_>,
    header: &MessageHeader,
) -> Result<PointCodec, DecodeError> {
    PointCodec::read(reader, header.coords, header.frame.scale, header.chaining)
}

fn check_element_count(field: &'static str, len: usize) -> Result<(), EncodeError> {
    if len > MAX_ELEMENTS {
        return Err(EncodeError::LengthExceedsLimit {
            field,
            len,
            max: MAX_ELEMENTS,
        });
    }
    Ok(())
}

// =============================================================================
// SINGLE GEOMETRY
// =============================================================================

pub(crate) fn encode_geometry_message(
    geometry: &Geometry,
    header: &MessageHeader,
) -> Result<Vec<u8>, EncodeError> {
    let mut points = point_codec(header, geometry.first_coord())?;
    let mut writer = Writer::with_capacity(64);
    header.write(&mut writer);
    points.write_anchor(&mut writer);
    write_geometry(&mut writer, geometry, &mut points)?;
    Ok(writer.into_bytes())
}

pub(crate) fn decode_geometry_message(
    data: &[u8],
) -> Result<(Geometry, MessageHeader), DecodeError> {
    let mut reader = Reader::new(data);
    let header = MessageHeader::read(&mut reader)?;
    let mut points = read_point_codec(&mut reader, &header)?;
    let geometry = read_geometry(&mut reader, &mut points)?;
    reader.finish("geometry message")?;
    Ok((geometry, header))
}

// =============================================================================
// SINGLE FEATURE
// =============================================================================

pub(crate) fn encode_feature_message(
    feature: &Feature,
    index: usize,
    header: &MessageHeader,
) -> Result<Vec<u8>, EncodeError> {
    let first = feature.geometry.as_ref().and_then(Geometry::first_coord);
    let mut points = point_codec(header, first)?;
    let mut keys = KeyDictionary::new();
    let mut body = Writer::with_capacity(64);
    write_feature(&mut body, feature, index, header.attributes, &mut points, &mut keys)?;
    keys.validate_limits()?;

    let mut writer = Writer::with_capacity(32 + body.len());
    header.write(&mut writer);
    if header.attributes == AttributeMode::Attached {
        keys.write(&mut writer);
    }
    points.write_anchor(&mut writer);
    writer.write_bytes(body.as_bytes());
    Ok(writer.into_bytes())
}

pub(crate) fn decode_feature_message(
    data: &[u8],
) -> Result<(Feature, MessageHeader), DecodeError> {
    let mut reader = Reader::new(data);
    let header = MessageHeader::read(&mut reader)?;
    let keys = read_keys(&mut reader, header.attributes)?;
    let mut points = read_point_codec(&mut reader, &header)?;
    let feature = read_feature(&mut reader, header.attributes, &mut points, &keys)?;
    reader.finish("feature message")?;
    Ok((feature, header))
}

// =============================================================================
// STREAMING COLLECTIONS
// =============================================================================

pub(crate) fn encode_geometry_stream(
    collection: &GeometryCollection,
    header: &MessageHeader,
) -> Result<Vec<u8>, EncodeError> {
    check_element_count("geometries", collection.geometries.len())?;

    let mut points = point_codec(header, first_coord(collection.geometries.iter()))?;
    let mut body = Writer::with_capacity(collection.geometries.len() * 32);
    for geometry in &collection.geometries {
        points.begin_element();
        write_geometry(&mut body, geometry, &mut points)?;
    }

    let mut writer = Writer::with_capacity(64 + body.len());
    header.write(&mut writer);
    write_meta(
        &mut writer,
        collection.bbox.as_ref(),
        collection.name.as_deref(),
        &collection.extensions,
    )?;
    points.write_anchor(&mut writer);
    writer.write_varint(collection.geometries.len() as u64);
    writer.write_bytes(body.as_bytes());
    Ok(writer.into_bytes())
}

pub(crate) fn decode_geometry_stream(
    data: &[u8],
) -> Result<(GeometryCollection, MessageHeader), DecodeError> {
    let mut reader = Reader::new(data);
    let header = MessageHeader::read(&mut reader)?;
    let meta = read_meta(&mut reader, &GEOMETRY_COLLECTION_RESERVED_KEYS)?;
    let mut points = read_point_codec(&mut reader, &header)?;

    let count = reader.read_count(MAX_ELEMENTS, MIN_GEOMETRY_BYTES, "geometries")?;
    let mut geometries = Vec::with_capacity(count);
    for _ in 0..count {
        points.begin_element();
        geometries.push(read_geometry(&mut reader, &mut points)?);
    }
    reader.finish("geometry collection")?;

    Ok((
        GeometryCollection {
            geometries,
            bbox: meta.bbox,
            name: meta.name,
            extensions: meta.extensions,
        },
        header,
    ))
}

pub(crate) fn encode_feature_stream(
    collection: &FeatureCollection,
    header: &MessageHeader,
) -> Result<Vec<u8>, EncodeError> {
    check_element_count("features", collection.features.len())?;

    let first = first_coord(collection.features.iter().filter_map(|f| f.geometry.as_ref()));
    let mut points = point_codec(header, first)?;
    let mut keys = KeyDictionary::new();
    let mut body = Writer::with_capacity(collection.features.len() * 64);
    for (index, feature) in collection.features.iter().enumerate() {
        points.begin_element();
        write_feature(&mut body, feature, index, header.attributes, &mut points, &mut keys)?;
    }
    keys.validate_limits()?;

    let mut writer = Writer::with_capacity(64 + body.len());
    header.write(&mut writer);
    write_meta(
        &mut writer,
        collection.bbox.as_ref(),
        collection.name.as_deref(),
        &collection.extensions,
    )?;
    if header.attributes == AttributeMode::Attached {
        keys.write(&mut writer);
    }
    points.write_anchor(&mut writer);
    writer.write_varint(collection.features.len() as u64);
    writer.write_bytes(body.as_bytes());
    Ok(writer.into_bytes())
}

pub(crate) fn decode_feature_stream(
    data: &[u8],
) -> Result<(FeatureCollection, MessageHeader), DecodeError> {
    let mut reader = Reader::new(data);
    let header = MessageHeader::read(&mut reader)?;
    let meta = read_meta(&mut reader, &FEATURE_COLLECTION_RESERVED_KEYS)?;
    let keys = read_keys(&mut reader, header.attributes)?;
    let mut points = read_point_codec(&mut reader, &header)?;

    let count = reader.read_count(MAX_ELEMENTS, MIN_GEOMETRY_BYTES, "features")?;
    let mut features = Vec::with_capacity(count);
    for _ in 0..count {
        points.begin_element();
        features.push(read_feature(&mut reader, header.attributes, &mut points, &keys)?);
    }
    reader.finish("feature collection")?;

    Ok((
        FeatureCollection {
            features,
            bbox: meta.bbox,
            name: meta.name,
            extensions: meta.extensions,
        },
        header,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::cursor::CursorChaining;
    use crate::codec::quantize::{CoordEncoding, CoordFrame};
    use crate::model::{AttrValue, FeatureCollectionBuilder, GeometryCollectionBuilder};

    fn header(scale: i64) -> MessageHeader {
        MessageHeader {
            frame: CoordFrame::new(4326, scale).unwrap(),
            coords: CoordEncoding::QuantizedDelta,
            attributes: AttributeMode::Attached,
            chaining: CursorChaining::Collection,
        }
    }

    fn c(x: f64, y: f64) -> Coord {
        Coord::new(x, y)
    }

    /// Reads the anchor and the deltas of a single-geometry message.
    fn anchor_and_deltas(bytes: &[u8]) -> ((i64, i64), Vec<(i64, i64)>) {
        let mut reader = Reader::new(bytes);
        MessageHeader::read(&mut reader).unwrap();
        let anchor = (
            reader.read_signed_varint("x").unwrap(),
            reader.read_signed_varint("y").unwrap(),
        );
        reader.read_byte("kind").unwrap();
        reader.read_varint("point_count").unwrap();
        for _ in 0..2 {
            let n = reader.read_varint("sizes").unwrap();
            for _ in 0..n {
                reader.read_varint("size").unwrap();
            }
        }
        let n = reader.read_varint("points").unwrap();
        let deltas = (0..n)
            .map(|_| {
                (
                    reader.read_signed_varint("dx").unwrap(),
                    reader.read_signed_varint("dy").unwrap(),
                )
            })
            .collect();
        (anchor, deltas)
    }

    #[test]
    fn test_polygon_scenario() {
        let ring = vec![c(0.0, 0.0), c(10.0, 0.0), c(10.0, 10.0), c(0.0, 10.0), c(0.0, 0.0)];
        let polygon = Geometry::Polygon(vec![ring]);

        let bytes = encode_geometry_message(&polygon, &header(1000)).unwrap();
        let (anchor, deltas) = anchor_and_deltas(&bytes);
        assert_eq!(anchor, (0, 0));
        assert_eq!(deltas, vec![(0, 0), (10_000, 0), (0, 10_000), (-10_000, 0)]);

        let (decoded, decoded_header) = decode_geometry_message(&bytes).unwrap();
        assert_eq!(decoded, polygon);
        assert_eq!(decoded_header, header(1000));
    }

    #[test]
    fn test_feature_collection_scenario() {
        let fc = FeatureCollectionBuilder::new()
            .geometry(Geometry::Point(c(4.9, 52.37)))
            .geometry(Geometry::Point(c(5.0, 52.40)))
            .build();
        let bytes = encode_feature_stream(&fc, &header(10_000_000)).unwrap();

        let mut reader = Reader::new(&bytes);
        MessageHeader::read(&mut reader).unwrap();
        assert_eq!(reader.read_byte("meta").unwrap(), 0);
        assert_eq!(reader.read_varint("keys").unwrap(), 0);
        assert_eq!(reader.read_signed_varint("x").unwrap(), 49_000_000);
        assert_eq!(reader.read_signed_varint("y").unwrap(), 523_700_000);
        assert_eq!(reader.read_varint("count").unwrap(), 2);

        let mut deltas = Vec::new();
        for _ in 0..2 {
            assert_eq!(reader.read_byte("feature flags").unwrap(), 0);
            // kind, point_count, part sizes, ring counts, points count
            for _ in 0..5 {
                reader.read_byte("geometry").unwrap();
            }
            deltas.push((
                reader.read_signed_varint("dx").unwrap(),
                reader.read_signed_varint("dy").unwrap(),
            ));
        }
        assert!(reader.is_empty());
        assert_eq!(deltas, vec![(0, 0), (1_000_000, 300_000)]);

        let (decoded, _) = decode_feature_stream(&bytes).unwrap();
        assert_eq!(decoded, fc);
    }

    #[test]
    fn test_cursor_spans_geometries() {
        let a = Geometry::LineString(vec![c(0.0, 0.0), c(1.0, 1.0)]);
        let other = Geometry::LineString(vec![c(0.0, 0.0), c(2.0, 2.0)]);
        let b = Geometry::LineString(vec![c(5.0, 5.0), c(6.0, 6.0)]);

        let first = GeometryCollectionBuilder::new().geometry(a).geometry(b.clone()).build();
        let second = GeometryCollectionBuilder::new().geometry(other).geometry(b.clone()).build();
        let first_bytes = encode_geometry_stream(&first, &header(10)).unwrap();
        let second_bytes = encode_geometry_stream(&second, &header(10)).unwrap();
        assert_eq!(first_bytes.len(), second_bytes.len());

        // The last geometry body: six structure bytes and four one-byte deltas.
        let tail = 10;
        let first_tail = &first_bytes[first_bytes.len() - tail..];
        let second_tail = &second_bytes[second_bytes.len() - tail..];
        assert_eq!(first_tail[..6], second_tail[..6]);
        assert_ne!(first_tail[6..], second_tail[6..]);

        assert_eq!(decode_geometry_stream(&first_bytes).unwrap().0.geometries[1], b);
        assert_eq!(decode_geometry_stream(&second_bytes).unwrap().0.geometries[1], b);
    }

    #[test]
    fn test_reordered_elements_decode_wrong() {
        let h = header(10);
        let p1 = Geometry::Point(c(1.0, 1.0));
        let p2 = Geometry::Point(c(3.0, -2.0));
        let p3 = Geometry::Point(c(0.0, 4.0));

        let mut points = point_codec(&h, p1.first_coord()).unwrap();
        let bodies: Vec<Writer> = [&p1, &p2, &p3]
            .into_iter()
            .map(|g| {
                let mut body = Writer::new();
                points.begin_element();
                write_geometry(&mut body, g, &mut points).unwrap();
                body
            })
            .collect();

        let assemble = |order: [usize; 3]| {
            let mut writer = Writer::new();
            h.write(&mut writer);
            write_meta(&mut writer, None, None, &AttrMap::new()).unwrap();
            points.write_anchor(&mut writer);
            writer.write_varint(3);
            for i in order {
                writer.write_bytes(bodies[i].as_bytes());
            }
            writer.into_bytes()
        };

        let in_order = assemble([0, 1, 2]);
        let gc = GeometryCollectionBuilder::new()
            .geometry(p1.clone())
            .geometry(p2.clone())
            .geometry(p3.clone())
            .build();
        assert_eq!(in_order, encode_geometry_stream(&gc, &h).unwrap());
        assert_eq!(decode_geometry_stream(&in_order).unwrap().0, gc);

        // Swapping the last two bodies moves the middle point to p1 + (p3 - p2).
        let swapped = decode_geometry_stream(&assemble([0, 2, 1])).unwrap().0;
        assert_eq!(
            swapped.geometries,
            vec![p1, Geometry::Point(c(-2.0, 7.0)), p3]
        );
    }

    #[test]
    fn test_per_element_chaining_decodes() {
        let mut h = header(100);
        h.chaining = CursorChaining::PerElement;
        let gc = GeometryCollectionBuilder::new()
            .geometry(Geometry::Point(c(1.0, 1.0)))
            .geometry(Geometry::Point(c(3.0, -2.0)))
            .geometry(Geometry::MultiPoint(vec![]))
            .build();
        let bytes = encode_geometry_stream(&gc, &h).unwrap();
        let (decoded, decoded_header) = decode_geometry_stream(&bytes).unwrap();
        assert_eq!(decoded, gc);
        assert_eq!(decoded_header.chaining, CursorChaining::PerElement);
    }

    #[test]
    fn test_collection_metadata_roundtrip() {
        let fc = FeatureCollectionBuilder::new()
            .name("buildings")
            .bbox(BoundingBox::ThreeD([0.0, 0.0, -1.0, 1.0, 1.0, 5.0]))
            .extension("license", "CC-BY")
            .feature(Geometry::Point(c(0.5, 0.5)), |f| {
                f.id("b1").property("floors", AttrValue::Int(2))
            })
            .build();
        let bytes = encode_feature_stream(&fc, &header(1000)).unwrap();
        assert_eq!(decode_feature_stream(&bytes).unwrap().0, fc);
    }

    #[test]
    fn test_float_mode_has_no_anchor() {
        let mut h = header(1000);
        h.coords = CoordEncoding::Float;
        let point = Geometry::Point(c(0.1234567891, -0.5));
        let bytes = encode_geometry_message(&point, &h).unwrap();
        // header, five one-byte counts, two f64
        assert_eq!(bytes.len(), 6 + 5 + 16);
        assert_eq!(decode_geometry_message(&bytes).unwrap().0, point);
    }

    #[test]
    fn test_trailing_bytes_in_message() {
        let mut bytes = encode_geometry_message(&Geometry::Point(c(1.0, 1.0)), &header(10)).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode_geometry_message(&bytes),
            Err(DecodeError::TrailingBytes { remaining: 1, .. })
        ));
    }

    #[test]
    fn test_empty_collection() {
        let gc = GeometryCollection::default();
        let bytes = encode_geometry_stream(&gc, &header(10)).unwrap();
        let (decoded, _) = decode_geometry_stream(&bytes).unwrap();
        assert_eq!(decoded, gc);
    }
}
