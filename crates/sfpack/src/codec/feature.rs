//! Feature body encoding.
//!
//! ```text
//! Feature := Flags(u8) Geometry [Properties] [Id] [BBox] [Extensions]
//! BBox    := Len(u8 = 4 | 6) f64*
//! ```
//!
//! In bare mode a feature is its geometry body alone.

use tracing::warn;

use crate::codec::attr::{decode_attr_map, encode_attr_map, KeyDecoder, KeyEncoder};
use crate::codec::cursor::PointCodec;
use crate::codec::geometry::{read_geometry, write_geometry};
use crate::codec::header::AttributeMode;
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_STRING_LEN;
use crate::model::{AttrMap, BoundingBox, Feature};

const FEATURE_HAS_PROPERTIES: u8 = 0x01;
const FEATURE_HAS_ID: u8 = 0x02;
const FEATURE_HAS_BBOX: u8 = 0x04;
const FEATURE_HAS_EXTENSIONS: u8 = 0x08;
const FEATURE_FLAGS_KNOWN: u8 =
    FEATURE_HAS_PROPERTIES | FEATURE_HAS_ID | FEATURE_HAS_BBOX | FEATURE_HAS_EXTENSIONS;

pub(crate) fn write_bbox(writer: &mut Writer, bbox: &BoundingBox) -> Result<(), EncodeError> {
    let values = bbox.as_slice();
    if values.iter().any(|v| v.is_nan()) {
        return Err(EncodeError::FloatIsNan);
    }
    writer.write_byte(values.len() as u8);
    for v in values {
        writer.write_f64(*v);
    }
    Ok(())
}

pub(crate) fn read_bbox(reader: &mut Reader<'_>) -> Result<BoundingBox, DecodeError> {
    let len = reader.read_byte("bbox length")? as usize;
    if len != 4 && len != 6 {
        return Err(DecodeError::InvalidBBoxLength { len });
    }
    let mut values = [0.0; 6];
    for v in values.iter_mut().take(len) {
        *v = reader.read_f64("bbox")?;
    }
    BoundingBox::from_slice(&values[..len]).ok_or(DecodeError::InvalidBBoxLength { len })
}

/// Removes extension members that collide with reserved names.
///
/// Such members cannot be produced by the encoder; they are dropped rather
/// than allowed to shadow the real member.
pub(crate) fn drop_reserved(mut extensions: AttrMap, reserved: &[&str]) -> AttrMap {
    extensions.retain(|key, _| {
        let clash = reserved.contains(&key.as_str());
        if clash {
            warn!(key = %key, "dropping extension member that collides with a reserved name");
        }
        !clash
    });
    extensions
}

/// Writes one feature. The geometry must be present.
pub(crate) fn write_feature<K: KeyEncoder>(
    writer: &mut Writer,
    feature: &Feature,
    index: usize,
    mode: AttributeMode,
    points: &mut PointCodec,
    keys: &mut K,
) -> Result<(), EncodeError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or(EncodeError::MissingGeometry { index })?;

    if mode == AttributeMode::Bare {
        return write_geometry(writer, geometry, points);
    }

    let properties = feature.non_empty_properties();
    let mut flags = 0u8;
    if properties.is_some() {
        flags |= FEATURE_HAS_PROPERTIES;
    }
    if feature.id.is_some() {
        flags |= FEATURE_HAS_ID;
    }
    if feature.bbox.is_some() {
        flags |= FEATURE_HAS_BBOX;
    }
    if !feature.extensions.is_empty() {
        flags |= FEATURE_HAS_EXTENSIONS;
    }
    writer.write_byte(flags);

    write_geometry(writer, geometry, points)?;
    if let Some(props) = properties {
        encode_attr_map(writer, props, keys)?;
    }
    if let Some(id) = &feature.id {
        writer.write_string(id);
    }
    if let Some(bbox) = &feature.bbox {
        write_bbox(writer, bbox)?;
    }
    if !feature.extensions.is_empty() {
        encode_attr_map(writer, &feature.extensions, keys)?;
    }
    Ok(())
}

/// Reads one feature.
pub(crate) fn read_feature<K: KeyDecoder>(
    reader: &mut Reader<'_>,
    mode: AttributeMode,
    points: &mut PointCodec,
    keys: &K,
) -> Result<Feature, DecodeError> {
    if mode == AttributeMode::Bare {
        return Ok(Feature::new(read_geometry(reader, points)?));
    }

    let flags = reader.read_byte("feature flags")?;
    if flags & !FEATURE_FLAGS_KNOWN != 0 {
        return Err(DecodeError::ReservedBitsSet {
            context: "feature flags",
        });
    }

    let geometry = read_geometry(reader, points)?;
    let properties = if flags & FEATURE_HAS_PROPERTIES != 0 {
        Some(decode_attr_map(reader, keys)?).filter(|p| !p.is_empty())
    } else {
        None
    };
    let id = if flags & FEATURE_HAS_ID != 0 {
        Some(reader.read_string(MAX_STRING_LEN, "id")?)
    } else {
        None
    };
    let bbox = if flags & FEATURE_HAS_BBOX != 0 {
        Some(read_bbox(reader)?)
    } else {
        None
    };
    let extensions = if flags & FEATURE_HAS_EXTENSIONS != 0 {
        drop_reserved(
            decode_attr_map(reader, keys)?,
            &crate::model::FEATURE_RESERVED_KEYS,
        )
    } else {
        AttrMap::new()
    };

    Ok(Feature {
        geometry: Some(geometry),
        properties,
        id,
        bbox,
        extensions,
    })
}
