//! Message header shared by every geometry, feature and collection message.
//!
//! ```text
//! Header := Version(u8) Flags(u8) Srid(varint) Scale(varint)
//! ```

use crate::codec::cursor::CursorChaining;
use crate::codec::primitives::{Reader, Writer};
use crate::codec::quantize::{CoordEncoding, CoordFrame, Scale};
use crate::error::DecodeError;
use crate::limits::FORMAT_VERSION;

/// Coordinates are plain `f64` pairs.
pub const FLAG_FLOAT_COORDS: u8 = 0x01;
/// The cursor returns to the anchor before each element.
pub const FLAG_RESET_CURSOR: u8 = 0x02;
/// Features carry geometry only.
pub const FLAG_BARE: u8 = 0x04;

const FLAGS_KNOWN: u8 = FLAG_FLOAT_COORDS | FLAG_RESET_CURSOR | FLAG_BARE;

/// Whether features carry their attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeMode {
    /// Properties, id, bbox and extensions are written with each feature.
    #[default]
    Attached,
    /// Only the geometry of each feature is written.
    Bare,
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub frame: CoordFrame,
    pub coords: CoordEncoding,
    pub attributes: AttributeMode,
    pub chaining: CursorChaining,
}

impl MessageHeader {
    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.coords == CoordEncoding::Float {
            flags |= FLAG_FLOAT_COORDS;
        }
        if self.chaining == CursorChaining::PerElement {
            flags |= FLAG_RESET_CURSOR;
        }
        if self.attributes == AttributeMode::Bare {
            flags |= FLAG_BARE;
        }
        flags
    }

    /// Writes the header.
    pub fn write(&self, writer: &mut Writer) {
        writer.write_byte(FORMAT_VERSION);
        writer.write_byte(self.flags());
        writer.write_varint(self.frame.srid as u64);
        writer.write_varint(self.frame.scale.get() as u64);
    }

    /// Reads a header, rejecting unknown versions and flags.
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let version = reader.read_byte("version")?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        let flags = reader.read_byte("message flags")?;
        if flags & !FLAGS_KNOWN != 0 {
            return Err(DecodeError::ReservedBitsSet {
                context: "message flags",
            });
        }

        let srid = reader.read_varint("srid")?;
        let srid = u32::try_from(srid).map_err(|_| DecodeError::InvalidSrid { srid })?;
        let scale = Scale::from_wire(reader.read_varint("scale")?)?;

        Ok(Self {
            frame: CoordFrame { srid, scale },
            coords: if flags & FLAG_FLOAT_COORDS != 0 {
                CoordEncoding::Float
            } else {
                CoordEncoding::QuantizedDelta
            },
            attributes: if flags & FLAG_BARE != 0 {
                AttributeMode::Bare
            } else {
                AttributeMode::Attached
            },
            chaining: if flags & FLAG_RESET_CURSOR != 0 {
                CursorChaining::PerElement
            } else {
                CursorChaining::Collection
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> MessageHeader {
        MessageHeader {
            frame: CoordFrame::new(28992, 1000).unwrap(),
            coords: CoordEncoding::QuantizedDelta,
            attributes: AttributeMode::Bare,
            chaining: CursorChaining::PerElement,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let mut writer = Writer::new();
        header().write(&mut writer);
        assert_eq!(writer.as_bytes()[1], FLAG_RESET_CURSOR | FLAG_BARE);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(MessageHeader::read(&mut reader).unwrap(), header());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_unsupported_version() {
        let data = [2u8, 0, 0, 1];
        assert!(matches!(
            MessageHeader::read(&mut Reader::new(&data)),
            Err(DecodeError::UnsupportedVersion { version: 2 })
        ));
    }

    #[test]
    fn test_reserved_flag_bits() {
        let data = [FORMAT_VERSION, 0x80, 0, 1];
        assert!(matches!(
            MessageHeader::read(&mut Reader::new(&data)),
            Err(DecodeError::ReservedBitsSet { .. })
        ));
    }

    #[test]
    fn test_zero_scale() {
        let data = [FORMAT_VERSION, 0, 0, 0];
        assert!(matches!(
            MessageHeader::read(&mut Reader::new(&data)),
            Err(DecodeError::InvalidScale { scale: 0 })
        ));
    }
}
