//! Frame header codec.
//!
//! Two physical header layouts exist on the wire, selected by the protocol
//! version:
//!
//! ```text
//! v1/v2 (8 bytes):  version(1) flags(1) stream(1, signed) opcode(1) length(4)
//! v3/v4 (9 bytes):  version(1) flags(1) stream(2, signed) opcode(1) length(4)
//! ```
//!
//! Both decode into one normalized [`FrameHeader`], so everything past the
//! codec is version-agnostic. The version byte's high bit marks direction
//! (set on responses, clear on requests) and is not part of the version.

use crate::error::CodecError;
use crate::opcode::Opcode;
use bytes::{BufMut, BytesMut};

/// Lowest protocol version this server speaks.
pub const MIN_VERSION: u8 = 1;

/// Highest protocol version this server speaks.
pub const MAX_VERSION: u8 = 4;

/// Direction marker in the version byte: set on server-to-client frames.
pub const DIRECTION_RESPONSE: u8 = 0x80;

/// Frame flag bit 0: body is compressed. Never accepted by this server.
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Returns the on-wire header size for a protocol version.
pub fn header_size(version: u8) -> usize {
    if version < 3 {
        8
    } else {
        9
    }
}

/// Validates the first byte of a connection and returns the pinned version.
pub fn pin_version(first_byte: u8) -> Result<u8, CodecError> {
    let version = first_byte & !DIRECTION_RESPONSE;
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(CodecError::UnsupportedVersion(version));
    }
    Ok(version)
}

/// Normalized, version-independent frame header.
///
/// `length` counts body bytes only, never the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: u8,
    pub stream: i16,
    pub opcode: Opcode,
    pub length: u32,
}

impl FrameHeader {
    /// Parses raw header bytes against the connection's pinned version.
    ///
    /// `raw` must be exactly [`header_size`]`(pinned)` bytes. The embedded
    /// version (direction bit cleared) must equal the pinned version; a
    /// connection is never silently re-pinned. The narrow v1/v2 stream byte
    /// is sign-extended to 16 bits.
    pub fn parse(raw: &[u8], pinned: u8) -> Result<Self, CodecError> {
        let expected = header_size(pinned);
        if raw.len() != expected {
            return Err(CodecError::FrameSizeMismatch {
                expected,
                actual: raw.len(),
            });
        }

        let version = raw[0] & !DIRECTION_RESPONSE;
        if version != pinned {
            return Err(CodecError::VersionMismatch {
                pinned,
                actual: version,
            });
        }

        let flags = raw[1];
        if flags & FLAG_COMPRESSED != 0 {
            return Err(CodecError::UnsupportedCompression);
        }

        let (stream, opcode_byte, length_at) = if pinned < 3 {
            (raw[2] as i8 as i16, raw[3], 4)
        } else {
            (i16::from_be_bytes([raw[2], raw[3]]), raw[4], 5)
        };

        let opcode = Opcode::from_wire(opcode_byte)?;
        let length = u32::from_be_bytes([
            raw[length_at],
            raw[length_at + 1],
            raw[length_at + 2],
            raw[length_at + 3],
        ]);

        Ok(Self {
            version,
            flags,
            stream,
            opcode,
            length,
        })
    }

    /// Appends the response-direction encoding of this header, using the
    /// layout that matches `self.version`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version | DIRECTION_RESPONSE);
        buf.put_u8(self.flags);
        if self.version < 3 {
            buf.put_i8(self.stream as i8);
        } else {
            buf.put_i16(self.stream);
        }
        buf.put_u8(self.opcode.to_wire());
        buf.put_u32(self.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_per_version() {
        assert_eq!(header_size(1), 8);
        assert_eq!(header_size(2), 8);
        assert_eq!(header_size(3), 9);
        assert_eq!(header_size(4), 9);
    }

    #[test]
    fn test_pin_version() {
        for v in 1..=4u8 {
            assert_eq!(pin_version(v).unwrap(), v);
        }
        assert!(matches!(
            pin_version(0x00),
            Err(CodecError::UnsupportedVersion(0))
        ));
        assert!(matches!(
            pin_version(0x05),
            Err(CodecError::UnsupportedVersion(5))
        ));
    }

    #[test]
    fn test_parse_v1_layout() {
        // version=1 flags=0 stream=7 opcode=QUERY length=16
        let raw = [0x01, 0x00, 0x07, 0x07, 0x00, 0x00, 0x00, 0x10];
        let header = FrameHeader::parse(&raw, 1).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.stream, 7);
        assert_eq!(header.opcode, Opcode::Query);
        assert_eq!(header.length, 16);
    }

    #[test]
    fn test_parse_v3_layout() {
        // version=3 flags=0 stream=0x0102 opcode=STARTUP length=0
        let raw = [0x03, 0x00, 0x01, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00];
        let header = FrameHeader::parse(&raw, 3).unwrap();
        assert_eq!(header.version, 3);
        assert_eq!(header.stream, 0x0102);
        assert_eq!(header.opcode, Opcode::Startup);
        assert_eq!(header.length, 0);
    }

    #[test]
    fn test_parse_sign_extends_narrow_stream() {
        // v2 stream byte 0xFF is stream -1, not 255.
        let raw = [0x02, 0x00, 0xFF, 0x05, 0x00, 0x00, 0x00, 0x00];
        let header = FrameHeader::parse(&raw, 2).unwrap();
        assert_eq!(header.stream, -1);
    }

    #[test]
    fn test_parse_clears_direction_bit() {
        let raw = [0x83, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let header = FrameHeader::parse(&raw, 3).unwrap();
        assert_eq!(header.version, 3);
    }

    #[test]
    fn test_parse_size_mismatch() {
        let raw = [0x03, 0x00, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00]; // 8 bytes, v3 wants 9
        assert!(matches!(
            FrameHeader::parse(&raw, 3),
            Err(CodecError::FrameSizeMismatch {
                expected: 9,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_parse_version_mismatch() {
        // Connection pinned at 3, frame claims 4.
        let raw = [0x04, 0x00, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            FrameHeader::parse(&raw, 3),
            Err(CodecError::VersionMismatch {
                pinned: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_parse_rejects_compression_flag() {
        let raw = [0x03, 0x01, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            FrameHeader::parse(&raw, 3),
            Err(CodecError::UnsupportedCompression)
        ));
    }

    #[test]
    fn test_parse_unknown_opcode() {
        let raw = [0x03, 0x00, 0x00, 0x01, 0x7F, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            FrameHeader::parse(&raw, 3),
            Err(CodecError::UnknownOpcode(0x7F))
        ));
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        for version in 1..=4u8 {
            let header = FrameHeader {
                version,
                flags: 0,
                stream: 42,
                opcode: Opcode::Result,
                length: 1234,
            };
            let mut buf = BytesMut::new();
            header.encode(&mut buf);
            assert_eq!(buf.len(), header_size(version));
            // Encoded frames carry the response direction bit.
            assert_eq!(buf[0] & DIRECTION_RESPONSE, DIRECTION_RESPONSE);

            let parsed = FrameHeader::parse(&buf, version).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn test_encode_negative_stream_v3() {
        let header = FrameHeader {
            version: 3,
            flags: 0,
            stream: -1,
            opcode: Opcode::Event,
            length: 0,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[2..4], &[0xFF, 0xFF]);
    }
}
