//! Response accumulation and framing.
//!
//! A [`Response`] collects a body through the wire primitives, then
//! [`Response::into_bytes`] frames it for the connection's negotiated
//! version. The output is one contiguous buffer so the transport can write
//! it in a single call.

use crate::error::{CodecError, ErrorCode};
use crate::frame::FrameHeader;
use crate::opcode::Opcode;
use crate::wire::{self, Consistency};
use bytes::{Bytes, BytesMut};

/// An in-flight reply body, owned by the handler that builds it.
#[derive(Debug, Clone)]
pub struct Response {
    stream: i16,
    opcode: Opcode,
    body: BytesMut,
}

impl Response {
    /// Starts an empty response echoing the request's stream id.
    pub fn new(stream: i16, opcode: Opcode) -> Self {
        Self {
            stream,
            opcode,
            body: BytesMut::new(),
        }
    }

    /// Builds a READY response (no body).
    pub fn ready(stream: i16) -> Self {
        Self::new(stream, Opcode::Ready)
    }

    /// Builds an ERROR response: 4-byte code, then a short string message.
    ///
    /// Messages longer than a short string can carry are truncated rather
    /// than failing, so the error path itself cannot fail to encode.
    pub fn error(stream: i16, code: ErrorCode, message: &str) -> Self {
        let mut response = Self::new(stream, Opcode::Error);
        let mut message = message;
        if message.len() > i16::MAX as usize {
            let mut end = i16::MAX as usize;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message = &message[..end];
        }
        response.write_u32(code.to_wire());
        wire::write_string(&mut response.body, message).expect("truncated message fits");
        response
    }

    pub fn stream(&self) -> i16 {
        self.stream
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn write_u8(&mut self, v: u8) {
        wire::write_u8(&mut self.body, v);
    }

    pub fn write_u16(&mut self, v: u16) {
        wire::write_u16(&mut self.body, v);
    }

    pub fn write_i16(&mut self, v: i16) {
        wire::write_i16(&mut self.body, v);
    }

    pub fn write_u32(&mut self, v: u32) {
        wire::write_u32(&mut self.body, v);
    }

    pub fn write_i32(&mut self, v: i32) {
        wire::write_i32(&mut self.body, v);
    }

    pub fn write_u64(&mut self, v: u64) {
        wire::write_u64(&mut self.body, v);
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), CodecError> {
        wire::write_string(&mut self.body, s)
    }

    pub fn write_long_string(&mut self, s: &str) -> Result<(), CodecError> {
        wire::write_long_string(&mut self.body, s)
    }

    pub fn write_string_list(&mut self, list: &[&str]) -> Result<(), CodecError> {
        wire::write_string_list(&mut self.body, list)
    }

    pub fn write_bytes(&mut self, b: &[u8]) -> Result<(), CodecError> {
        wire::write_bytes(&mut self.body, b)
    }

    pub fn write_short_bytes(&mut self, b: &[u8]) -> Result<(), CodecError> {
        wire::write_short_bytes(&mut self.body, b)
    }

    pub fn write_string_map(&mut self, map: &[(&str, &str)]) -> Result<(), CodecError> {
        wire::write_string_map(&mut self.body, map)
    }

    pub fn write_string_multimap(&mut self, pairs: &[(&str, &str)]) -> Result<(), CodecError> {
        wire::write_string_multimap(&mut self.body, pairs)
    }

    pub fn write_consistency(&mut self, c: Consistency) {
        wire::write_consistency(&mut self.body, c);
    }

    /// Appends pre-encoded body bytes, e.g. a RESULT payload produced by the
    /// query engine.
    pub fn append(&mut self, raw: &[u8]) {
        self.body.extend_from_slice(raw);
    }

    /// Frames the response for the negotiated version: header bytes in the
    /// matching layout, direction bit set, length equal to the body size,
    /// followed by the body. Never pads or truncates.
    pub fn into_bytes(self, version: u8) -> Bytes {
        let header = FrameHeader {
            version,
            flags: 0,
            stream: self.stream,
            opcode: self.opcode,
            length: self.body.len() as u32,
        };
        let mut buf = BytesMut::with_capacity(crate::frame::header_size(version) + self.body.len());
        header.encode(&mut buf);
        buf.extend_from_slice(&self.body);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{header_size, DIRECTION_RESPONSE};
    use crate::wire::Cursor;

    #[test]
    fn test_ready_frame_v3() {
        let bytes = Response::ready(5).into_bytes(3);
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 0x83);
        assert_eq!(&bytes[2..4], &[0x00, 0x05]);
        assert_eq!(bytes[4], Opcode::Ready.to_wire());
        assert_eq!(&bytes[5..9], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_ready_frame_v1_layout() {
        let bytes = Response::ready(5).into_bytes(1);
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[2], 0x05);
        assert_eq!(bytes[3], Opcode::Ready.to_wire());
    }

    #[test]
    fn test_length_counts_body_only() {
        let mut response = Response::new(1, Opcode::Supported);
        response
            .write_string_multimap(&[("CQL_VERSION", "3.0.0")])
            .unwrap();
        let body_len = response.body_len();
        let bytes = response.into_bytes(4);
        assert_eq!(bytes.len(), header_size(4) + body_len);
        let wire_len = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        assert_eq!(wire_len as usize, body_len);
    }

    #[test]
    fn test_error_body_shape() {
        let bytes = Response::error(9, ErrorCode::ProtocolError, "bad frame").into_bytes(3);
        assert_eq!(bytes[0], 3 | DIRECTION_RESPONSE);
        let mut cur = Cursor::new(&bytes[9..]);
        assert_eq!(cur.read_u32().unwrap(), 0x000A);
        assert_eq!(cur.read_string().unwrap(), "bad frame");
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_error_message_truncated_not_failed() {
        let long = "e".repeat(i16::MAX as usize + 100);
        let response = Response::error(0, ErrorCode::ServerError, &long);
        assert!(response.body_len() <= 4 + 2 + i16::MAX as usize);
    }

    #[test]
    fn test_append_raw_payload() {
        let mut response = Response::new(2, Opcode::Result);
        response.append(&[0x00, 0x00, 0x00, 0x01]);
        let bytes = response.into_bytes(3);
        assert_eq!(&bytes[9..], &[0x00, 0x00, 0x00, 0x01]);
    }
}
