//! Codec error types and wire error codes.

use std::fmt;
use thiserror::Error;

/// Errors produced while encoding or decoding protocol bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("truncated input: need {needed} bytes, {remaining} available")]
    TruncatedInput { needed: usize, remaining: usize },

    #[error("malformed length: {0}")]
    MalformedLength(i64),

    #[error("field of {len} bytes too large for {width}-bit length prefix")]
    FieldTooLarge { len: usize, width: u8 },

    #[error("frame header size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    #[error("frame version {actual} does not match connection version {pinned}")]
    VersionMismatch { pinned: u8, actual: u8 },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("compressed frames are not supported")]
    UnsupportedCompression,

    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("unknown consistency level: {0:#06x}")]
    UnknownConsistency(u16),

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
}

/// Error codes carried in ERROR response bodies.
///
/// The values are part of the wire contract and must remain stable. An ERROR
/// body is the 4-byte big-endian code followed by a short string message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    ServerError = 0x0000,
    ProtocolError = 0x000A,
    BadCredentials = 0x0100,
    Unavailable = 0x1000,
    Overloaded = 0x1001,
    IsBootstrapping = 0x1002,
    TruncateError = 0x1003,
    WriteTimeout = 0x1100,
    ReadTimeout = 0x1200,
    SyntaxError = 0x2000,
    Unauthorized = 0x2100,
    Invalid = 0x2200,
    ConfigError = 0x2300,
    AlreadyExists = 0x2400,
    Unprepared = 0x2500,
}

impl ErrorCode {
    /// Returns the 4-byte wire value.
    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ServerError => write!(f, "SERVER_ERROR"),
            ErrorCode::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            ErrorCode::BadCredentials => write!(f, "BAD_CREDENTIALS"),
            ErrorCode::Unavailable => write!(f, "UNAVAILABLE"),
            ErrorCode::Overloaded => write!(f, "OVERLOADED"),
            ErrorCode::IsBootstrapping => write!(f, "IS_BOOTSTRAPPING"),
            ErrorCode::TruncateError => write!(f, "TRUNCATE_ERROR"),
            ErrorCode::WriteTimeout => write!(f, "WRITE_TIMEOUT"),
            ErrorCode::ReadTimeout => write!(f, "READ_TIMEOUT"),
            ErrorCode::SyntaxError => write!(f, "SYNTAX_ERROR"),
            ErrorCode::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorCode::Invalid => write!(f, "INVALID"),
            ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
            ErrorCode::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            ErrorCode::Unprepared => write!(f, "UNPREPARED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_values() {
        assert_eq!(ErrorCode::ServerError.to_wire(), 0x0000);
        assert_eq!(ErrorCode::ProtocolError.to_wire(), 0x000A);
        assert_eq!(ErrorCode::BadCredentials.to_wire(), 0x0100);
        assert_eq!(ErrorCode::Unavailable.to_wire(), 0x1000);
        assert_eq!(ErrorCode::Overloaded.to_wire(), 0x1001);
        assert_eq!(ErrorCode::IsBootstrapping.to_wire(), 0x1002);
        assert_eq!(ErrorCode::TruncateError.to_wire(), 0x1003);
        assert_eq!(ErrorCode::WriteTimeout.to_wire(), 0x1100);
        assert_eq!(ErrorCode::ReadTimeout.to_wire(), 0x1200);
        assert_eq!(ErrorCode::SyntaxError.to_wire(), 0x2000);
        assert_eq!(ErrorCode::Unauthorized.to_wire(), 0x2100);
        assert_eq!(ErrorCode::Invalid.to_wire(), 0x2200);
        assert_eq!(ErrorCode::ConfigError.to_wire(), 0x2300);
        assert_eq!(ErrorCode::AlreadyExists.to_wire(), 0x2400);
        assert_eq!(ErrorCode::Unprepared.to_wire(), 0x2500);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::ProtocolError), "PROTOCOL_ERROR");
        assert_eq!(format!("{}", ErrorCode::AlreadyExists), "ALREADY_EXISTS");
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::TruncatedInput {
            needed: 4,
            remaining: 2,
        };
        assert!(err.to_string().contains("need 4 bytes"));

        let err = CodecError::VersionMismatch {
            pinned: 3,
            actual: 4,
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('4'));

        let err = CodecError::UnknownOpcode(0x42);
        assert!(err.to_string().contains("0x42"));
    }
}
