//! Frame opcodes.

use crate::error::CodecError;

/// Message kinds carried in the frame header.
///
/// Wire values 0 through 16; the set is closed. Some opcodes only ever
/// travel in one direction, which [`Opcode::is_request`] captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Error = 0x00,
    Startup = 0x01,
    Ready = 0x02,
    Authenticate = 0x03,
    Credentials = 0x04,
    Options = 0x05,
    Supported = 0x06,
    Query = 0x07,
    Result = 0x08,
    Prepare = 0x09,
    Execute = 0x0A,
    Register = 0x0B,
    Event = 0x0C,
    Batch = 0x0D,
    AuthChallenge = 0x0E,
    AuthResponse = 0x0F,
    AuthSuccess = 0x10,
}

impl Opcode {
    /// Decodes an opcode byte.
    pub fn from_wire(value: u8) -> Result<Self, CodecError> {
        match value {
            0x00 => Ok(Opcode::Error),
            0x01 => Ok(Opcode::Startup),
            0x02 => Ok(Opcode::Ready),
            0x03 => Ok(Opcode::Authenticate),
            0x04 => Ok(Opcode::Credentials),
            0x05 => Ok(Opcode::Options),
            0x06 => Ok(Opcode::Supported),
            0x07 => Ok(Opcode::Query),
            0x08 => Ok(Opcode::Result),
            0x09 => Ok(Opcode::Prepare),
            0x0A => Ok(Opcode::Execute),
            0x0B => Ok(Opcode::Register),
            0x0C => Ok(Opcode::Event),
            0x0D => Ok(Opcode::Batch),
            0x0E => Ok(Opcode::AuthChallenge),
            0x0F => Ok(Opcode::AuthResponse),
            0x10 => Ok(Opcode::AuthSuccess),
            other => Err(CodecError::UnknownOpcode(other)),
        }
    }

    /// Returns the wire byte.
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Returns whether this opcode is valid in the client-to-server
    /// direction. Anything else arriving as a request is a protocol error.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Opcode::Startup
                | Opcode::AuthResponse
                | Opcode::Options
                | Opcode::Query
                | Opcode::Prepare
                | Opcode::Execute
                | Opcode::Batch
                | Opcode::Register
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_wire_values() {
        assert_eq!(Opcode::Error.to_wire(), 0x00);
        assert_eq!(Opcode::Startup.to_wire(), 0x01);
        assert_eq!(Opcode::Ready.to_wire(), 0x02);
        assert_eq!(Opcode::Options.to_wire(), 0x05);
        assert_eq!(Opcode::Supported.to_wire(), 0x06);
        assert_eq!(Opcode::Query.to_wire(), 0x07);
        assert_eq!(Opcode::Result.to_wire(), 0x08);
        assert_eq!(Opcode::Batch.to_wire(), 0x0D);
        assert_eq!(Opcode::AuthSuccess.to_wire(), 0x10);
    }

    #[test]
    fn test_opcode_roundtrip() {
        for value in 0x00..=0x10u8 {
            let opcode = Opcode::from_wire(value).unwrap();
            assert_eq!(opcode.to_wire(), value);
        }
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(
            Opcode::from_wire(0x11),
            Err(CodecError::UnknownOpcode(0x11))
        ));
        assert!(matches!(
            Opcode::from_wire(0xFF),
            Err(CodecError::UnknownOpcode(0xFF))
        ));
    }

    #[test]
    fn test_request_direction() {
        assert!(Opcode::Startup.is_request());
        assert!(Opcode::Options.is_request());
        assert!(Opcode::Query.is_request());
        assert!(Opcode::Prepare.is_request());
        assert!(Opcode::Execute.is_request());
        assert!(Opcode::Batch.is_request());
        assert!(Opcode::Register.is_request());
        assert!(Opcode::AuthResponse.is_request());

        assert!(!Opcode::Error.is_request());
        assert!(!Opcode::Ready.is_request());
        assert!(!Opcode::Supported.is_request());
        assert!(!Opcode::Result.is_request());
        assert!(!Opcode::Event.is_request());
        assert!(!Opcode::AuthChallenge.is_request());
    }
}
