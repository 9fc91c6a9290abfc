//! # cqld-protocol
//!
//! Wire codec for the CQL native protocol as served by cqld.
//!
//! This crate provides:
//! - Big-endian wire primitives over a byte cursor
//! - Frame header parsing across the v1/v2 and v3/v4 layouts
//! - Opcode and wire error-code enumerations
//! - A response builder that frames reply bodies
//!
//! It contains no I/O; the server crate owns sockets and drives these codecs.

pub mod error;
pub mod frame;
pub mod opcode;
pub mod response;
pub mod wire;

pub use error::{CodecError, ErrorCode};
pub use frame::{header_size, pin_version, FrameHeader, MAX_VERSION, MIN_VERSION};
pub use opcode::Opcode;
pub use response::Response;
pub use wire::{Consistency, Cursor};

/// Default port for cqld.
pub const DEFAULT_PORT: u16 = 9042;

/// Maximum frame body size accepted or produced (16 MiB). A header
/// declaring more than this is treated as malformed.
pub const MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;
