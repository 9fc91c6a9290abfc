//! # cqld-server
//!
//! TCP front end for the CQL native protocol.
//!
//! This crate provides:
//! - A listener that accepts sockets and spawns one task per connection
//! - The per-connection protocol state machine with first-frame version
//!   pinning and a strict read/dispatch/write loop
//! - Opcode dispatch into a narrow query-backend trait
//! - Configuration loading

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod server;

pub use backend::{
    Batch, BatchKind, BatchStatement, EventSink, LogEventSink, NullBackend, QueryBackend,
    QueryError, QueryOptions, ResultPayload,
};
pub use config::{Config, ConfigError, NetworkConfig};
pub use connection::Connection;
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
