//! Query-execution seam.
//!
//! The protocol front end knows nothing about query-language semantics. It
//! hands decoded request bodies to a [`QueryBackend`] and frames whatever
//! payload comes back. Event registration is delegated the same way through
//! [`EventSink`].

use async_trait::async_trait;
use bytes::Bytes;
use cqld_protocol::{Consistency, ErrorCode};
use thiserror::Error;

/// RESULT body for a query with nothing to return (kind = Void).
const VOID_RESULT: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Errors a backend can surface; each maps to a wire error code.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("invalid query: {0}")]
    Invalid(String),

    #[error("unprepared statement: {0}")]
    Unprepared(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Maps to the wire error code carried in an ERROR response.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            QueryError::Syntax(_) => ErrorCode::SyntaxError,
            QueryError::Invalid(_) => ErrorCode::Invalid,
            QueryError::Unprepared(_) => ErrorCode::Unprepared,
            QueryError::Unavailable(_) => ErrorCode::Unavailable,
            QueryError::Overloaded(_) => ErrorCode::Overloaded,
            QueryError::Internal(_) => ErrorCode::ServerError,
        }
    }
}

/// Per-request options decoded from the wire.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub consistency: Consistency,
}

/// A pre-encoded RESULT frame body. The backend owns the payload shape; the
/// front end copies it into the frame verbatim.
#[derive(Debug, Clone)]
pub struct ResultPayload(Bytes);

impl ResultPayload {
    pub fn new(body: Bytes) -> Self {
        Self(body)
    }

    /// The Void result, used for queries that return no rows.
    pub fn void() -> Self {
        Self(Bytes::from_static(&VOID_RESULT))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// One statement inside a BATCH request, with its bound values.
#[derive(Debug, Clone)]
pub enum BatchStatement {
    /// Inline query text.
    Query {
        text: String,
        values: Vec<Option<Vec<u8>>>,
    },
    /// Prepared statement id.
    Prepared {
        id: Vec<u8>,
        values: Vec<Option<Vec<u8>>>,
    },
}

/// Batch kind byte from the BATCH body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Logged,
    Unlogged,
    Counter,
}

impl BatchKind {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(BatchKind::Logged),
            1 => Some(BatchKind::Unlogged),
            2 => Some(BatchKind::Counter),
            _ => None,
        }
    }
}

/// A decoded BATCH request.
#[derive(Debug, Clone)]
pub struct Batch {
    pub kind: BatchKind,
    pub statements: Vec<BatchStatement>,
    pub consistency: Consistency,
}

/// The narrow capability interface the dispatcher calls into.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Executes query text and returns an encoded RESULT body.
    async fn execute(&self, query: &str, opts: QueryOptions) -> Result<ResultPayload, QueryError>;

    /// Prepares query text; the returned payload carries the statement id.
    async fn prepare(&self, query: &str) -> Result<ResultPayload, QueryError>;

    /// Executes a previously prepared statement.
    async fn execute_prepared(
        &self,
        id: &[u8],
        values: Vec<Option<Vec<u8>>>,
        opts: QueryOptions,
    ) -> Result<ResultPayload, QueryError>;

    /// Runs a batch of statements.
    async fn run_batch(&self, batch: Batch) -> Result<ResultPayload, QueryError>;
}

/// Receives event-kind registrations from REGISTER requests.
pub trait EventSink: Send + Sync {
    fn register(&self, event_kinds: &[String]);
}

/// Backend that accepts every query and answers with a Void result.
///
/// Stands in until a real execution engine is wired up. Prepared-statement
/// traffic is rejected rather than faked, so clients fall back to plain
/// queries.
#[derive(Debug, Default)]
pub struct NullBackend;

#[async_trait]
impl QueryBackend for NullBackend {
    async fn execute(&self, query: &str, _opts: QueryOptions) -> Result<ResultPayload, QueryError> {
        tracing::debug!(query, "null backend accepted query");
        Ok(ResultPayload::void())
    }

    async fn prepare(&self, _query: &str) -> Result<ResultPayload, QueryError> {
        Err(QueryError::Invalid(
            "prepared statements are not supported by this backend".to_string(),
        ))
    }

    async fn execute_prepared(
        &self,
        id: &[u8],
        _values: Vec<Option<Vec<u8>>>,
        _opts: QueryOptions,
    ) -> Result<ResultPayload, QueryError> {
        Err(QueryError::Unprepared(hex_id(id)))
    }

    async fn run_batch(&self, batch: Batch) -> Result<ResultPayload, QueryError> {
        tracing::debug!(statements = batch.statements.len(), "null backend accepted batch");
        Ok(ResultPayload::void())
    }
}

/// Sink that logs registrations and otherwise drops them.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn register(&self, event_kinds: &[String]) {
        tracing::warn!(?event_kinds, "ignoring event registration");
    }
}

fn hex_id(id: &[u8]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_backend_query_is_void() {
        let backend = NullBackend;
        let payload = backend
            .execute("SELECT * FROM system.local", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(payload.as_bytes(), &[0x00, 0x00, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_null_backend_rejects_prepared() {
        let backend = NullBackend;
        let err = backend
            .execute_prepared(&[0xAB, 0xCD], Vec::new(), QueryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Unprepared);
        assert!(err.to_string().contains("abcd"));
    }

    #[test]
    fn test_batch_kind_from_wire() {
        assert_eq!(BatchKind::from_wire(0), Some(BatchKind::Logged));
        assert_eq!(BatchKind::from_wire(1), Some(BatchKind::Unlogged));
        assert_eq!(BatchKind::from_wire(2), Some(BatchKind::Counter));
        assert_eq!(BatchKind::from_wire(3), None);
    }

    #[test]
    fn test_query_error_codes() {
        assert_eq!(
            QueryError::Syntax("x".into()).error_code(),
            ErrorCode::SyntaxError
        );
        assert_eq!(
            QueryError::Unavailable("x".into()).error_code(),
            ErrorCode::Unavailable
        );
        assert_eq!(
            QueryError::Internal("x".into()).error_code(),
            ErrorCode::ServerError
        );
    }
}
