//! Server error types.

use crate::backend::QueryError;
use cqld_protocol::{CodecError, ErrorCode};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

impl ServerError {
    /// Converts to the wire error code used in ERROR responses.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Io(_) => ErrorCode::ServerError,
            ServerError::Codec(_) => ErrorCode::ProtocolError,
            ServerError::Query(e) => e.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = ServerError::Codec(CodecError::UnsupportedCompression);
        assert_eq!(err.error_code(), ErrorCode::ProtocolError);

        let err = ServerError::Query(QueryError::Syntax("near SELEC".into()));
        assert_eq!(err.error_code(), ErrorCode::SyntaxError);

        let err = ServerError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.error_code(), ErrorCode::ServerError);
    }
}
