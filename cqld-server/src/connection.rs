//! Per-connection protocol state machine and request dispatch.
//!
//! Each accepted socket gets one [`Connection`], which owns the stream, the
//! pinned protocol version, and the read/dispatch/write loop. Connections
//! share no mutable state, so the whole layer is lock-free.
//!
//! The loop is strictly sequential: the next frame is not read until the
//! response to the current one has been fully written. Reads consume exactly
//! the bytes a frame declares, never more, so one slow peer cannot disturb
//! another connection's framing.

use crate::backend::{
    Batch, BatchKind, BatchStatement, EventSink, QueryBackend, QueryError, QueryOptions,
};
use crate::error::ServerError;
use crate::server::ServerStats;
use cqld_protocol::{
    frame, CodecError, Consistency, Cursor, ErrorCode, FrameHeader, Opcode, Response,
    MAX_BODY_SIZE,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// CQL versions advertised in SUPPORTED responses.
pub const SUPPORTED_CQL_VERSIONS: [&str; 2] = ["3.0.0", "3.2.0"];

/// Compression algorithms advertised in SUPPORTED responses. Advertised
/// only; a frame actually using compression is rejected by the codec.
pub const SUPPORTED_COMPRESSIONS: [&str; 1] = ["snappy"];

/// A recoverable request failure, answered with an ERROR frame on the same
/// stream while the connection stays open.
struct RequestFailure {
    code: ErrorCode,
    message: String,
}

impl RequestFailure {
    fn protocol(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ProtocolError,
            message: message.into(),
        }
    }
}

impl From<CodecError> for RequestFailure {
    fn from(err: CodecError) -> Self {
        Self::protocol(err.to_string())
    }
}

impl From<QueryError> for RequestFailure {
    fn from(err: QueryError) -> Self {
        Self {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

/// One client connection.
///
/// Generic over the stream type so the state machine runs identically over
/// TCP sockets and in-memory test streams.
pub struct Connection<S> {
    stream: S,
    peer: String,
    /// Pinned protocol version; 0 until the first byte arrives.
    version: u8,
    idle_timeout: Option<Duration>,
    stats: Option<Arc<ServerStats>>,
    backend: Arc<dyn QueryBackend>,
    events: Arc<dyn EventSink>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        backend: Arc<dyn QueryBackend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            version: 0,
            idle_timeout: None,
            stats: None,
            backend,
            events,
        }
    }

    /// Sets an idle timeout, applied only while waiting at a frame boundary.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Attaches shared server statistics.
    pub fn with_stats(mut self, stats: Arc<ServerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Returns the pinned protocol version, or 0 before the first frame.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Drives the connection until clean EOF, idle timeout, or a fatal
    /// error. Decode failures at the header level are fatal because the
    /// stream position can no longer be trusted; failures inside a body are
    /// answered with an ERROR frame and the loop continues.
    pub async fn run(mut self) -> Result<(), ServerError> {
        loop {
            let header = match self.read_header().await? {
                Some(header) => header,
                None => {
                    tracing::debug!(peer = %self.peer, "connection closed");
                    return Ok(());
                }
            };

            if header.length > MAX_BODY_SIZE {
                let err = CodecError::MalformedLength(header.length as i64);
                self.try_write_error(header.stream, ErrorCode::ProtocolError, &err.to_string())
                    .await;
                return Err(err.into());
            }

            // The body was declared; anything short of it arriving is a
            // suspension, and EOF here is fatal, not a clean close. The
            // stream id is known at this point, so the peer gets one
            // best-effort ERROR frame before the connection drops.
            let mut body = vec![0u8; header.length as usize];
            if let Err(e) = self.stream.read_exact(&mut body).await {
                self.try_write_error(
                    header.stream,
                    ErrorCode::ServerError,
                    &format!("failed to read frame body: {e}"),
                )
                .await;
                return Err(e.into());
            }

            let response = self.handle_request(header.opcode, header.stream, &body).await;
            let bytes = response.into_bytes(self.version);
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await?;

            if let Some(stats) = &self.stats {
                stats.requests_total.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Reads the next frame header.
    ///
    /// On a fresh connection the header size is unknown until the version
    /// byte has been seen, so exactly one byte is read first and the rest of
    /// the header after it. Once pinned, headers are read in one shot.
    async fn read_header(&mut self) -> Result<Option<FrameHeader>, ServerError> {
        if self.version == 0 {
            let mut first = [0u8; 1];
            if !self.read_frame_start(&mut first).await? {
                return Ok(None);
            }
            self.version = frame::pin_version(first[0])?;
            tracing::debug!(peer = %self.peer, version = self.version, "pinned protocol version");

            let mut raw = vec![0u8; frame::header_size(self.version)];
            raw[0] = first[0];
            self.stream.read_exact(&mut raw[1..]).await?;
            Ok(Some(FrameHeader::parse(&raw, self.version)?))
        } else {
            let mut raw = vec![0u8; frame::header_size(self.version)];
            if !self.read_frame_start(&mut raw).await? {
                return Ok(None);
            }
            Ok(Some(FrameHeader::parse(&raw, self.version)?))
        }
    }

    /// First read at a frame boundary. Returns `false` on clean EOF or idle
    /// timeout; otherwise fills the whole buffer, treating EOF mid-fill as
    /// an error. The idle timeout never applies once a frame is partially
    /// read.
    async fn read_frame_start(&mut self, buf: &mut [u8]) -> Result<bool, ServerError> {
        let n = match self.idle_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.stream.read(buf)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::debug!(peer = %self.peer, "idle timeout");
                        return Ok(false);
                    }
                }
            }
            None => self.stream.read(buf).await?,
        };
        if n == 0 {
            return Ok(false);
        }
        if n < buf.len() {
            self.stream.read_exact(&mut buf[n..]).await?;
        }
        Ok(true)
    }

    /// Routes a decoded frame to its opcode handler and turns failures into
    /// ERROR responses on the same stream.
    async fn handle_request(&mut self, opcode: Opcode, stream: i16, body: &[u8]) -> Response {
        tracing::debug!(peer = %self.peer, ?opcode, stream, body_len = body.len(), "request");

        let result = match opcode {
            Opcode::Startup => self.on_startup(stream, body),
            Opcode::Options => self.on_options(stream),
            Opcode::Query => self.on_query(stream, body).await,
            Opcode::Prepare => self.on_prepare(stream, body).await,
            Opcode::Execute => self.on_execute(stream, body).await,
            Opcode::Batch => self.on_batch(stream, body).await,
            Opcode::Register => self.on_register(stream, body),
            Opcode::AuthResponse => self.on_auth_response(stream, body),
            other => Err(RequestFailure::protocol(format!(
                "opcode {other:?} is not valid as a request"
            ))),
        };

        match result {
            Ok(response) => response,
            Err(failure) => {
                tracing::debug!(
                    peer = %self.peer,
                    code = %failure.code,
                    message = %failure.message,
                    "request failed"
                );
                if let Some(stats) = &self.stats {
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
                Response::error(stream, failure.code, &failure.message)
            }
        }
    }

    fn on_startup(&self, stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let options = cur.read_string_map()?;
        for (key, value) in &options {
            tracing::debug!(peer = %self.peer, key, value, "startup option");
        }
        Ok(Response::ready(stream))
    }

    fn on_options(&self, stream: i16) -> Result<Response, RequestFailure> {
        let mut pairs = Vec::new();
        for version in SUPPORTED_CQL_VERSIONS {
            pairs.push(("CQL_VERSION", version));
        }
        for compression in SUPPORTED_COMPRESSIONS {
            pairs.push(("COMPRESSION", compression));
        }
        let mut response = Response::new(stream, Opcode::Supported);
        response.write_string_multimap(&pairs)?;
        Ok(response)
    }

    async fn on_query(&self, stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let query = cur.read_long_string()?.to_owned();
        // v2+ clients append a consistency level after the query text;
        // older ones may stop at the text itself.
        let consistency = if cur.remaining() >= 2 {
            cur.read_consistency()?
        } else {
            Consistency::default()
        };

        tracing::debug!(peer = %self.peer, %query, ?consistency, "executing query");
        let payload = self
            .backend
            .execute(&query, QueryOptions { consistency })
            .await?;

        let mut response = Response::new(stream, Opcode::Result);
        response.append(payload.as_bytes());
        Ok(response)
    }

    async fn on_prepare(&self, stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let query = cur.read_long_string()?.to_owned();
        let payload = self.backend.prepare(&query).await?;

        let mut response = Response::new(stream, Opcode::Result);
        response.append(payload.as_bytes());
        Ok(response)
    }

    async fn on_execute(&self, stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let id = cur.read_short_bytes()?.to_vec();
        let values = read_values(&mut cur)?;
        let consistency = if cur.remaining() >= 2 {
            cur.read_consistency()?
        } else {
            Consistency::default()
        };

        let payload = self
            .backend
            .execute_prepared(&id, values, QueryOptions { consistency })
            .await?;

        let mut response = Response::new(stream, Opcode::Result);
        response.append(payload.as_bytes());
        Ok(response)
    }

    async fn on_batch(&self, stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let kind_byte = cur.read_u8()?;
        let kind = BatchKind::from_wire(kind_byte)
            .ok_or_else(|| RequestFailure::protocol(format!("unknown batch kind {kind_byte}")))?;

        let count = cur.read_u16()?;
        let mut statements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let statement = match cur.read_u8()? {
                0 => {
                    let text = cur.read_long_string()?.to_owned();
                    let values = read_values(&mut cur)?;
                    BatchStatement::Query { text, values }
                }
                1 => {
                    let id = cur.read_short_bytes()?.to_vec();
                    let values = read_values(&mut cur)?;
                    BatchStatement::Prepared { id, values }
                }
                other => {
                    return Err(RequestFailure::protocol(format!(
                        "unknown batch statement kind {other}"
                    )))
                }
            };
            statements.push(statement);
        }
        let consistency = if cur.remaining() >= 2 {
            cur.read_consistency()?
        } else {
            Consistency::default()
        };

        let payload = self
            .backend
            .run_batch(Batch {
                kind,
                statements,
                consistency,
            })
            .await?;

        let mut response = Response::new(stream, Opcode::Result);
        response.append(payload.as_bytes());
        Ok(response)
    }

    fn on_register(&self, stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let kinds = cur.read_string_list()?;
        self.events.register(&kinds);
        Ok(Response::ready(stream))
    }

    fn on_auth_response(&self, _stream: i16, body: &[u8]) -> Result<Response, RequestFailure> {
        let mut cur = Cursor::new(body);
        let _token = cur.read_bytes()?;
        Err(RequestFailure::protocol("authentication was not requested"))
    }

    /// Best-effort ERROR frame on a fatal path where the stream id is
    /// known. If this write fails, the connection just closes.
    async fn try_write_error(&mut self, stream: i16, code: ErrorCode, message: &str) {
        if self.version == 0 {
            return;
        }
        let bytes = Response::error(stream, code, message).into_bytes(self.version);
        let _ = self.stream.write_all(&bytes).await;
        let _ = self.stream.flush().await;
    }
}

/// Reads a 2-byte value count followed by that many `[bytes]` values.
fn read_values(cur: &mut Cursor<'_>) -> Result<Vec<Option<Vec<u8>>>, CodecError> {
    if cur.remaining() < 2 {
        return Ok(Vec::new());
    }
    let n = cur.read_u16()?;
    let mut values = Vec::with_capacity(n as usize);
    for _ in 0..n {
        values.push(cur.read_bytes()?.map(<[u8]>::to_vec));
    }
    Ok(values)
}
