//! Error taxonomy for GC family clients
//!
//! Every outcome a caller can observe maps to exactly one kind:
//!
//! - [`ConnectionError`]: transport failures, with a short `E*` code in the
//!   style of the OS error names (`ETIMEDOUT` for a failed connect,
//!   `ECONNLOST` for a drop after the connection opened) and an optional
//!   underlying I/O cause.
//! - [`ResponseError`]: an error the device itself reported on the wire,
//!   carrying the device-emitted code and a resolved human message.
//! - The queue-level variants of [`GcError`]: `QueueTimeout`, `SendTimeout`,
//!   `QueueCleared` and `BusyIr`, added by this library.

use thiserror::Error;

/// Result type alias used across the workspace
pub type GcResult<T> = Result<T, GcError>;

/// Top-level error type returned to `send` callers
#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    /// The request expired before it was ever dispatched.
    #[error("request expired after {waited_ms} ms waiting in the queue")]
    QueueTimeout { waited_ms: u64 },

    /// The request was dispatched but no correlated response arrived in time.
    #[error("no matching response within {timeout_ms} ms of dispatch")]
    SendTimeout { timeout_ms: u64 },

    /// The queue was cleared (disconnect or close) while the request was pending.
    #[error("request dropped: the queue was cleared")]
    QueueCleared,

    /// The IR connector stayed busy and the remaining send budget did not
    /// allow another retry.
    #[error("IR connector {connector} is busy and the retry budget is exhausted")]
    BusyIr { connector: String },
}

impl GcError {
    /// Short machine-readable code for this error
    pub fn code(&self) -> &str {
        match self {
            GcError::Connection(e) => e.code.as_str(),
            GcError::Response(e) => &e.code,
            GcError::QueueTimeout { .. } => "QUEUE_TIMEOUT",
            GcError::SendTimeout { .. } => "SEND_TIMEOUT",
            GcError::QueueCleared => "QUEUE_CLEARED",
            GcError::BusyIr { .. } => "BUSY_IR",
        }
    }
}

/// Code identifying the class of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorCode {
    /// TCP connect did not complete within the connection timeout
    Etimedout,
    /// The connection dropped after it had been opened
    Econnlost,
    Econnrefused,
    Econnreset,
    Ehostunreach,
    Enetunreach,
    Epipe,
    /// Any other I/O failure
    Eio,
}

impl ConnectionErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionErrorCode::Etimedout => "ETIMEDOUT",
            ConnectionErrorCode::Econnlost => "ECONNLOST",
            ConnectionErrorCode::Econnrefused => "ECONNREFUSED",
            ConnectionErrorCode::Econnreset => "ECONNRESET",
            ConnectionErrorCode::Ehostunreach => "EHOSTUNREACH",
            ConnectionErrorCode::Enetunreach => "ENETUNREACH",
            ConnectionErrorCode::Epipe => "EPIPE",
            ConnectionErrorCode::Eio => "EIO",
        }
    }

    /// Map a standard I/O error kind onto the closest `E*` code
    pub fn from_io_kind(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind;
        match kind {
            ErrorKind::ConnectionRefused => ConnectionErrorCode::Econnrefused,
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                ConnectionErrorCode::Econnreset
            }
            ErrorKind::HostUnreachable => ConnectionErrorCode::Ehostunreach,
            ErrorKind::NetworkUnreachable => ConnectionErrorCode::Enetunreach,
            ErrorKind::BrokenPipe => ConnectionErrorCode::Epipe,
            ErrorKind::TimedOut => ConnectionErrorCode::Etimedout,
            _ => ConnectionErrorCode::Eio,
        }
    }
}

impl std::fmt::Display for ConnectionErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-level failure, tied to the peer it concerned
#[derive(Debug, Error)]
#[error("{code}: {address}:{port}")]
pub struct ConnectionError {
    pub code: ConnectionErrorCode,
    pub address: String,
    pub port: u16,
    #[source]
    pub source: Option<std::io::Error>,
}

impl ConnectionError {
    /// TCP connect did not complete within the allowed time
    pub fn timed_out(address: impl Into<String>, port: u16) -> Self {
        Self {
            code: ConnectionErrorCode::Etimedout,
            address: address.into(),
            port,
            source: None,
        }
    }

    /// An established connection dropped
    pub fn lost(address: impl Into<String>, port: u16, source: Option<std::io::Error>) -> Self {
        Self {
            code: ConnectionErrorCode::Econnlost,
            address: address.into(),
            port,
            source,
        }
    }

    /// Wrap an I/O error observed while connecting or transferring
    pub fn from_io(address: impl Into<String>, port: u16, source: std::io::Error) -> Self {
        Self {
            code: ConnectionErrorCode::from_io_kind(source.kind()),
            address: address.into(),
            port,
            source: Some(source),
        }
    }
}

/// An error the device reported on the wire
///
/// The `code` is exactly what the device emitted (`"014"`, `"ERR SL001"`,
/// the trailing token of a GC-100 `unknowncommand` line). The `message` is
/// resolved from the static dictionary in [`crate::codes`]; unknown codes
/// surface verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device error {code}: {message}")]
pub struct ResponseError {
    pub code: String,
    pub message: String,
}

impl ResponseError {
    /// Build a `ResponseError` from a device-emitted code, resolving the
    /// human message where one is known
    pub fn from_code(code: impl Into<String>) -> Self {
        let code = code.into();
        let message = match crate::codes::message_for(&code) {
            Some(text) => text.to_string(),
            None => code.clone(),
        };
        Self { code, message }
    }
}
