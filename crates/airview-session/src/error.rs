use airview_frame::{FrameError, ParseFailure};
use airview_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport could not be opened.
    #[error("connection failed: {0}")]
    Connection(TransportError),

    /// Transport-level error on an open connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error (command encoding, framed I/O).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The operation needs an open connection.
    #[error("not connected")]
    NotConnected,

    /// The transport is owned by a running scan.
    #[error("a scan is in progress; stop it first")]
    ScanInProgress,

    /// There is no scan to stop.
    #[error("no scan in progress")]
    NotScanning,

    /// The device did not answer within one read timeout.
    #[error("no response to {command:?}")]
    NoResponse { command: &'static str },

    /// The answer did not have the `<id>|<info>,<payload>` shape.
    #[error("malformed response to {command:?} ({failure}): {raw:?}")]
    Malformed {
        command: &'static str,
        failure: ParseFailure,
        raw: String,
    },

    /// The answer was well-formed but of another type.
    ///
    /// The protocol has no request ids, so this is what a late response to
    /// an earlier command, or unsolicited scan traffic, looks like.
    #[error("expected {expected:?} response, received {received:?}")]
    UnexpectedResponse {
        expected: &'static str,
        received: String,
    },

    /// A recognized response carried an undecodable payload.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The scan worker thread could not be started.
    #[error("failed to start scan worker: {0}")]
    Spawn(std::io::Error),

    /// The scan worker thread panicked; the transport is lost.
    #[error("scan worker panicked")]
    WorkerPanicked,
}

/// A recognized response whose payload does not match its expected layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not text.
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// Wrong number of comma-separated fields.
    #[error("expected {expected} comma-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    /// Wrong number of space-separated RF sub-fields.
    #[error("expected {expected} RF sub-fields, found {found}")]
    RfFieldCount { expected: usize, found: usize },

    /// A numeric field did not parse.
    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;
