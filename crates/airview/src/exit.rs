use std::fmt;
use std::io;

use airview_frame::FrameError;
use airview_session::SessionError;
use airview_transport::TransportError;

// Exit codes follow sysexits/timeout(1) conventions where one exists.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_kind_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_kind_code(err.kind()), format!("{context}: {err}"))
}

fn serial_code(err: &serialport::Error) -> i32 {
    match err.kind() {
        serialport::ErrorKind::Io(kind) => io_kind_code(kind),
        serialport::ErrorKind::InvalidInput => USAGE,
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Unknown => TRANSPORT_ERROR,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Open { source, .. } | TransportError::Serial(source) => {
            serial_code(source)
        }
        TransportError::Io(source) => io_kind_code(source.kind()),
        TransportError::Closed => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::InvalidCommand { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Connection(err) | SessionError::Transport(err) => {
            transport_error(context, err)
        }
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Spawn(err) => io_error(context, err),
        SessionError::NoResponse { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Malformed { .. }
        | SessionError::UnexpectedResponse { .. }
        | SessionError::Decode(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::NotConnected => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
