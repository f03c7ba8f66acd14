use airview_transport::TransportError;

/// Errors that can occur while framing or encoding messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The command name cannot be put on the wire.
    #[error("invalid command {command:?}: {reason}")]
    InvalidCommand {
        command: String,
        reason: &'static str,
    },

    /// The underlying transport failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
