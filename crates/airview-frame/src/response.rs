use std::str::Utf8Error;

use bytes::Bytes;
use tracing::trace;

use crate::codec::RawMessage;

/// A response split into its three protocol fields.
///
/// `<command_id>|<info>,<payload>`: the split anchors on the first `|` and
/// the first `,` after it. Everything past that comma, further commas
/// included, is the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Response type, e.g. `stat`, `devi`, `scan`.
    pub command_id: String,
    /// Free-form field between `|` and the first comma.
    pub info: String,
    /// Everything after the first comma, verbatim.
    pub payload: Bytes,
}

impl ParsedResponse {
    /// Whether this response has the given command id.
    pub fn is(&self, command_id: &str) -> bool {
        self.command_id == command_id
    }

    /// Payload as text.
    pub fn payload_str(&self) -> std::result::Result<&str, Utf8Error> {
        std::str::from_utf8(&self.payload)
    }
}

/// Why a message did not match the response shape.
///
/// Returned as a value: unrecognized traffic is expected, especially while
/// probing for unknown commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// No `|` separator.
    #[error("no '|' separator")]
    MissingPipe,
    /// No `,` after the `|` separator.
    #[error("no ',' separator after '|'")]
    MissingComma,
    /// The command id is empty or has non-word characters.
    #[error("command id is empty or contains non-word characters")]
    InvalidCommandId,
    /// The info field is empty or has characters other than word/space.
    #[error("info field is empty or contains invalid characters")]
    InvalidInfo,
    /// Nothing follows the first comma.
    #[error("payload is empty")]
    EmptyPayload,
}

/// Parse a framed message.
pub fn parse_response(message: &RawMessage) -> Result<ParsedResponse, ParseFailure> {
    parse_body(message.body())
}

/// Parse a message body with the delimiter already stripped.
pub fn parse_body(body: &[u8]) -> Result<ParsedResponse, ParseFailure> {
    let pipe = body
        .iter()
        .position(|&b| b == b'|')
        .ok_or(ParseFailure::MissingPipe)?;
    let (command_id, rest) = (&body[..pipe], &body[pipe + 1..]);

    let comma = rest
        .iter()
        .position(|&b| b == b',')
        .ok_or(ParseFailure::MissingComma)?;
    let (info, payload) = (&rest[..comma], &rest[comma + 1..]);

    if command_id.is_empty() || !command_id.iter().copied().all(is_word) {
        return Err(ParseFailure::InvalidCommandId);
    }
    if info.is_empty() || !info.iter().all(|&b| is_word(b) || b.is_ascii_whitespace()) {
        return Err(ParseFailure::InvalidInfo);
    }
    if payload.is_empty() {
        return Err(ParseFailure::EmptyPayload);
    }

    // Both fields are ASCII word/space bytes, so this cannot lose data.
    let command_id = String::from_utf8_lossy(command_id).into_owned();
    let info = String::from_utf8_lossy(info).into_owned();
    trace!(%command_id, %info, payload_len = payload.len(), "parsed response");

    Ok(ParsedResponse {
        command_id,
        info,
        payload: Bytes::copy_from_slice(payload),
    })
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
