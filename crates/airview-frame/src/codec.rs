use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Line delimiter terminating every request and response.
pub const DELIMITER: u8 = b'\n';

/// A complete message read off the wire, delimiter included.
///
/// Never empty, and the last byte is always [`DELIMITER`].
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage(Bytes);

impl RawMessage {
    /// Wrap `bytes` if they form a complete message.
    pub fn new(bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        if bytes.last() == Some(&DELIMITER) {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// The full message including the trailing delimiter.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The message with the trailing delimiter stripped.
    pub fn body(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }

    /// Length including the delimiter.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Body decoded as text, replacing invalid UTF-8.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    /// Consume the message and return the underlying bytes.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl AsRef<[u8]> for RawMessage {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawMessage")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

impl fmt::Display for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.body()))
    }
}

/// Encode a command into its wire form.
///
/// The name is lower-cased and must be non-empty ASCII alphanumerics.
/// Whether the command is one the device knows is not checked here.
///
/// Wire format:
/// ```text
/// <command>\n
/// ```
pub fn encode_command(command: &str, dst: &mut BytesMut) -> Result<()> {
    if command.is_empty() {
        return Err(FrameError::InvalidCommand {
            command: command.to_string(),
            reason: "command is empty",
        });
    }
    if !command.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(FrameError::InvalidCommand {
            command: command.to_string(),
            reason: "only ASCII letters and digits are allowed",
        });
    }

    dst.reserve(command.len() + 1);
    for b in command.bytes() {
        dst.put_u8(b.to_ascii_lowercase());
    }
    dst.put_u8(DELIMITER);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(command: &str) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        encode_command(command, &mut buf)?;
        Ok(buf.to_vec())
    }

    #[test]
    fn encodes_known_commands() {
        assert_eq!(encode("init").unwrap(), b"init\n");
        assert_eq!(encode("gdi").unwrap(), b"gdi\n");
        assert_eq!(encode("bs").unwrap(), b"bs\n");
        assert_eq!(encode("es").unwrap(), b"es\n");
    }

    #[test]
    fn lowercases_command() {
        assert_eq!(encode("GDI").unwrap(), b"gdi\n");
        assert_eq!(encode("Ab12").unwrap(), b"ab12\n");
    }

    #[test]
    fn length_is_not_constrained() {
        let long = "a".repeat(40);
        assert_eq!(encode(&long).unwrap().len(), 41);
    }

    #[test]
    fn rejects_empty_and_non_alphanumeric() {
        assert!(matches!(
            encode(""),
            Err(FrameError::InvalidCommand { .. })
        ));
        for bad in ["in it", "gdi\n", "bs|", "é", "a,b"] {
            assert!(
                matches!(encode(bad), Err(FrameError::InvalidCommand { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn failed_encode_leaves_buffer_untouched() {
        let mut buf = BytesMut::from(&b"keep"[..]);
        assert!(encode_command("no pe", &mut buf).is_err());
        assert_eq!(&buf[..], b"keep");
    }

    #[test]
    fn raw_message_requires_trailing_delimiter() {
        assert!(RawMessage::new(Bytes::from_static(b"")).is_none());
        assert!(RawMessage::new(Bytes::from_static(b"stat|a,b")).is_none());

        let msg = RawMessage::new(Bytes::from_static(b"stat|a,b\n")).unwrap();
        assert_eq!(msg.body(), b"stat|a,b");
        assert_eq!(msg.len(), 9);
        assert_eq!(msg.to_string(), "stat|a,b");
    }

    #[test]
    fn delimiter_only_message_has_empty_body() {
        let msg = RawMessage::new(vec![DELIMITER]).unwrap();
        assert!(msg.body().is_empty());
        assert!(!msg.is_empty());
    }
}
