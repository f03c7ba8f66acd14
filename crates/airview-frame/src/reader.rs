use airview_transport::Transport;
use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{RawMessage, DELIMITER};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const MAX_READ_CHUNK_SIZE: usize = 4096;

/// Configuration for the line framer.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Bytes requested per transport read, 1 to 4096. Default: 1.
    ///
    /// Bytes read past a delimiter are kept for the next message.
    pub read_chunk_size: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self { read_chunk_size: 1 }
    }
}

/// Accumulates transport reads into newline-terminated messages.
///
/// The reader does not own the transport; it borrows it per call so the
/// transport can move between the session and a scan worker together with
/// the reader.
#[derive(Debug)]
pub struct LineReader {
    buf: BytesMut,
    // Prefix of `buf` already known to hold no delimiter.
    scanned: usize,
    config: LineConfig,
}

impl LineReader {
    /// Create a reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(LineConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(config: LineConfig) -> Self {
        let read_chunk_size = config.read_chunk_size.clamp(1, MAX_READ_CHUNK_SIZE);
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanned: 0,
            config: LineConfig { read_chunk_size },
        }
    }

    /// Read the next complete message.
    ///
    /// Returns `Ok(None)` when a read times out before the delimiter
    /// arrives. The partial message is discarded; the caller decides
    /// whether to try again. There is no length cap, so a device that
    /// never sends the delimiter keeps this call going until its reads
    /// time out.
    pub fn read_message<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<Option<RawMessage>> {
        let mut chunk = [0u8; MAX_READ_CHUNK_SIZE];
        let chunk = &mut chunk[..self.config.read_chunk_size];

        loop {
            if let Some(message) = self.take_message() {
                trace!(len = message.len(), "framed message");
                return Ok(Some(message));
            }

            let read = transport.read(chunk)?;
            if read == 0 {
                if !self.buf.is_empty() {
                    debug!(
                        partial = %String::from_utf8_lossy(&self.buf),
                        "read timed out mid-message, discarding partial"
                    );
                }
                self.clear();
                return Ok(None);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Discard buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    /// Bytes buffered beyond the last returned message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current framer configuration.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    fn take_message(&mut self) -> Option<RawMessage> {
        let Some(offset) = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        else {
            self.scanned = self.buf.len();
            return None;
        };
        let end = self.scanned + offset + 1;
        self.scanned = 0;
        RawMessage::new(self.buf.split_to(end).freeze())
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use airview_transport::{MockTransport, TransportError};

    use super::*;
    use crate::error::FrameError;
    use crate::response::parse_response;
    use crate::writer::CommandWriter;

    #[test]
    fn reads_message_delivered_byte_by_byte() {
        let mut mock = MockTransport::new().with_read(b"stat|ok,ready\n");
        let mut reader = LineReader::new();

        let msg = reader.read_message(&mut mock).unwrap().unwrap();
        assert_eq!(msg.as_bytes(), b"stat|ok,ready\n");
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn stops_at_delimiter_without_reading_further() {
        let mut mock = MockTransport::new().with_read(b"one\ntwo\n");
        let handle = mock.handle();
        let mut reader = LineReader::new();

        let first = reader.read_message(&mut mock).unwrap().unwrap();
        assert_eq!(first.as_bytes(), b"one\n");
        assert_eq!(handle.reads_attempted(), 4);

        let second = reader.read_message(&mut mock).unwrap().unwrap();
        assert_eq!(second.as_bytes(), b"two\n");
    }

    #[test]
    fn large_chunks_carry_over_to_next_message() {
        let mut mock = MockTransport::new().with_read(b"one\ntwo\nthr");
        let mut reader = LineReader::with_config(LineConfig {
            read_chunk_size: 64,
        });

        assert_eq!(
            reader.read_message(&mut mock).unwrap().unwrap().as_bytes(),
            b"one\n"
        );
        assert_eq!(reader.buffered(), 7);
        assert_eq!(
            reader.read_message(&mut mock).unwrap().unwrap().as_bytes(),
            b"two\n"
        );
        // "thr" never completes.
        assert!(reader.read_message(&mut mock).unwrap().is_none());
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn timeout_before_delimiter_is_incomplete() {
        let mut mock = MockTransport::new().with_read(b"stat|ok,rea").with_timeout();
        let mut reader = LineReader::new();
        assert!(reader.read_message(&mut mock).unwrap().is_none());
    }

    #[test]
    fn silent_transport_is_incomplete() {
        let mut mock = MockTransport::new();
        let mut reader = LineReader::new();
        assert!(reader.read_message(&mut mock).unwrap().is_none());
    }

    #[test]
    fn partial_is_discarded_after_timeout() {
        let mut mock = MockTransport::new()
            .with_read(b"garb")
            .with_timeout()
            .with_read(b"stat|ok,ready\n");
        let mut reader = LineReader::new();

        assert!(reader.read_message(&mut mock).unwrap().is_none());
        let msg = reader.read_message(&mut mock).unwrap().unwrap();
        assert_eq!(msg.as_bytes(), b"stat|ok,ready\n");
    }

    #[test]
    fn every_delimited_sequence_is_returned_verbatim() {
        let cases: [&[u8]; 5] = [
            b"\n",
            b"x\n",
            b"scan|x,1 2 3\n",
            b"\x00\xff binary \r\n",
            b"no|shape,at all,,,\n",
        ];
        for case in cases {
            let mut mock = MockTransport::new().with_read(case);
            let msg = LineReader::new().read_message(&mut mock).unwrap().unwrap();
            assert_eq!(msg.as_bytes(), case);
        }
    }

    #[test]
    fn response_parses_identically_under_any_chunking() {
        let response = b"devi|abc,USB1,1.2.0,revB,2015-01-01,x,2400.0 2483.5 5.0 173\n";
        let expected = crate::response::parse_body(&response[..response.len() - 1]).unwrap();

        for max_read in 1..=response.len() {
            for chunk_size in [1, 7, 4096] {
                let mut mock = MockTransport::new()
                    .respond(b"gdi\n", response)
                    .with_max_read(max_read);
                let mut writer = CommandWriter::new();
                let mut reader = LineReader::with_config(LineConfig {
                    read_chunk_size: chunk_size,
                });

                writer.send(&mut mock, "gdi").unwrap();
                let msg = reader.read_message(&mut mock).unwrap().unwrap();
                assert_eq!(parse_response(&msg).unwrap(), expected);
            }
        }
    }

    #[test]
    fn transport_error_propagates() {
        let mut mock = MockTransport::new();
        airview_transport::Transport::close(&mut mock).unwrap();
        let err = LineReader::new().read_message(&mut mock).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Closed)
        ));
    }

    #[test]
    fn chunk_size_is_clamped() {
        let reader = LineReader::with_config(LineConfig { read_chunk_size: 0 });
        assert_eq!(reader.config().read_chunk_size, 1);
        let reader = LineReader::with_config(LineConfig {
            read_chunk_size: 1 << 20,
        });
        assert_eq!(reader.config().read_chunk_size, MAX_READ_CHUNK_SIZE);
    }
}
