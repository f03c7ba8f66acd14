use airview_frame::{CommandWriter, LineConfig, LineReader, RawMessage, Result};
use airview_transport::Transport;
use tracing::debug;

/// A transport together with its framer and command writer.
///
/// Moves as one unit between the session and the scan worker, so bytes
/// buffered by the framer follow the transport.
#[derive(Debug)]
pub struct Link<T> {
    transport: T,
    reader: LineReader,
    writer: CommandWriter,
}

impl<T: Transport> Link<T> {
    /// Wrap an open transport.
    pub fn new(transport: T, config: LineConfig) -> Self {
        Self {
            transport,
            reader: LineReader::with_config(config),
            writer: CommandWriter::new(),
        }
    }

    /// Encode and send a command.
    pub fn send(&mut self, command: &str) -> Result<()> {
        self.writer.send(&mut self.transport, command)
    }

    /// Read the next framed message, `None` on timeout.
    pub fn read(&mut self) -> Result<Option<RawMessage>> {
        self.reader.read_message(&mut self.transport)
    }

    /// Send a command and read exactly one message back.
    pub fn request(&mut self, command: &str) -> Result<Option<RawMessage>> {
        self.send(command)?;
        let response = self.read()?;
        match &response {
            Some(message) => debug!(command, response = %message, "received response"),
            None => debug!(command, "no response within read timeout"),
        }
        Ok(response)
    }

    /// Discard unread input, both buffered in the framer and at the transport.
    pub fn discard_input(&mut self) -> Result<()> {
        self.reader.clear();
        self.transport.flush_input()?;
        Ok(())
    }

    /// Close the transport.
    pub fn close(&mut self) -> Result<()> {
        self.reader.clear();
        self.transport.close()?;
        Ok(())
    }

    /// Whether the transport is open.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
