use airview_transport::Transport;
use bytes::BytesMut;
use tracing::debug;

use crate::codec::encode_command;
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 64;

/// Encodes commands and writes them to a transport.
#[derive(Debug)]
pub struct CommandWriter {
    buf: BytesMut,
}

impl CommandWriter {
    /// Create a new command writer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode `command` and write it, then flush the output side.
    ///
    /// Nothing is written if the command fails to encode.
    pub fn send<T: Transport + ?Sized>(&mut self, transport: &mut T, command: &str) -> Result<()> {
        self.buf.clear();
        encode_command(command, &mut self.buf)?;

        debug!(command, transport = transport.name(), "sending command");
        transport.write_all(&self.buf)?;
        transport.flush_output()?;
        Ok(())
    }
}

impl Default for CommandWriter {
    fn default() -> Self {
        Self::new()
    }
}
