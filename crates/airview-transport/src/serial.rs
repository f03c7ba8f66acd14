use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, FlowControl, SerialPort};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

pub use serialport::{DataBits, Parity, StopBits};

/// Line settings for the serial device.
///
/// The defaults are the only settings the Airview firmware is known to
/// accept: 9600 baud, 8 data bits, no parity, 1 stop bit.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate. Default: 9600.
    pub baud_rate: u32,
    /// Data bits per character. Default: 8.
    pub data_bits: DataBits,
    /// Parity checking. Default: none.
    pub parity: Parity,
    /// Stop bits. Default: 1.
    pub stop_bits: StopBits,
    /// Upper bound for a single blocking read. Default: 500ms.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Default baud rate of the Airview firmware.
    pub const DEFAULT_BAUD_RATE: u32 = 9600;
    /// Default read timeout.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: Self::DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Serial port transport.
///
/// On Unix the port is opened in exclusive mode, so opening a device that
/// another process already holds fails with [`TransportError::Open`].
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    config: SerialConfig,
}

impl SerialTransport {
    /// Open `path` with the default line settings.
    pub fn open(path: impl Into<String>) -> Result<Self> {
        Self::open_with_config(path, SerialConfig::default())
    }

    /// Open `path` with explicit line settings.
    pub fn open_with_config(path: impl Into<String>, config: SerialConfig) -> Result<Self> {
        let path = path.into();
        let port = serialport::new(path.as_str(), config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        info!(
            %path,
            baud_rate = config.baud_rate,
            read_timeout = ?config.read_timeout,
            "opened serial device"
        );

        Ok(Self {
            port: Some(port),
            path,
            config,
        })
    }

    /// Device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Line settings in effect.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        loop {
            match port.read(buf) {
                Ok(n) => {
                    trace!(bytes = n, "serial read");
                    return Ok(n);
                }
                // serialport reports an elapsed timeout as an error; the
                // transport contract reports it as an empty read.
                Err(err) if err.kind() == ErrorKind::TimedOut => return Ok(0),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port_mut()?.write_all(data)?;
        trace!(bytes = data.len(), "serial write");
        Ok(())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.port_mut()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(path = %self.path, "closed serial device");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .field("config", &self.config)
            .finish()
    }
}
