use crate::error::Result;

/// A duplex byte stream to the device.
///
/// Reads block for at most the transport's configured timeout. A read that
/// returns `Ok(0)` means the timeout elapsed without new data; it is not an
/// error and does not mean the stream has ended.
///
/// A transport has exactly one owner at a time. Implementations must be
/// `Send` so ownership can move to a background scan worker and back.
pub trait Transport: Send {
    /// Read up to `buf.len()` bytes, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Discard any bytes received but not yet read.
    fn flush_input(&mut self) -> Result<()>;

    /// Block until all written bytes have been handed to the device.
    fn flush_output(&mut self) -> Result<()>;

    /// Close the transport. Closing an already closed transport is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether the transport is currently open.
    fn is_open(&self) -> bool;

    /// Transport name for diagnostics (device path or mock label).
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush_input(&mut self) -> Result<()> {
        (**self).flush_input()
    }

    fn flush_output(&mut self) -> Result<()> {
        (**self).flush_output()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
