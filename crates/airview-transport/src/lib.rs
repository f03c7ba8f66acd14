//! Byte-stream transport for Airview spectrum analyzers.
//!
//! The device enumerates as a USB CDC serial port and speaks a line-oriented
//! text protocol at 9600 baud. This crate provides:
//! - The [`Transport`] trait: blocking reads bounded by a timeout, writes,
//!   buffer flushes and close
//! - [`SerialTransport`], the real implementation over a serial device path
//! - `MockTransport` (behind the `mock` feature) for protocol tests
//!
//! This is the lowest layer of the driver. Framing, parsing and the session
//! state machine are built on top of the [`Transport`] trait.

pub mod error;
pub mod serial;
pub mod traits;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::{Result, TransportError};
pub use serial::{DataBits, Parity, SerialConfig, SerialTransport, StopBits};
pub use traits::Transport;

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockTransport};
