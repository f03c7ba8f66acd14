//! Driver for Airview USB spectrum analyzers.
//!
//! The device speaks an undocumented, newline-delimited text protocol over
//! a 9600-baud serial line. This crate bundles the layers that drive it.
//!
//! # Crate Structure
//!
//! - [`transport`]: Blocking byte transport over a serial device
//! - [`frame`]: Command encoding, line framing and response parsing
//! - [`session`]: Session state machine, device info and continuous scans
//!   (behind the `session` feature)
//!
//! # Example
//!
//! ```no_run
//! use airview::session::{channel_sink, Session};
//!
//! let mut session = Session::new();
//! session.connect("/dev/ttyACM0")?;
//! session.initialize()?;
//! let info = session.get_device_info()?;
//! println!("{} MHz to {} MHz", info.rf_start_mhz, info.rf_end_mhz);
//!
//! let (sink, batches) = channel_sink(64);
//! session.start_scan(sink)?;
//! for batch in batches.iter().take(10) {
//!     println!("{:?}", batch.rssi);
//! }
//! let report = session.stop_scan()?;
//! println!("delivered {} batches", report.delivered);
//! # Ok::<(), airview::session::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use airview_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use airview_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use airview_session::*;
}
