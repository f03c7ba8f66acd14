//! Session management and continuous scanning for Airview spectrum
//! analyzers.
//!
//! A [`Session`] owns the transport and sequences one-shot request/response
//! exchanges (`init`, `gdi`, arbitrary probes). [`Session::start_scan`]
//! hands the transport to a background [`ScanController`] that streams RSSI
//! batches into a [`SampleSink`] until cancelled, then sends the end-scan
//! command and releases the transport.

pub mod command;
pub mod device;
pub mod discovery;
pub mod error;
pub mod link;
pub mod sample;
pub mod scan;
pub mod session;

pub use command::{
    BEGIN_SCAN, DEFAULT_SAMPLE_COUNT, DEVICE_INFO, END_SCAN, GET_DEVICE_INFO, INITIALIZE, SCAN,
    STATUS,
};
pub use device::DeviceInfo;
pub use discovery::{candidates, probe, Candidates, ProbeReport};
pub use error::{DecodeError, Result, SessionError};
pub use link::Link;
pub use sample::{channel_sink, ChannelSink, ProtocolViolation, SampleSink, ScanSample, SinkStatus};
pub use scan::{CancelToken, ScanConfig, ScanController, ScanEnd, ScanHandle, ScanReport};
pub use session::{Session, SessionConfig, SessionState};
