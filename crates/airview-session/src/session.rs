use airview_frame::{parse_response, LineConfig, RawMessage};
use airview_transport::{SerialConfig, SerialTransport, Transport, TransportError};
use tracing::{debug, info, warn};

use crate::command::{DEFAULT_SAMPLE_COUNT, DEVICE_INFO, GET_DEVICE_INFO, INITIALIZE, STATUS};
use crate::device::DeviceInfo;
use crate::error::{Result, SessionError};
use crate::link::Link;
use crate::sample::SampleSink;
use crate::scan::{ScanConfig, ScanController, ScanHandle, ScanReport};

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Scanning,
}

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial line settings used by [`Session::connect`].
    pub serial: SerialConfig,
    /// Framer settings.
    pub line: LineConfig,
    /// Batch length accepted when the device has not reported its own.
    /// Default: 173.
    pub expected_samples: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            line: LineConfig::default(),
            expected_samples: DEFAULT_SAMPLE_COUNT,
        }
    }
}

/// A connection to one Airview device.
///
/// The session owns the transport exclusively. While a scan runs, the
/// transport belongs to the scan worker and every one-shot operation fails
/// with [`SessionError::ScanInProgress`] without touching it, so one-shot
/// reads never interleave with the scan loop's reads.
///
/// Requests and responses are strictly one-for-one. The protocol has no
/// request ids: a late answer to an earlier command is reported as
/// [`SessionError::UnexpectedResponse`] rather than guessed at.
pub struct Session<T: Transport + 'static = SerialTransport> {
    link: Option<Link<T>>,
    scan: Option<ScanHandle<T>>,
    device_info: Option<DeviceInfo>,
    config: SessionConfig,
}

impl Session<SerialTransport> {
    /// Create a disconnected serial session with default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Open the serial device at `path`.
    ///
    /// Calling this while connected logs a warning and leaves the existing
    /// connection in place.
    pub fn connect(&mut self, path: &str) -> Result<()> {
        let serial = self.config.serial.clone();
        self.connect_with(|| SerialTransport::open_with_config(path, serial))
    }
}

impl Default for Session<SerialTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport + 'static> Session<T> {
    /// Create a disconnected session.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            link: None,
            scan: None,
            device_info: None,
            config,
        }
    }

    /// Create a session around an already open transport.
    pub fn with_transport(transport: T) -> Self {
        Self::with_transport_and_config(transport, SessionConfig::default())
    }

    /// Create a session around an already open transport with explicit
    /// configuration.
    pub fn with_transport_and_config(transport: T, config: SessionConfig) -> Self {
        let mut session = Self::with_config(config);
        session.attach(transport);
        session
    }

    /// Connect using `open` to create the transport.
    ///
    /// `open` is not called if the session is already connected.
    pub fn connect_with<F>(&mut self, open: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<T, TransportError>,
    {
        if self.state() != SessionState::Disconnected {
            warn!(state = ?self.state(), "connect called while already connected, ignoring");
            return Ok(());
        }

        let transport = open().map_err(SessionError::Connection)?;
        self.attach(transport);
        Ok(())
    }

    fn attach(&mut self, mut transport: T) {
        if let Err(err) = transport.flush_input() {
            debug!(error = %err, "could not flush input on connect");
        }
        info!(transport = transport.name(), "connected");
        self.link = Some(Link::new(transport, self.config.line.clone()));
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        if self.scan.is_some() {
            SessionState::Scanning
        } else if self.link.as_ref().is_some_and(Link::is_open) {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// The device info decoded by the last successful
    /// [`get_device_info`](Self::get_device_info).
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Batch length the next scan will accept unless overridden.
    pub fn expected_samples(&self) -> usize {
        self.device_info
            .as_ref()
            .map_or(self.config.expected_samples, |info| {
                info.rf_sample_count as usize
            })
    }

    fn link_mut(&mut self) -> Result<&mut Link<T>> {
        if self.scan.is_some() {
            return Err(SessionError::ScanInProgress);
        }
        match self.link.as_mut() {
            Some(link) if link.is_open() => Ok(link),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Reset the device.
    ///
    /// Returns `Ok(true)` iff the device answers with a `stat` response.
    /// No answer, a malformed answer or an answer of another type is
    /// `Ok(false)`; the device is left as it was. Errors are reserved for
    /// state violations and transport failures.
    pub fn initialize(&mut self) -> Result<bool> {
        let link = self.link_mut()?;
        let Some(message) = link.request(INITIALIZE)? else {
            warn!("no response to initialize");
            return Ok(false);
        };

        match parse_response(&message) {
            Ok(response) if response.is(STATUS) => {
                info!(info = %response.info, "device initialized");
                Ok(true)
            }
            Ok(response) => {
                warn!(
                    expected = STATUS,
                    received = %response.command_id,
                    "unexpected response to initialize, possibly stale traffic"
                );
                Ok(false)
            }
            Err(failure) => {
                warn!(%failure, raw = %message, "malformed response to initialize");
                Ok(false)
            }
        }
    }

    /// Query and decode hardware and RF parameters.
    ///
    /// On success the decoded sample count becomes the batch length for
    /// later scans. Failures leave the connection usable.
    pub fn get_device_info(&mut self) -> Result<DeviceInfo> {
        let link = self.link_mut()?;
        let message = link
            .request(GET_DEVICE_INFO)?
            .ok_or(SessionError::NoResponse {
                command: GET_DEVICE_INFO,
            })?;

        let response = parse_response(&message).map_err(|failure| SessionError::Malformed {
            command: GET_DEVICE_INFO,
            failure,
            raw: message.to_text(),
        })?;
        if !response.is(DEVICE_INFO) {
            return Err(SessionError::UnexpectedResponse {
                expected: DEVICE_INFO,
                received: response.command_id,
            });
        }

        let info = DeviceInfo::decode(&response.payload)?;
        debug!(?info, "decoded device info");
        self.device_info = Some(info.clone());
        Ok(info)
    }

    /// Send any command and return the raw framed answer, `None` if there
    /// was none within one read timeout.
    ///
    /// The answer is not parsed, so malformed responses stay observable.
    /// Used to probe for undocumented commands.
    pub fn arbitrary_command(&mut self, command: &str) -> Result<Option<RawMessage>> {
        let link = self.link_mut()?;
        let response = link.request(command)?;
        if let Some(message) = &response {
            debug!(command, response = %message, "arbitrary command answered");
        }
        Ok(response)
    }

    /// Start a continuous scan on a worker thread with default settings.
    pub fn start_scan<S: SampleSink + 'static>(&mut self, sink: S) -> Result<()> {
        self.start_scan_with(sink, ScanConfig::default())
    }

    /// Start a continuous scan on a worker thread.
    ///
    /// The transport moves to the worker until [`stop_scan`](Self::stop_scan).
    pub fn start_scan_with<S: SampleSink + 'static>(
        &mut self,
        sink: S,
        config: ScanConfig,
    ) -> Result<()> {
        self.link_mut()?;
        let expected = config
            .expected_samples
            .unwrap_or_else(|| self.expected_samples());
        let link = self.link.take().ok_or(SessionError::NotConnected)?;

        let handle = ScanController::new(link, sink, expected, config).spawn()?;
        self.scan = Some(handle);
        Ok(())
    }

    /// Whether the scan worker is still running.
    ///
    /// Turns false when the scan ends on its own (device silent, sink
    /// closed, protocol violation). The session stays in
    /// [`SessionState::Scanning`] until [`stop_scan`](Self::stop_scan)
    /// reaps the worker.
    pub fn is_scanning(&self) -> bool {
        self.scan.as_ref().is_some_and(|scan| !scan.is_finished())
    }

    /// Cancel the scan, wait for the worker and take back the transport.
    ///
    /// Returns within about one read timeout. If the worker closed the
    /// transport on exit the session ends up disconnected, otherwise
    /// connected.
    pub fn stop_scan(&mut self) -> Result<ScanReport> {
        let scan = self.scan.take().ok_or(SessionError::NotScanning)?;
        let (link, report) = scan.stop()?;

        if link.is_open() {
            self.link = Some(link);
        } else {
            debug!("scan released the transport");
        }
        Ok(report)
    }

    /// Close the transport, stopping any running scan first.
    ///
    /// Returns whether the transport reports closed afterwards. If it does
    /// not, the session stays connected so the caller can retry.
    pub fn disconnect(&mut self) -> bool {
        if self.scan.is_some() {
            if let Err(err) = self.stop_scan() {
                warn!(error = %err, "scan did not stop cleanly");
            }
        }

        let Some(mut link) = self.link.take() else {
            return true;
        };
        if let Err(err) = link.close() {
            warn!(error = %err, "error closing transport");
        }
        if link.is_open() {
            warn!("transport still open after close");
            self.link = Some(link);
            return false;
        }
        info!("disconnected");
        true
    }
}

impl<T: Transport + 'static> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(scan) = self.scan.take() {
            if let Err(err) = scan.stop() {
                warn!(error = %err, "scan did not stop cleanly on drop");
            }
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("transport", &self.link.as_ref().map(|l| l.transport().name()))
            .field("device_info", &self.device_info)
            .finish()
    }
}
