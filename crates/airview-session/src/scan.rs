use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use airview_frame::parse_response;
use airview_transport::Transport;
use tracing::{debug, error, info, warn};

use crate::command::{BEGIN_SCAN, END_SCAN, SCAN};
use crate::error::{Result, SessionError};
use crate::link::Link;
use crate::sample::{ProtocolViolation, SampleSink, ScanSample, SinkStatus};

/// Cooperative cancellation flag shared with a scan worker.
///
/// Checked once per loop iteration before each blocking read, so a scan
/// notices cancellation within one read timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-scan settings.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Batch length to accept. Default: the session's device-reported
    /// sample count, else 173.
    pub expected_samples: Option<usize>,
    /// Close the transport once the scan ends. Default: true.
    ///
    /// When false, unread input is discarded instead and the session stays
    /// connected.
    pub close_on_finish: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            expected_samples: None,
            close_on_finish: true,
        }
    }
}

/// Why a scan stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEnd {
    /// Cancellation was requested.
    Cancelled,
    /// A read timed out without a complete message.
    DeviceSilent,
    /// The sink reported that its consumer is gone.
    SinkClosed,
    /// A `scan` payload held a non-numeric token.
    ProtocolViolation(ProtocolViolation),
    /// The transport failed.
    Transport(String),
    /// The sink panicked.
    SinkPanicked,
}

impl ScanEnd {
    /// Whether the scan stopped because something went wrong.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation(_) | Self::Transport(_) | Self::SinkPanicked
        )
    }
}

/// Summary of a finished scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub end: ScanEnd,
    /// Batch length that was accepted.
    pub expected_samples: usize,
    /// Batches handed to the sink.
    pub delivered: u64,
    /// `scan` batches of the wrong length.
    pub dropped: u64,
    /// Valid batches the sink had no room for.
    pub overflowed: u64,
    /// Messages that were not `scan` responses.
    pub ignored: u64,
    /// Whether the end-scan command reached the transport.
    pub end_scan_sent: bool,
    /// Whether the transport was closed during cleanup.
    pub transport_closed: bool,
}

/// Runs the continuous-scan protocol over a link.
///
/// Sends the begin-scan command, then frames, parses and validates
/// streamed batches until cancelled, the device goes silent, the sink
/// closes, or the stream breaks. Cleanup runs exactly once on every exit
/// path: the end-scan command is sent, then the transport is closed (or its
/// input discarded, see [`ScanConfig::close_on_finish`]).
pub struct ScanController<T, S> {
    link: Link<T>,
    sink: S,
    expected_samples: usize,
    config: ScanConfig,
    cancel: CancelToken,
}

impl<T: Transport, S: SampleSink> ScanController<T, S> {
    pub fn new(link: Link<T>, sink: S, expected_samples: usize, config: ScanConfig) -> Self {
        Self {
            link,
            sink,
            expected_samples,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops this scan.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the scan on the current thread until it ends.
    pub fn run(mut self) -> (Link<T>, ScanReport) {
        let mut report = ScanReport {
            end: ScanEnd::Cancelled,
            expected_samples: self.expected_samples,
            delivered: 0,
            dropped: 0,
            overflowed: 0,
            ignored: 0,
            end_scan_sent: false,
            transport_closed: false,
        };

        info!(
            transport = self.link.transport().name(),
            expected_samples = self.expected_samples,
            "scan started"
        );
        report.end = match catch_unwind(AssertUnwindSafe(|| self.stream(&mut report))) {
            Ok(end) => end,
            Err(_) => {
                error!("sink panicked, ending scan");
                ScanEnd::SinkPanicked
            }
        };
        self.finish(&mut report);

        info!(
            end = ?report.end,
            delivered = report.delivered,
            dropped = report.dropped,
            overflowed = report.overflowed,
            ignored = report.ignored,
            "scan ended"
        );
        (self.link, report)
    }

    fn stream(&mut self, report: &mut ScanReport) -> ScanEnd {
        if let Err(err) = self.link.send(BEGIN_SCAN) {
            error!(error = %err, "failed to send begin-scan command");
            return ScanEnd::Transport(err.to_string());
        }

        loop {
            if self.cancel.is_cancelled() {
                debug!("scan cancelled");
                return ScanEnd::Cancelled;
            }

            let message = match self.link.read() {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("no complete message within read timeout, device went silent");
                    return ScanEnd::DeviceSilent;
                }
                Err(err) => {
                    error!(error = %err, "transport failed during scan");
                    return ScanEnd::Transport(err.to_string());
                }
            };

            let response = match parse_response(&message) {
                Ok(response) => response,
                Err(failure) => {
                    debug!(%failure, raw = %message, "ignoring unparseable message during scan");
                    report.ignored += 1;
                    continue;
                }
            };
            if !response.is(SCAN) {
                debug!(command_id = %response.command_id, "ignoring non-scan response during scan");
                report.ignored += 1;
                continue;
            }

            let sample = match ScanSample::decode(&response.payload) {
                Ok(sample) => sample,
                Err(violation) => {
                    error!(%violation, "scan stream violated the protocol");
                    return ScanEnd::ProtocolViolation(violation);
                }
            };
            if sample.len() != self.expected_samples {
                debug!(
                    len = sample.len(),
                    expected = self.expected_samples,
                    "dropping batch with unexpected length"
                );
                report.dropped += 1;
                continue;
            }

            match self.sink.deliver(sample) {
                SinkStatus::Accepted => report.delivered += 1,
                SinkStatus::Full => {
                    debug!("sink full, dropping batch");
                    report.overflowed += 1;
                }
                SinkStatus::Closed => {
                    debug!("sink closed");
                    return ScanEnd::SinkClosed;
                }
            }
        }
    }

    fn finish(&mut self, report: &mut ScanReport) {
        match self.link.send(END_SCAN) {
            Ok(()) => report.end_scan_sent = true,
            Err(err) => warn!(error = %err, "failed to send end-scan command"),
        }

        if self.config.close_on_finish {
            if let Err(err) = self.link.close() {
                warn!(error = %err, "failed to close transport after scan");
            }
            report.transport_closed = !self.link.is_open();
        } else if let Err(err) = self.link.discard_input() {
            warn!(error = %err, "failed to discard input after scan");
        }
    }
}

impl<T, S> ScanController<T, S>
where
    T: Transport + 'static,
    S: SampleSink + 'static,
{
    /// Run the scan on a dedicated worker thread.
    pub fn spawn(self) -> Result<ScanHandle<T>> {
        let cancel = self.cancel_token();
        let worker = std::thread::Builder::new()
            .name("airview-scan".to_string())
            .spawn(move || self.run())
            .map_err(SessionError::Spawn)?;
        Ok(ScanHandle { cancel, worker })
    }
}

/// Handle to a scan running on a worker thread.
pub struct ScanHandle<T> {
    cancel: CancelToken,
    worker: JoinHandle<(Link<T>, ScanReport)>,
}

impl<T> ScanHandle<T> {
    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker to exit and take back the link.
    pub fn join(self) -> Result<(Link<T>, ScanReport)> {
        self.worker
            .join()
            .map_err(|_| SessionError::WorkerPanicked)
    }

    /// Cancel and wait. Returns within about one read timeout.
    pub fn stop(self) -> Result<(Link<T>, ScanReport)> {
        self.cancel();
        self.join()
    }
}

impl<T> std::fmt::Debug for ScanHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.worker.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::RecvTimeoutError;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use airview_frame::LineConfig;
    use airview_transport::MockTransport;

    use super::*;
    use crate::sample::channel_sink;

    const EXPECTED: usize = 173;

    fn scan_line(n: usize) -> Vec<u8> {
        let values: Vec<String> = (0..n).map(|i| format!("-{}", 40 + i % 60)).collect();
        format!("scan|rssi,{}\n", values.join(" ")).into_bytes()
    }

    fn fast_link(mock: MockTransport) -> Link<MockTransport> {
        Link::new(
            mock,
            LineConfig {
                read_chunk_size: 4096,
            },
        )
    }

    #[test]
    fn delivers_full_batches_and_skips_everything_else() {
        let mock = MockTransport::new()
            .with_read(b"scan|x,1 2 3\n")
            .with_read(scan_line(EXPECTED))
            .with_read(b"stat|ok,ready\n")
            .with_read(b"line noise\n")
            .with_read(scan_line(EXPECTED));
        let handle = mock.handle();

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let delivered = Arc::clone(&delivered);
            move |sample: ScanSample| delivered.lock().unwrap().push(sample)
        };

        let controller =
            ScanController::new(fast_link(mock), sink, EXPECTED, ScanConfig::default());
        let (_link, report) = controller.run();

        assert_eq!(report.end, ScanEnd::DeviceSilent);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.ignored, 2);
        assert!(report.end_scan_sent);
        assert!(report.transport_closed);

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        let expected = ScanSample::decode(&scan_line(EXPECTED)[10..]).unwrap();
        assert_eq!(delivered[0], expected);
        assert_eq!(delivered[0].len(), EXPECTED);

        assert_eq!(handle.writes(), vec![b"bs\n".to_vec(), b"es\n".to_vec()]);
        assert!(!handle.is_open());
    }

    #[test]
    fn short_batch_is_never_delivered() {
        let mock = MockTransport::new().with_read(b"scan|x,1 2 3\n");
        let delivered = Arc::new(Mutex::new(0usize));
        let sink = {
            let delivered = Arc::clone(&delivered);
            move |_sample: ScanSample| *delivered.lock().unwrap() += 1
        };

        let (_link, report) =
            ScanController::new(fast_link(mock), sink, EXPECTED, ScanConfig::default()).run();

        assert_eq!(report.dropped, 1);
        assert_eq!(*delivered.lock().unwrap(), 0);
    }

    #[test]
    fn expected_length_follows_configuration() {
        let mock = MockTransport::new()
            .with_read(b"scan|x,1 2 3\n")
            .with_read(scan_line(EXPECTED));
        let (_link, report) =
            ScanController::new(fast_link(mock), |_s: ScanSample| {}, 3, ScanConfig::default())
                .run();

        assert_eq!(report.expected_samples, 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn non_numeric_token_ends_scan_with_cleanup() {
        let mock = MockTransport::new()
            .with_read(scan_line(EXPECTED))
            .with_read(b"scan|x,-90 oops -91\n")
            .with_read(scan_line(EXPECTED));
        let handle = mock.handle();

        let (_link, report) = ScanController::new(
            fast_link(mock),
            |_s: ScanSample| {},
            EXPECTED,
            ScanConfig::default(),
        )
        .run();

        assert_eq!(
            report.end,
            ScanEnd::ProtocolViolation(ProtocolViolation {
                token: "oops".to_string(),
                index: 1
            })
        );
        assert!(report.end.is_error());
        assert_eq!(report.delivered, 1);
        assert_eq!(handle.write_count(b"es\n"), 1);
        assert!(!handle.is_open());
    }

    #[test]
    fn cancellation_sends_end_scan_exactly_once() {
        for delay_ms in [0u64, 1, 5, 20, 60] {
            let mock = MockTransport::new()
                .with_stream(scan_line(EXPECTED), b"es\n")
                .with_read_delay(Duration::from_millis(1));
            let handle = mock.handle();
            let (sink, rx) = channel_sink(1024);

            let scan = ScanController::new(fast_link(mock), sink, EXPECTED, ScanConfig::default())
                .spawn()
                .unwrap();
            std::thread::sleep(Duration::from_millis(delay_ms));

            let started = Instant::now();
            let (_link, report) = scan.stop().unwrap();

            assert!(started.elapsed() < Duration::from_millis(500));
            assert_eq!(report.end, ScanEnd::Cancelled);
            assert_eq!(handle.write_count(b"bs\n"), 1);
            assert_eq!(handle.write_count(b"es\n"), 1);
            assert!(!handle.is_open());
            assert_eq!(rx.try_iter().count() as u64, report.delivered);
        }
    }

    #[test]
    fn worker_streams_until_cancelled() {
        let mock = MockTransport::new()
            .with_stream(scan_line(EXPECTED), b"es\n")
            .with_read_delay(Duration::from_millis(1));
        let (sink, rx) = channel_sink(16);

        let scan = ScanController::new(fast_link(mock), sink, EXPECTED, ScanConfig::default())
            .spawn()
            .unwrap();

        for _ in 0..3 {
            let sample = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("batch should arrive");
            assert_eq!(sample.len(), EXPECTED);
        }
        assert!(!scan.is_finished());

        let (_link, report) = scan.stop().unwrap();
        assert_eq!(report.end, ScanEnd::Cancelled);
        assert!(report.delivered >= 3);
    }

    #[test]
    fn dropped_receiver_ends_scan() {
        let mock = MockTransport::new().with_stream(scan_line(EXPECTED), b"es\n");
        let handle = mock.handle();
        let (sink, rx) = channel_sink(1);
        drop(rx);

        let (_link, report) =
            ScanController::new(fast_link(mock), sink, EXPECTED, ScanConfig::default()).run();

        assert_eq!(report.end, ScanEnd::SinkClosed);
        assert_eq!(handle.write_count(b"es\n"), 1);
    }

    #[test]
    fn full_sink_counts_overflow() {
        let mock = MockTransport::new()
            .with_read(scan_line(EXPECTED))
            .with_read(scan_line(EXPECTED))
            .with_read(scan_line(EXPECTED));
        let (sink, rx) = channel_sink(1);

        let (_link, report) =
            ScanController::new(fast_link(mock), sink, EXPECTED, ScanConfig::default()).run();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.overflowed, 2);
        assert_eq!(rx.try_iter().count(), 1);
        assert!(matches!(rx.recv_timeout(Duration::ZERO), Err(RecvTimeoutError::Disconnected)));
    }

    #[test]
    fn keeps_transport_open_when_configured() {
        let mock = MockTransport::new().with_read(scan_line(EXPECTED));
        let handle = mock.handle();
        let config = ScanConfig {
            close_on_finish: false,
            ..ScanConfig::default()
        };

        let (link, report) =
            ScanController::new(fast_link(mock), |_s: ScanSample| {}, EXPECTED, config).run();

        assert!(report.end_scan_sent);
        assert!(!report.transport_closed);
        assert!(link.is_open());
        assert_eq!(handle.input_flushes(), 1);
    }

    #[test]
    fn failed_begin_scan_still_attempts_cleanup() {
        let mut mock = MockTransport::new();
        airview_transport::Transport::close(&mut mock).unwrap();
        let handle = mock.handle();

        let (_link, report) = ScanController::new(
            fast_link(mock),
            |_s: ScanSample| {},
            EXPECTED,
            ScanConfig::default(),
        )
        .run();

        assert!(matches!(report.end, ScanEnd::Transport(_)));
        assert!(!report.end_scan_sent);
        assert!(handle.writes().is_empty());
    }

    #[test]
    fn panicking_sink_still_ends_scan() {
        let mock = MockTransport::new().with_read(scan_line(EXPECTED));
        let handle = mock.handle();

        let (_link, report) = ScanController::new(
            fast_link(mock),
            |_s: ScanSample| panic!("sink failure"),
            EXPECTED,
            ScanConfig::default(),
        )
        .run();

        assert_eq!(report.end, ScanEnd::SinkPanicked);
        assert_eq!(handle.write_count(b"es\n"), 1);
        assert!(!handle.is_open());
    }
}
