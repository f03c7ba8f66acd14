use std::io;
use std::ops::ControlFlow;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use airview_session::{
    channel_sink, CancelToken, ScanConfig, ScanEnd, ScanReport, ScanSample, Session, SessionError,
};
use airview_transport::Transport;
use tracing::{debug, info, warn};

use crate::cmd::info::initialize;
use crate::cmd::{connect, install_ctrlc_handler, ScanArgs};
use crate::exit::{
    session_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS, TIMEOUT, TRANSPORT_ERROR,
};
use crate::output::{print_sample, OutputFormat};

const BATCH_BUFFER: usize = 256;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ScanArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.connection)?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    initialize(&mut session)?;
    load_device_info(&mut session)?;

    let report = stream(&mut session, args.count, args.samples, &cancel, |batch, sample| {
        emit(batch, &sample, format)
    })?;
    session.disconnect();

    exit_code(&report)
}

/// Print a batch, asking the scan to stop once stdout is unwritable.
fn emit(batch: u64, sample: &ScanSample, format: OutputFormat) -> ControlFlow<()> {
    match print_sample(batch, sample, format) {
        Ok(()) => ControlFlow::Continue(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("stdout closed, stopping scan");
            ControlFlow::Break(())
        }
        Err(err) => {
            warn!(error = %err, "failed to write batch, stopping scan");
            ControlFlow::Break(())
        }
    }
}

/// Fetch device info so the scan uses the device's batch length. Only
/// transport failures are fatal.
fn load_device_info<T: Transport + 'static>(session: &mut Session<T>) -> CliResult<()> {
    match session.get_device_info() {
        Ok(info) => {
            info!(
                samples = info.rf_sample_count,
                start_mhz = info.rf_start_mhz,
                end_mhz = info.rf_end_mhz,
                "device info loaded"
            );
            Ok(())
        }
        Err(err @ (SessionError::Transport(_) | SessionError::Frame(_))) => {
            Err(session_error("device info failed", err))
        }
        Err(err) => {
            warn!(
                error = %err,
                samples = session.expected_samples(),
                "device info unavailable, using default batch length"
            );
            Ok(())
        }
    }
}

/// Run a scan, handing each batch to `on_batch` with its 1-based number,
/// until `cancel` fires, `count` batches arrive, `on_batch` breaks or the
/// scan ends on its own. The scan is stopped, and `es` sent, on every exit.
fn stream<T, F>(
    session: &mut Session<T>,
    count: Option<u64>,
    samples: Option<usize>,
    cancel: &CancelToken,
    mut on_batch: F,
) -> CliResult<ScanReport>
where
    T: Transport + 'static,
    F: FnMut(u64, ScanSample) -> ControlFlow<()>,
{
    let (sink, batches) = channel_sink(BATCH_BUFFER);
    let config = ScanConfig {
        expected_samples: samples,
        ..ScanConfig::default()
    };
    session
        .start_scan_with(sink, config)
        .map_err(|err| session_error("scan failed to start", err))?;

    let mut received = 0u64;
    while !cancel.is_cancelled() && count.is_none_or(|count| received < count) {
        match batches.recv_timeout(POLL_INTERVAL) {
            Ok(sample) => {
                received += 1;
                if on_batch(received, sample).is_break() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) if session.is_scanning() => {}
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }

    let report = session
        .stop_scan()
        .map_err(|err| session_error("scan failed to stop", err))?;
    info!(
        end = ?report.end,
        delivered = report.delivered,
        dropped = report.dropped,
        overflowed = report.overflowed,
        ignored = report.ignored,
        "scan finished"
    );
    Ok(report)
}

fn exit_code(report: &ScanReport) -> CliResult<i32> {
    match &report.end {
        ScanEnd::ProtocolViolation(violation) => Err(CliError::new(
            DATA_INVALID,
            format!("scan stopped: {violation}"),
        )),
        ScanEnd::Transport(message) => Err(CliError::new(
            TRANSPORT_ERROR,
            format!("scan stopped: {message}"),
        )),
        ScanEnd::SinkPanicked => Err(CliError::new(INTERNAL, "scan output failed")),
        ScanEnd::DeviceSilent if report.delivered == 0 => {
            Err(CliError::new(TIMEOUT, "device sent no scan data"))
        }
        _ => Ok(SUCCESS),
    }
}
