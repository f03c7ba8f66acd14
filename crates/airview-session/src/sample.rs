use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use serde::Serialize;

/// One batch of RSSI readings, in scanned-frequency order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSample {
    pub rssi: Vec<i32>,
}

/// A `scan` payload token that is not an integer.
///
/// The stream framing is assumed broken when this happens, so the scan
/// stops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("non-numeric scan sample {token:?} at index {index}")]
pub struct ProtocolViolation {
    pub token: String,
    pub index: usize,
}

impl ScanSample {
    /// Decode a whitespace-separated `scan` payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolViolation> {
        let text = String::from_utf8_lossy(payload);
        let rssi = text
            .split_whitespace()
            .enumerate()
            .map(|(index, token)| {
                token.parse::<i32>().map_err(|_| ProtocolViolation {
                    token: token.to_string(),
                    index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rssi })
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.rssi.len()
    }

    /// Whether the batch has no readings.
    pub fn is_empty(&self) -> bool {
        self.rssi.is_empty()
    }
}

/// What a sink did with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// Batch taken; keep scanning.
    Accepted,
    /// No room for the batch; it is dropped and scanning continues.
    Full,
    /// The consumer is gone; scanning stops.
    Closed,
}

/// Receives validated scan batches.
///
/// Called on the scan worker thread. Blocking here delays the next read
/// from the device.
pub trait SampleSink: Send {
    fn deliver(&mut self, sample: ScanSample) -> SinkStatus;
}

impl<F> SampleSink for F
where
    F: FnMut(ScanSample) + Send,
{
    fn deliver(&mut self, sample: ScanSample) -> SinkStatus {
        self(sample);
        SinkStatus::Accepted
    }
}

/// Bounded-channel sink. See [`channel_sink`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: SyncSender<ScanSample>,
}

impl SampleSink for ChannelSink {
    fn deliver(&mut self, sample: ScanSample) -> SinkStatus {
        match self.tx.try_send(sample) {
            Ok(()) => SinkStatus::Accepted,
            Err(TrySendError::Full(_)) => SinkStatus::Full,
            Err(TrySendError::Disconnected(_)) => SinkStatus::Closed,
        }
    }
}

/// A sink that forwards batches into a channel holding up to `bound`
/// undelivered batches.
///
/// Batches that arrive while the channel is full are dropped so a slow
/// consumer never stalls the worker past a cancellation. Dropping the
/// receiver ends the scan.
pub fn channel_sink(bound: usize) -> (ChannelSink, Receiver<ScanSample>) {
    let (tx, rx) = sync_channel(bound);
    (ChannelSink { tx }, rx)
}
