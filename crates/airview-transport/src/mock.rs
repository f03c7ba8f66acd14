//! Scripted transport for deterministic protocol tests.
//!
//! [`MockTransport`] plays back pre-loaded reads, answers pre-loaded
//! request/response pairs, and can emit a continuous stream until a given
//! request is written. A cloned [`MockHandle`] observes the transport after
//! ownership has moved to another thread.
//!
//! # Example
//!
//! ```
//! use airview_transport::{MockTransport, Transport};
//!
//! let mut mock = MockTransport::new().respond(b"init\n", b"stat|ok,ready\n");
//! let handle = mock.handle();
//!
//! mock.write_all(b"init\n").unwrap();
//! let mut buf = [0u8; 64];
//! let n = mock.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"stat|ok,ready\n");
//! assert_eq!(handle.write_count(b"init\n"), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

#[derive(Debug)]
enum ReadStep {
    Data(Vec<u8>),
    Timeout,
}

#[derive(Debug)]
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

#[derive(Debug)]
struct Stream {
    chunk: Vec<u8>,
    stop_on: Vec<u8>,
    cursor: usize,
}

#[derive(Debug)]
struct MockState {
    reads: VecDeque<ReadStep>,
    expectations: VecDeque<Expectation>,
    stream: Option<Stream>,
    max_read: Option<usize>,
    read_delay: Duration,
    writes: Vec<Vec<u8>>,
    open: bool,
    sticky_close: bool,
    closes: usize,
    input_flushes: usize,
    reads_attempted: usize,
}

/// A [`Transport`] backed by an in-memory script.
///
/// When nothing is scripted, reads behave like an elapsed timeout and
/// return `Ok(0)`.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Shared view of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create an open mock with an empty script.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                reads: VecDeque::new(),
                expectations: VecDeque::new(),
                stream: None,
                max_read: None,
                read_delay: Duration::ZERO,
                writes: Vec::new(),
                open: true,
                sticky_close: false,
                closes: 0,
                input_flushes: 0,
                reads_attempted: 0,
            })),
        }
    }

    /// Queue bytes to be returned by upcoming reads.
    pub fn with_read(self, bytes: impl AsRef<[u8]>) -> Self {
        lock(&self.state)
            .reads
            .push_back(ReadStep::Data(bytes.as_ref().to_vec()));
        self
    }

    /// Queue one read that times out with no data.
    pub fn with_timeout(self) -> Self {
        lock(&self.state).reads.push_back(ReadStep::Timeout);
        self
    }

    /// When `request` is written, queue `response` for reading.
    ///
    /// Expectations are matched in order; a write that does not match the
    /// next expectation is recorded and otherwise ignored, like a device
    /// that does not know the command.
    pub fn respond(self, request: impl AsRef<[u8]>, response: impl AsRef<[u8]>) -> Self {
        lock(&self.state).expectations.push_back(Expectation {
            request: request.as_ref().to_vec(),
            response: response.as_ref().to_vec(),
        });
        self
    }

    /// Emit `chunk` repeatedly whenever the script is empty, until
    /// `stop_on` is written.
    pub fn with_stream(self, chunk: impl AsRef<[u8]>, stop_on: impl AsRef<[u8]>) -> Self {
        lock(&self.state).stream = Some(Stream {
            chunk: chunk.as_ref().to_vec(),
            stop_on: stop_on.as_ref().to_vec(),
            cursor: 0,
        });
        self
    }

    /// Cap the number of bytes a single read may return.
    pub fn with_max_read(self, max: usize) -> Self {
        lock(&self.state).max_read = Some(max.max(1));
        self
    }

    /// Sleep before serving each read, to pace streamed data.
    pub fn with_read_delay(self, delay: Duration) -> Self {
        lock(&self.state).read_delay = delay;
        self
    }

    /// Ignore `close` calls, like a port whose driver does not release it.
    pub fn with_sticky_close(self) -> Self {
        lock(&self.state).sticky_close = true;
        self
    }

    /// Shared handle for inspecting this transport later.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let delay = {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(TransportError::Closed);
            }
            state.reads_attempted += 1;
            state.read_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = lock(&self.state);
        let limit = state.max_read.map_or(buf.len(), |max| max.min(buf.len()));
        if limit == 0 {
            return Ok(0);
        }

        match state.reads.pop_front() {
            Some(ReadStep::Timeout) => Ok(0),
            Some(ReadStep::Data(mut bytes)) => {
                let n = limit.min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    state.reads.push_front(ReadStep::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            None => match state.stream.as_mut() {
                Some(stream) if !stream.chunk.is_empty() => {
                    let remaining = stream.chunk.len() - stream.cursor;
                    let n = limit.min(remaining);
                    buf[..n].copy_from_slice(&stream.chunk[stream.cursor..stream.cursor + n]);
                    stream.cursor = (stream.cursor + n) % stream.chunk.len();
                    Ok(n)
                }
                _ => Ok(0),
            },
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        state.writes.push(data.to_vec());

        if state
            .stream
            .as_ref()
            .is_some_and(|stream| stream.stop_on == data)
        {
            state.stream = None;
        }

        let matched = state
            .expectations
            .front()
            .is_some_and(|expected| expected.request == data);
        if matched {
            if let Some(expected) = state.expectations.pop_front() {
                state.reads.push_back(ReadStep::Data(expected.response));
            }
        }
        Ok(())
    }

    fn flush_input(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        state.input_flushes += 1;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        if !lock(&self.state).open {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.open && !state.sticky_close {
            state.open = false;
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl MockHandle {
    /// Every buffer written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// How many writes exactly equal `data`.
    pub fn write_count(&self, data: &[u8]) -> usize {
        lock(&self.state)
            .writes
            .iter()
            .filter(|w| w.as_slice() == data)
            .count()
    }

    /// Whether the transport is still open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// How many times the transport went from open to closed.
    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }

    /// How many reads were attempted while open.
    pub fn reads_attempted(&self) -> usize {
        lock(&self.state).reads_attempted
    }

    /// How many times the input buffer was flushed.
    pub fn input_flushes(&self) -> usize {
        lock(&self.state).input_flushes
    }

    /// Make later `close` calls take effect (`false`) or be ignored (`true`).
    pub fn set_sticky_close(&self, sticky: bool) {
        lock(&self.state).sticky_close = sticky;
    }

    /// Queue more bytes while the transport is owned elsewhere.
    pub fn push_read(&self, bytes: impl AsRef<[u8]>) {
        lock(&self.state)
            .reads
            .push_back(ReadStep::Data(bytes.as_ref().to_vec()));
    }
}
