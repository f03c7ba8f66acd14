//! Brute-force discovery of undocumented commands.
//!
//! [`candidates`] enumerates every lowercase command name up to a length,
//! and [`probe`] sends each one through [`Session::arbitrary_command`],
//! collecting the ones the device answers.

use airview_frame::{FrameError, RawMessage};
use airview_transport::Transport;
use tracing::{debug, info, warn};

use crate::command::is_streaming;
use crate::error::{Result, SessionError};
use crate::scan::CancelToken;
use crate::session::Session;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Iterator over `[a-z]` command names, shortest first, then
/// lexicographically. Streaming commands are skipped since their answer
/// is not a single response.
#[derive(Debug, Clone)]
pub struct Candidates {
    max_len: usize,
    digits: Vec<u8>,
}

/// Every `[a-z]` command name of length `1..=max_len`.
pub fn candidates(max_len: usize) -> Candidates {
    Candidates {
        max_len,
        digits: if max_len == 0 { Vec::new() } else { vec![0] },
    }
}

impl Candidates {
    fn current(&self) -> String {
        self.digits
            .iter()
            .map(|&d| char::from(ALPHABET[usize::from(d)]))
            .collect()
    }

    fn advance(&mut self) {
        for digit in self.digits.iter_mut().rev() {
            if usize::from(*digit) + 1 < ALPHABET.len() {
                *digit += 1;
                return;
            }
            *digit = 0;
        }
        // every position rolled over
        if self.digits.len() < self.max_len {
            self.digits = vec![0; self.digits.len() + 1];
        } else {
            self.digits.clear();
        }
    }
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while !self.digits.is_empty() {
            let name = self.current();
            self.advance();
            if !is_streaming(&name) {
                return Some(name);
            }
        }
        None
    }
}

/// Outcome of a [`probe`] run.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Commands sent.
    pub checked: u64,
    /// Commands that got an answer, with the raw answer.
    pub found: Vec<(String, RawMessage)>,
    /// Whether the run stopped on cancellation before exhausting the
    /// candidates.
    pub cancelled: bool,
}

/// Send each candidate and record which ones the device answers.
///
/// `on_found` is called as soon as a command answers. Cancellation is
/// checked between commands, so a cancelled run still returns everything
/// found so far. Candidates the encoder rejects are skipped; transport
/// failures end the run.
pub fn probe<T, I, F>(
    session: &mut Session<T>,
    candidates: I,
    cancel: &CancelToken,
    mut on_found: F,
) -> Result<ProbeReport>
where
    T: Transport + 'static,
    I: IntoIterator<Item = String>,
    F: FnMut(&str, &RawMessage),
{
    let mut report = ProbeReport::default();

    for command in candidates {
        if cancel.is_cancelled() {
            info!(checked = report.checked, "probe cancelled");
            report.cancelled = true;
            break;
        }
        if is_streaming(&command) {
            debug!(command = %command, "skipping streaming command");
            continue;
        }

        report.checked += 1;
        match session.arbitrary_command(&command) {
            Ok(Some(response)) => {
                info!(command = %command, %response, "command answered");
                on_found(&command, &response);
                report.found.push((command, response));
            }
            Ok(None) => {}
            Err(SessionError::Frame(err @ FrameError::InvalidCommand { .. })) => {
                warn!(error = %err, "skipping candidate");
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        checked = report.checked,
        found = report.found.len(),
        "probe finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use airview_transport::MockTransport;

    use super::*;

    #[test]
    fn enumerates_shortest_first() {
        let names: Vec<String> = candidates(2).take(28).collect();
        assert_eq!(names[0], "a");
        assert_eq!(names[25], "z");
        assert_eq!(names[26], "aa");
        assert_eq!(names[27], "ab");
    }

    #[test]
    fn covers_every_name_except_streaming() {
        let names: Vec<String> = candidates(2).collect();
        assert_eq!(names.len(), 26 + 26 * 26 - 1);
        assert!(!names.iter().any(|n| n == "bs"));
        assert_eq!(names.last().map(String::as_str), Some("zz"));
    }

    #[test]
    fn includes_maximum_length() {
        assert!(candidates(4).any(|n| n == "init"));
        assert!(candidates(3).any(|n| n == "gdi"));
        assert!(candidates(3).all(|n| n.len() <= 3));
    }

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(candidates(0).count(), 0);
    }

    #[test]
    fn probe_collects_answering_commands() {
        let mock = MockTransport::new()
            .respond(b"es\n", b"nothing here\n")
            .respond(b"gdi\n", b"devi|ok,USB123,1,2,3,4,5\n");
        let handle = mock.handle();
        let mut session = Session::with_transport(mock);

        let mut seen = Vec::new();
        let list = ["bs", "es", "foo", "gdi"].map(String::from);
        let report = probe(&mut session, list, &CancelToken::new(), |name, _| {
            seen.push(name.to_string());
        })
        .unwrap();

        assert_eq!(report.checked, 3);
        assert!(!report.cancelled);
        assert_eq!(seen, vec!["es", "gdi"]);
        assert_eq!(report.found[0].1.body(), b"nothing here");
        assert_eq!(handle.write_count(b"bs\n"), 0);
    }

    #[test]
    fn probe_stops_when_cancelled() {
        let mut session = Session::with_transport(MockTransport::new());
        let cancel = CancelToken::new();
        let mut calls = 0;

        let report = probe(&mut session, candidates(3), &cancel, |_, _| calls += 1).unwrap();
        assert_eq!(report.checked, 26 + 26 * 26 + 26 * 26 * 26 - 1);
        assert_eq!(calls, 0);

        cancel.cancel();
        let report = probe(&mut session, candidates(3), &cancel, |_, _| calls += 1).unwrap();
        assert_eq!(report.checked, 0);
        assert!(report.cancelled);
    }

    #[test]
    fn probe_skips_unencodable_candidates() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut session = Session::with_transport(mock);

        let list = ["bad name", "ok"].map(String::from);
        let report = probe(&mut session, list, &CancelToken::new(), |_, _| {}).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(handle.writes(), vec![b"ok\n".to_vec()]);
    }

    #[test]
    fn probe_fails_on_closed_transport() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut session = Session::with_transport(mock);
        session.disconnect();
        assert!(!handle.is_open());

        let err = probe(&mut session, candidates(1), &CancelToken::new(), |_, _| {}).unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }
}
