//! Known protocol commands and response identifiers.

/// Reset the device. Answered with a [`STATUS`] response.
pub const INITIALIZE: &str = "init";
/// Query hardware and RF parameters. Answered with a [`DEVICE_INFO`] response.
pub const GET_DEVICE_INFO: &str = "gdi";
/// Begin continuous scanning. Answered with an unbounded stream of [`SCAN`] responses.
pub const BEGIN_SCAN: &str = "bs";
/// End continuous scanning. Produces no response of its own.
pub const END_SCAN: &str = "es";

/// Response id for [`INITIALIZE`].
pub const STATUS: &str = "stat";
/// Response id for [`GET_DEVICE_INFO`].
pub const DEVICE_INFO: &str = "devi";
/// Response id for each streamed batch after [`BEGIN_SCAN`].
pub const SCAN: &str = "scan";

/// RSSI readings per scan batch when the device has not reported its own count.
pub const DEFAULT_SAMPLE_COUNT: usize = 173;

/// Commands that start a stream instead of producing a single response.
pub const STREAMING_COMMANDS: &[&str] = &[BEGIN_SCAN];

/// Whether `command` starts a stream instead of producing a single response.
pub fn is_streaming(command: &str) -> bool {
    STREAMING_COMMANDS
        .iter()
        .any(|streaming| streaming.eq_ignore_ascii_case(command))
}
