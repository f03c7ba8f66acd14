use std::time::Duration;

use airview_session::{CancelToken, Session, SessionConfig};
use airview_transport::SerialConfig;
use clap::{Args, Subcommand};

use crate::exit::{session_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod probe;
pub mod scan;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the device and print its hardware and RF parameters.
    Info(InfoArgs),
    /// Stream RSSI batches until Ctrl-C or --count batches.
    Scan(ScanArgs),
    /// Send one raw command and print the answer.
    Send(SendArgs),
    /// Try every [a-z] command up to a length and list the ones answered.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Scan(args) => scan::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Serial device path (e.g. /dev/ttyACM0).
    pub port: String,
    /// Read timeout per response (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Exit after receiving N batches.
    #[arg(long)]
    pub count: Option<u64>,
    /// Override the number of readings per batch reported by the device.
    #[arg(long)]
    pub samples: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Command name (letters and digits).
    pub command: String,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Longest command name to try.
    #[arg(long, default_value_t = 6)]
    pub length: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the serial device named by `args`.
pub fn connect(args: &ConnectionArgs) -> CliResult<Session> {
    let read_timeout = parse_duration(&args.timeout)?;
    let config = SessionConfig {
        serial: SerialConfig {
            read_timeout,
            ..SerialConfig::default()
        },
        ..SessionConfig::default()
    };

    let mut session: Session = Session::with_config(config);
    session
        .connect(&args.port)
        .map_err(|err| session_error("connect failed", err))?;
    Ok(session)
}

pub fn install_ctrlc_handler(cancel: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
