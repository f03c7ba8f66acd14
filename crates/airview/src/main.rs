mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "airview", version, about = "Airview spectrum analyzer CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scan_subcommand() {
        let cli = Cli::try_parse_from([
            "airview",
            "scan",
            "/dev/ttyACM0",
            "--count",
            "5",
            "--timeout",
            "250ms",
        ])
        .expect("scan args should parse");

        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.count, Some(5));
                assert_eq!(args.connection.timeout, "250ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from(["airview", "send", "/dev/ttyACM0", "gdi"])
            .expect("send args should parse");
        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn probe_length_defaults_to_six() {
        let cli = Cli::try_parse_from(["airview", "probe", "/dev/ttyACM0"])
            .expect("probe args should parse");
        match cli.command {
            Command::Probe(args) => assert_eq!(args.length, 6),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "airview",
            "info",
            "/dev/ttyACM0",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Debug));
    }

    #[test]
    fn send_requires_command() {
        let err = Cli::try_parse_from(["airview", "send", "/dev/ttyACM0"])
            .expect_err("missing command should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
