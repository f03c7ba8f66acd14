use airview_session::command::is_streaming;

use crate::cmd::{connect, SendArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    check_command(&args.command)?;
    let mut session = connect(&args.connection)?;

    let response = session
        .arbitrary_command(&args.command)
        .map_err(|err| session_error("send failed", err))?;
    session.disconnect();

    match response {
        Some(response) => {
            print_response(&args.command, &response, format);
            Ok(SUCCESS)
        }
        None => Err(CliError::new(
            TIMEOUT,
            format!(
                "no response to {:?} within {}",
                args.command, args.connection.timeout
            ),
        )),
    }
}

/// Streaming commands answer with an unbounded stream that a single read
/// cannot end; `scan` handles those.
fn check_command(command: &str) -> CliResult<()> {
    if is_streaming(command) {
        return Err(CliError::new(
            USAGE,
            format!("{command:?} starts a continuous stream; use `airview scan` instead"),
        ));
    }
    Ok(())
}
