use airview_session::{candidates, probe, CancelToken};

use crate::cmd::{connect, install_ctrlc_handler, ProbeArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_probe, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.length == 0 {
        return Err(CliError::new(USAGE, "--length must be at least 1"));
    }

    let mut session = connect(&args.connection)?;
    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let report = probe(&mut session, candidates(args.length), &cancel, |_, _| {})
        .map_err(|err| session_error("probe failed", err))?;
    session.disconnect();

    print_probe(&report, format);
    Ok(SUCCESS)
}
