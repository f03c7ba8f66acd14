use airview_session::Session;
use airview_transport::Transport;
use tracing::warn;

use crate::cmd::{connect, InfoArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_device_info, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = connect(&args.connection)?;
    initialize(&mut session)?;

    let info = session
        .get_device_info()
        .map_err(|err| session_error("device info failed", err))?;
    print_device_info(&info, format);

    session.disconnect();
    Ok(SUCCESS)
}

/// Reset the device. A missing acknowledgement is logged, not fatal.
pub fn initialize<T: Transport + 'static>(session: &mut Session<T>) -> CliResult<()> {
    let acknowledged = session
        .initialize()
        .map_err(|err| session_error("initialize failed", err))?;
    if !acknowledged {
        warn!("device did not acknowledge initialization, continuing");
    }
    Ok(())
}
