use backdex_protocol::{DaemonRequest, DaemonResponse};

use crate::commands::CommandResult;
use crate::commands::browse::PathArgs;
use crate::commands::client::{DaemonClient, unexpected};
use crate::printer::Printer;

pub fn backup(client: &DaemonClient, printer: &mut dyn Printer) -> CommandResult<()> {
    match client.call(DaemonRequest::Backup)? {
        DaemonResponse::Backup(status) => Ok(printer.message(&status)?),
        other => Err(unexpected(other)),
    }
}

/// Rescans block until the daemon's guard is free, which can take as long
/// as a full scan already in progress.
pub fn rescan(client: &DaemonClient, printer: &mut dyn Printer, args: &PathArgs) -> CommandResult<()> {
    let path = args.index_key()?;
    match client.call(DaemonRequest::Rescan { path })? {
        DaemonResponse::Rescan(summary) => Ok(printer.rescan(&summary)?),
        other => Err(unexpected(other)),
    }
}

pub fn status(client: &DaemonClient, printer: &mut dyn Printer) -> CommandResult<()> {
    match client.call(DaemonRequest::Status)? {
        DaemonResponse::Status(status) => Ok(printer.status(&status)?),
        other => Err(unexpected(other)),
    }
}
