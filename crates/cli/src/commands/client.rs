use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use backdex_protocol::codec::{read_message, write_message};
use backdex_protocol::{DaemonRequest, DaemonResponse};
use log::debug;

use crate::commands::CommandResult;

/// One-shot connections to the daemon's Unix socket.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Send `request` on a fresh connection and wait for the answer.
    ///
    /// A `DaemonResponse::Error` is turned into an `Err` so callers only
    /// match on the payload they asked for.
    pub fn call(&self, request: DaemonRequest) -> CommandResult<DaemonResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).with_context(|| {
            format!(
                "failed to connect to backdex daemon at {}",
                self.socket_path.display()
            )
        })?;

        debug!("[client] sending {request:?}");
        write_message(&mut stream, &request).context("failed to send request")?;
        let response: DaemonResponse =
            read_message(&mut stream).context("failed to read daemon response")?;

        match response {
            DaemonResponse::Error(msg) => Err(anyhow!("daemon error: {msg}")),
            other => Ok(other),
        }
    }
}

pub fn unexpected(response: DaemonResponse) -> anyhow::Error {
    anyhow!("unexpected daemon response: {response:?}")
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
