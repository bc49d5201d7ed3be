use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use backdex_indexer::DispatchError;
use backdex_protocol::codec::{read_message, write_message};
use backdex_protocol::{DaemonRequest, DaemonResponse};
use log::{debug, error, info};

use crate::state::DaemonState;

const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// RAII guard that ensures the Unix socket file is removed on shutdown,
/// even if we return early or panic.
struct SocketGuard<'a> {
    path: &'a Path,
}

impl Drop for SocketGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(self.path)
            && err.kind() != io::ErrorKind::NotFound
        {
            error!(
                "[rpc] failed to remove Unix socket at {} on shutdown: {err}",
                self.path.display()
            );
        }
    }
}

/// Serve socket clients until `shutdown` is set.
pub fn run_rpc_server(state: Arc<DaemonState>, shutdown: &AtomicBool) -> anyhow::Result<()> {
    let socket_path = &state.config.socket_path;

    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    // Clean up stale socket if it exists.
    if socket_path.exists() {
        fs::remove_file(socket_path).with_context(|| {
            format!(
                "Failed to remove existing socket at {}",
                socket_path.display()
            )
        })?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket at {}", socket_path.display()))?;
    listener
        .set_nonblocking(true)
        .context("Failed to make the socket listener non-blocking")?;

    let _socket_guard = SocketGuard {
        path: socket_path.as_path(),
    };

    info!("[rpc] listening on {}", socket_path.display());

    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    if let Err(err) = handle_client(stream, &state) {
                        error!("[rpc] error while handling client: {err:#}");
                    }
                });
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                error!("[rpc] accept error: {err}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    info!("[rpc] shutdown signal observed; socket closed");
    Ok(())
}

fn handle_client(mut stream: UnixStream, state: &DaemonState) -> anyhow::Result<()> {
    stream
        .set_nonblocking(false)
        .context("Failed to make client stream blocking")?;

    let request: DaemonRequest =
        read_message(&mut stream).context("Failed to read DaemonRequest")?;
    debug!("[rpc] received request: {request:?}");

    let response = answer(state, request);
    write_message(&mut stream, &response).context("Failed to write DaemonResponse")
}

fn dispatch_failure(err: DispatchError) -> DaemonResponse {
    DaemonResponse::Error(err.to_string())
}

pub fn answer(state: &DaemonState, request: DaemonRequest) -> DaemonResponse {
    match request {
        DaemonRequest::Ping => DaemonResponse::Pong,
        DaemonRequest::Status => DaemonResponse::Status(state.status()),
        DaemonRequest::ListFiles { page } => state
            .dispatcher
            .list_files(page)
            .map_or_else(dispatch_failure, DaemonResponse::Files),
        DaemonRequest::Search { query, page } => state
            .dispatcher
            .search_files(&query, page)
            .map_or_else(dispatch_failure, DaemonResponse::Search),
        DaemonRequest::Backup => state
            .dispatcher
            .backup_file()
            .map_or_else(dispatch_failure, DaemonResponse::Backup),
        DaemonRequest::GetFile { path } => match state.store.get(&path) {
            Ok(record) => DaemonResponse::File(record),
            Err(err) => DaemonResponse::Error(err.to_string()),
        },
        DaemonRequest::ListDir { path } => match state.store.directory_listing(&path) {
            Ok(listing) => DaemonResponse::Dir(listing),
            Err(err) => DaemonResponse::Error(err.to_string()),
        },
        DaemonRequest::Rescan { path } => match state.rescan(&path) {
            Ok(summary) => DaemonResponse::Rescan(summary),
            Err(err) => DaemonResponse::Error(format!("Rescan failed: {err:#}")),
        },
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
