use std::sync::{Arc, atomic::AtomicBool};

mod config;
mod http;
mod rpc;
mod state;

use anyhow::Context;
use backdex_engine::IndexStore;
use backdex_runtime::logging;
use config::DaemonConfig;
use http::HttpServer;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use state::DaemonState;

use log::{info, warn};

fn main() -> anyhow::Result<()> {
    logging::init().ok();

    let config = DaemonConfig::from_env()?;

    info!(
        "Starting backdex daemon: root={}, index={}, socket={}",
        config.root.display(),
        config.index_path.display(),
        config.socket_path.display(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    // Signal handlers only set the flag; the accept loops poll it.
    for sig in [SIGINT, SIGTERM] {
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("Failed to register signal handler for {sig}"))?;
    }

    let store = Arc::new(
        IndexStore::open(&config.index_path)
            .with_context(|| format!("Failed to open index at {}", config.index_path.display()))?,
    );
    let (state, dispatcher) = DaemonState::new(config, Arc::clone(&store))?;
    let state = Arc::new(state);

    let http = match state.config.listen {
        Some(addr) => Some(HttpServer::spawn(Arc::clone(&state), addr)?),
        None => None,
    };
    let watcher = state.spawn_watcher();

    let served = rpc::run_rpc_server(Arc::clone(&state), &shutdown);
    if let Err(err) = &served {
        warn!("RPC server stopped with an error: {err:#}");
    }

    info!("Shutting down");
    watcher.stop();
    if let Some(http) = http {
        http.stop();
    }
    dispatcher.shutdown();
    store
        .sync()
        .context("Failed to persist index on shutdown")?;

    served
}
