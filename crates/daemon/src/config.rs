use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use backdex_fs::{IgnoreEngine, IgnoreOptions, WalkErrorPolicy};
use backdex_runtime::{
    DEFAULT_GUARD_POLL, DEFAULT_LISTEN_ADDR, DEFAULT_SCAN_INTERVAL, DEFAULT_SWEEP_INTERVAL,
    default_index_path, default_scan_root, default_socket_path, default_workers,
};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnWalkError {
    /// Stop the whole scan at the first unreadable entry
    Abort,
    /// Log the entry and keep walking
    Skip,
}

impl From<OnWalkError> for WalkErrorPolicy {
    fn from(v: OnWalkError) -> Self {
        match v {
            OnWalkError::Abort => WalkErrorPolicy::Abort,
            OnWalkError::Skip => WalkErrorPolicy::Skip,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "backdex-daemon", about = "Keeps a backup-state index of a directory tree")]
pub struct Cli {
    /// Directory tree to keep indexed (defaults to $HOME)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Index directory (optional override)
    #[arg(long)]
    pub index_path: Option<PathBuf>,

    /// Path to Unix domain socket (optional override)
    #[arg(long)]
    pub socket_path: Option<PathBuf>,

    /// Address for the HTTP API
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: SocketAddr,

    /// Seconds between full scans
    #[arg(long, default_value_t = DEFAULT_SCAN_INTERVAL.as_secs())]
    pub scan_interval: u64,

    /// Seconds between index sweeps
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    pub sweep_interval: u64,

    /// How often a waiting scan or sweep re-checks the guard, in milliseconds
    #[arg(long, default_value_t = DEFAULT_GUARD_POLL.as_millis() as u64)]
    pub guard_poll_ms: u64,

    /// Deepest level scanned below the root (unlimited when omitted)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Cap on updates dispatched but not yet acknowledged during a scan
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Handler worker threads (defaults to available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum, default_value_t = OnWalkError::Abort)]
    pub on_walk_error: OnWalkError,

    /// Gitignore-style pattern to leave out of the index (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Serve the Unix socket only
    #[arg(long)]
    pub no_http: bool,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub root: PathBuf,
    pub index_path: PathBuf,
    pub socket_path: PathBuf,
    /// `None` disables the HTTP server
    pub listen: Option<SocketAddr>,
    pub scan_interval: Duration,
    pub sweep_interval: Duration,
    pub guard_poll: Duration,
    pub max_depth: usize,
    pub max_in_flight: Option<usize>,
    pub workers: usize,
    pub on_walk_error: WalkErrorPolicy,
    pub excludes: Vec<String>,
}

impl DaemonConfig {
    pub fn from_args(args: &Cli) -> Result<Self> {
        let root = args.root.clone().unwrap_or_else(default_scan_root);
        // index keys are absolute paths
        let root = root
            .canonicalize()
            .with_context(|| format!("Scan root {} is not accessible", root.display()))?;

        Ok(Self {
            root,
            index_path: args.index_path.clone().unwrap_or_else(default_index_path),
            socket_path: args.socket_path.clone().unwrap_or_else(default_socket_path),
            listen: (!args.no_http).then_some(args.listen),
            scan_interval: Duration::from_secs(args.scan_interval),
            sweep_interval: Duration::from_secs(args.sweep_interval),
            guard_poll: Duration::from_millis(args.guard_poll_ms.max(1)),
            max_depth: args.max_depth.unwrap_or(usize::MAX),
            max_in_flight: args.max_in_flight,
            workers: args.workers.unwrap_or_else(default_workers).max(1),
            on_walk_error: args.on_walk_error.into(),
            excludes: args.excludes.clone(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let args = Cli::parse();
        Self::from_args(&args)
    }

    /// The exclude matcher, or `None` when no patterns were given.
    pub fn ignore_engine(&self) -> Result<Option<Arc<IgnoreEngine>>> {
        if self.excludes.is_empty() {
            return Ok(None);
        }
        let engine = IgnoreEngine::new(
            &self.root,
            IgnoreOptions {
                patterns: self.excludes.clone(),
                ..IgnoreOptions::default()
            },
        )
        .context("Invalid --exclude pattern")?;
        Ok(Some(Arc::new(engine)))
    }

    /// The daemon's own files that live under the scan root. Indexing them
    /// would flag the index as changed after every compaction.
    pub fn private_paths(&self) -> Vec<PathBuf> {
        [&self.index_path, &self.socket_path]
            .into_iter()
            .map(|path| resolve(path))
            .filter(|path| path.starts_with(&self.root))
            .collect()
    }
}

/// Canonical form of `path`, or of its parent when `path` itself does not
/// exist yet (the socket before the server binds it).
fn resolve(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    match (path.parent().and_then(|dir| dir.canonicalize().ok()), path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
