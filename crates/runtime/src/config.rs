use std::{path::PathBuf, time::Duration};

pub const PROGRAM_NAME: &str = "backdex";
pub const PROGRAM_LOG_LEVEL: &str = "BACKDEX_LOG_LEVEL";
pub const INDEX_DIR_NAME: &str = "files.index";
pub const SOCKET_FILE_NAME: &str = "daemon.sock";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Pause between the end of one full scan and the start of the next.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(15);
/// Pause between consistency sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);
/// How often a waiting loop re-checks the scan guard.
pub const DEFAULT_GUARD_POLL: Duration = Duration::from_secs(1);

/// Scanner logs progress every this many acknowledged upserts.
pub const PROGRESS_LOG_INTERVAL: usize = 500;
/// Records fetched per page while sweeping the index.
pub const SWEEP_PAGE_SIZE: usize = 1000;
/// Records per page for `list_files`.
pub const LIST_PAGE_SIZE: usize = 1000;
/// Hits per page for `search_files`.
pub const SEARCH_PAGE_SIZE: usize = 10;

pub fn xdg_or_home(xdg_var: &str, home_suffix: &str) -> PathBuf {
    if let Some(dir) = std::env::var_os(xdg_var) {
        PathBuf::from(dir)
    } else {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_suffix)
    }
}

/// Default root for the watcher to keep indexed
pub fn default_scan_root() -> PathBuf {
    #[cfg(unix)]
    {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
    #[cfg(windows)]
    {
        std::env::var_os("USERPROFILE")
            .map(PathBuf::from)
            .or_else(|| {
                let drive = std::env::var_os("HOMEDRIVE")?;
                let path = std::env::var_os("HOMEPATH")?;
                Some(PathBuf::from(drive).join(path))
            })
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
    #[cfg(not(any(unix, windows)))]
    {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub fn backdex_dir() -> PathBuf {
    xdg_or_home("XDG_CACHE_HOME", ".cache").join(PROGRAM_NAME)
}

/// Default index directory (snapshot + journal live inside it)
pub fn default_index_path() -> PathBuf {
    backdex_dir().join(INDEX_DIR_NAME)
}

pub fn default_socket_path() -> PathBuf {
    backdex_dir().join(SOCKET_FILE_NAME)
}

/// Worker count used when the caller does not pick one.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
