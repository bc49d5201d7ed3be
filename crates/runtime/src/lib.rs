mod config;
pub mod logging;

pub use config::{
    DEFAULT_GUARD_POLL, DEFAULT_LISTEN_ADDR, DEFAULT_SCAN_INTERVAL, DEFAULT_SWEEP_INTERVAL,
    INDEX_DIR_NAME, LIST_PAGE_SIZE, PROGRAM_LOG_LEVEL, PROGRAM_NAME, PROGRESS_LOG_INTERVAL,
    SEARCH_PAGE_SIZE, SWEEP_PAGE_SIZE, backdex_dir, default_index_path, default_scan_root,
    default_socket_path, default_workers,
};

pub use logging::init;
