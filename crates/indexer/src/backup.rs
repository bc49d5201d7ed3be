use std::sync::atomic::{AtomicU64, Ordering};

/// Entry point of the backup pipeline.
pub trait BackupService: Send + Sync {
    /// Ask for a backup run; returns a status line for the requester.
    fn request_backup(&self) -> String;
}

/// Records backup requests without performing them.
#[derive(Debug, Default)]
pub struct RequestLog {
    requests: AtomicU64,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl BackupService for RequestLog {
    fn request_backup(&self) -> String {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("[backup] backup requested ({n} so far)");
        format!("backup requested (request #{n})")
    }
}
