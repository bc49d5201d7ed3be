mod backup;
mod dispatcher;
mod guard;
mod reconciler;
mod scanner;
mod watcher;

pub use backup::{BackupService, RequestLog};
pub use dispatcher::{
    Command, DispatchError, Dispatcher, DispatcherHandle, Handlers, Reply, UpsertAck,
};
pub use guard::{Activity, ScanGuard, ScanPermit};
pub use reconciler::{Reconciler, SweepReport};
pub use scanner::{ScanOptions, ScanReport, Scanner};
pub use watcher::{WatchConfig, Watcher};
