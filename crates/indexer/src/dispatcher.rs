use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use backdex_engine::{IndexStore, StoreError, UpsertOutcome};
use backdex_fs::Snapshot;
use backdex_protocol::{FilePage, SearchResult};
use backdex_runtime::LIST_PAGE_SIZE;
use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use crate::backup::BackupService;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is shut down")]
    Closed,

    #[error("command was dropped before it was handled")]
    Dropped,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One-shot reply handle. Sending consumes it.
///
/// A handle built with [`Reply::or_else`] answers with its fallback when it
/// is dropped unsent, so a requester counting replies is never left waiting
/// on a command that was discarded or whose handler panicked.
pub struct Reply<T> {
    sender: Option<Sender<T>>,
    unanswered: Option<fn() -> T>,
}

impl<T> Reply<T> {
    /// A reply handle and the receiver its single answer arrives on.
    pub fn channel() -> (Self, Receiver<T>) {
        let (tx, rx) = channel::bounded(1);
        (Self::to(tx), rx)
    }

    /// Reply onto an existing channel, e.g. one shared by many requests.
    pub fn to(sender: Sender<T>) -> Self {
        Self {
            sender: Some(sender),
            unanswered: None,
        }
    }

    /// Like [`Reply::to`], but a handle dropped unsent delivers
    /// `unanswered()` instead.
    pub fn or_else(sender: Sender<T>, unanswered: fn() -> T) -> Self {
        Self {
            sender: Some(sender),
            unanswered: Some(unanswered),
        }
    }

    pub fn send(mut self, value: T) {
        if let Some(sender) = self.sender.take()
            && sender.send(value).is_err()
        {
            log::debug!("[dispatch] requester went away before its reply");
        }
    }
}

impl<T> Drop for Reply<T> {
    fn drop(&mut self) {
        if let (Some(sender), Some(unanswered)) = (self.sender.take(), self.unanswered) {
            log::debug!("[dispatch] reply dropped unsent");
            let _ = sender.send(unanswered());
        }
    }
}

impl<T> std::fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("sent", &self.sender.is_none())
            .field("has_fallback", &self.unanswered.is_some())
            .finish()
    }
}

pub type UpsertAck = Result<UpsertOutcome, DispatchError>;

pub enum Command {
    ListFiles {
        page: usize,
        reply: Reply<Result<FilePage, StoreError>>,
    },
    SearchFiles {
        query: String,
        page: usize,
        reply: Reply<Result<SearchResult, StoreError>>,
    },
    BackupFile {
        reply: Reply<String>,
    },
    UpdateFileInfo {
        snapshot: Snapshot,
        reply: Reply<UpsertAck>,
    },
}

impl Command {
    fn kind(&self) -> &'static str {
        match self {
            Command::ListFiles { .. } => "list_files",
            Command::SearchFiles { .. } => "search_files",
            Command::BackupFile { .. } => "backup_file",
            Command::UpdateFileInfo { .. } => "update_file_info",
        }
    }
}

/// What the workers run commands against.
#[derive(Clone)]
pub struct Handlers {
    pub store: Arc<IndexStore>,
    pub backup: Arc<dyn BackupService>,
}

impl Handlers {
    fn handle(&self, cmd: Command) {
        match cmd {
            Command::ListFiles { page, reply } => {
                reply.send(self.store.list_paged(page, LIST_PAGE_SIZE));
            }
            Command::SearchFiles { query, page, reply } => {
                reply.send(self.store.search(&query, page));
            }
            Command::BackupFile { reply } => {
                reply.send(self.backup.request_backup());
            }
            Command::UpdateFileInfo { snapshot, reply } => {
                let ack = self.store.upsert(&snapshot);
                if let Err(err) = &ack {
                    log::warn!("[dispatch] update of {} failed: {err}", snapshot.path);
                }
                reply.send(ack.map_err(DispatchError::from));
            }
        }
    }
}

/// Cheap, clonable producer side of the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    commands: Sender<Command>,
    closed: Arc<AtomicBool>,
}

impl DispatcherHandle {
    /// Queue `cmd`. Never blocks on handler execution.
    pub fn submit(&self, cmd: Command) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Closed);
        }
        self.commands.send(cmd).map_err(|_| DispatchError::Closed)
    }

    /// Submit a command built around a fresh reply handle and wait for the
    /// answer.
    pub fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, DispatchError> {
        let (reply, rx) = Reply::channel();
        self.submit(make(reply))?;
        // a dropped reply means the command was discarded during shutdown
        rx.recv().map_err(|_| DispatchError::Closed)
    }

    pub fn list_files(&self, page: usize) -> Result<FilePage, DispatchError> {
        Ok(self.request(|reply| Command::ListFiles { page, reply })??)
    }

    pub fn search_files(&self, query: &str, page: usize) -> Result<SearchResult, DispatchError> {
        let query = query.to_string();
        Ok(self.request(|reply| Command::SearchFiles { query, page, reply })??)
    }

    pub fn backup_file(&self) -> Result<String, DispatchError> {
        self.request(|reply| Command::BackupFile { reply })
    }

    pub fn update_file_info(&self, snapshot: Snapshot) -> Result<UpsertOutcome, DispatchError> {
        Ok(self.request(|reply| Command::UpdateFileInfo { snapshot, reply })??)
    }
}

/// Single consumer that admits commands in arrival order and hands each to
/// a fixed pool of handler workers.
pub struct Dispatcher {
    handle: DispatcherHandle,
    stop: Sender<()>,
    consumer: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn start(handlers: Handlers, workers: usize) -> Self {
        let (cmd_tx, cmd_rx) = channel::unbounded::<Command>();
        let (job_tx, job_rx) = channel::unbounded::<Command>();
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let workers = (0..workers.max(1))
            .map(|_| {
                let jobs = job_rx.clone();
                let handlers = handlers.clone();
                thread::spawn(move || run_worker(jobs, handlers))
            })
            .collect();
        drop(job_rx);

        let consumer = thread::spawn(move || run_consumer(cmd_rx, stop_rx, job_tx));

        Self {
            handle: DispatcherHandle {
                commands: cmd_tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            stop: stop_tx,
            consumer,
            workers,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop admitting, serve everything already admitted, and join the
    /// workers.
    pub fn shutdown(self) {
        self.handle.closed.store(true, Ordering::Release);
        let _ = self.stop.send(());

        if self.consumer.join().is_err() {
            log::error!("[dispatch] consumer thread panicked");
        }
        for worker in self.workers {
            if worker.join().is_err() {
                log::error!("[dispatch] handler worker panicked");
            }
        }
        log::info!("[dispatch] shut down");
    }
}

fn run_consumer(commands: Receiver<Command>, stop: Receiver<()>, jobs: Sender<Command>) {
    let admit = |cmd: Command| {
        log::trace!("[dispatch] admitting {}", cmd.kind());
        // workers outlive `jobs`, so this only fails if one panicked outside a handler
        let _ = jobs.send(cmd);
    };

    loop {
        crossbeam::select! {
            recv(commands) -> msg => match msg {
                Ok(cmd) => admit(cmd),
                Err(_) => break,
            },
            recv(stop) -> _ => {
                for cmd in commands.try_iter() {
                    admit(cmd);
                }
                break;
            }
        }
    }
}

fn run_worker(jobs: Receiver<Command>, handlers: Handlers) {
    for cmd in jobs.iter() {
        let kind = cmd.kind();
        if panic::catch_unwind(AssertUnwindSafe(|| handlers.handle(cmd))).is_err() {
            log::error!("[dispatch] {kind} handler panicked");
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
