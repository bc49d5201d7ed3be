use std::{
    sync::atomic::{AtomicU8, Ordering},
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError};

const FREE: u8 = 0;

/// Work that needs the index to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Activity {
    Scan = 1,
    Sweep = 2,
}

impl Activity {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Activity::Scan),
            2 => Some(Activity::Sweep),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Activity::Scan => "scan",
            Activity::Sweep => "sweep",
        }
    }
}

/// Mutual exclusion between tree scans and index sweeps.
///
/// Claimed with a compare-and-swap; the returned [`ScanPermit`] frees the
/// guard when dropped, so release happens on early returns and unwinds too.
#[derive(Debug, Default)]
pub struct ScanGuard {
    state: AtomicU8,
}

#[must_use = "the guard is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct ScanPermit<'a> {
    guard: &'a ScanGuard,
    activity: Activity,
}

impl ScanPermit<'_> {
    pub fn activity(&self) -> Activity {
        self.activity
    }
}

impl Drop for ScanPermit<'_> {
    fn drop(&mut self) {
        self.guard.state.store(FREE, Ordering::Release);
    }
}

impl ScanGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, activity: Activity) -> Option<ScanPermit<'_>> {
        self.state
            .compare_exchange(FREE, activity as u8, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ScanPermit {
                guard: self,
                activity,
            })
    }

    /// Poll every `poll` until the guard is free, then claim it.
    pub fn acquire(&self, activity: Activity, poll: Duration) -> ScanPermit<'_> {
        loop {
            if let Some(permit) = self.try_acquire(activity) {
                return permit;
            }
            std::thread::sleep(poll);
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up with `None` once `stop`
    /// delivers a message or its senders are gone.
    pub fn acquire_or_stop(
        &self,
        activity: Activity,
        poll: Duration,
        stop: &Receiver<()>,
    ) -> Option<ScanPermit<'_>> {
        loop {
            if let Some(permit) = self.try_acquire(activity) {
                return Some(permit);
            }
            match stop.recv_timeout(poll) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Which activity holds the guard right now, if any.
    pub fn holder(&self) -> Option<Activity> {
        Activity::from_u8(self.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
