///! Export busy flag and progress counters

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Set while an export is in flight. Only one holder at a time.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when dropped, on every exit path.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if another export already holds the flag.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Progress of the current (or last) export run
#[derive(Debug, Default)]
pub struct ExportProgress {
    done: AtomicUsize,
    total: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time view for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStatus {
    pub busy: bool,
    pub done: usize,
    pub total: usize,
    pub last_error: Option<String>,
}

impl ExportProgress {
    pub fn start(&self, total: usize) {
        self.done.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
        if let Ok(mut err) = self.last_error.lock() {
            *err = None;
        }
    }

    pub fn advance(&self) {
        self.done.fetch_add(1, Ordering::AcqRel);
    }

    pub fn fail(&self, message: impl Into<String>) {
        if let Ok(mut err) = self.last_error.lock() {
            *err = Some(message.into());
        }
    }

    pub fn status(&self, busy: bool) -> ExportStatus {
        ExportStatus {
            busy,
            done: self.done.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
        }
    }
}
