//! Upload progress shared between workers and whoever is watching.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// 0.0..=1.0; an empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Callback invoked after every task outcome.
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// `(completed, total)` counter.
///
/// Workers only ever call [`increment`](Self::increment); readers take a
/// [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe) to changes.
#[derive(Clone)]
pub struct ProgressTracker {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot {
            completed: 0,
            total,
        });
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
            tx: Arc::new(tx),
        }
    }

    /// Start over with a new total. Call before any worker runs.
    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.tx.send_replace(ProgressSnapshot {
            completed: 0,
            total,
        });
    }

    pub fn increment(&self) -> ProgressSnapshot {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);
        // Concurrent increments can publish out of order; never move backwards.
        self.tx.send_modify(|current| {
            current.completed = current.completed.max(completed);
            current.total = total;
        });
        ProgressSnapshot { completed, total }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}
