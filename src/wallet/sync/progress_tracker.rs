//! Progress counters for account synchronization.
//!
//! A `WindowProgress` is shared by every batch task of one window and counts explorer requests
//! and what was written to storage. Once the window completes it is frozen into a
//! `WindowStats`; a pass aggregates its windows into `SyncStats`.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Live counters of one window.
#[derive(Debug, Default)]
pub struct WindowProgress {
    explorer_requests: AtomicUsize,
    transactions_received: AtomicUsize,
    blocks_written: AtomicUsize,
    transactions_written: AtomicUsize,
}

impl WindowProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one explorer round trip returning `transactions` transactions.
    pub fn record_request(&self, transactions: usize) {
        self.explorer_requests.fetch_add(1, Ordering::Relaxed);
        self.transactions_received
            .fetch_add(transactions, Ordering::Relaxed);
    }

    /// Record a block handed to storage.
    pub fn record_block(&self, transactions: usize) {
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        self.transactions_written
            .fetch_add(transactions, Ordering::Relaxed);
    }

    pub fn snapshot(&self, from: u32, to: u32) -> WindowStats {
        WindowStats {
            from,
            to,
            explorer_requests: self.explorer_requests.load(Ordering::Relaxed),
            transactions_received: self.transactions_received.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            transactions_written: self.transactions_written.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about one synchronized window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub from: u32,
    pub to: u32,
    pub explorer_requests: usize,
    pub transactions_received: usize,
    pub blocks_written: usize,
    pub transactions_written: usize,
}

impl WindowStats {
    /// Stats of a window that had nothing to do.
    pub fn empty(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            ..Default::default()
        }
    }
}

/// Statistics about a whole synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub tip_height: u32,
    pub stable: Option<WindowStats>,
    pub unstable: Option<WindowStats>,
    pub pending_transactions: usize,
}

impl SyncStats {
    pub fn explorer_requests(&self) -> usize {
        self.windows().map(|w| w.explorer_requests).sum()
    }

    pub fn blocks_written(&self) -> usize {
        self.windows().map(|w| w.blocks_written).sum()
    }

    fn windows(&self) -> impl Iterator<Item = &WindowStats> {
        self.stable.iter().chain(self.unstable.iter())
    }

    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        let describe = |name: &str, window: &Option<WindowStats>| match window {
            Some(w) => format!(
                "{} [{}, {}]: {} requests, {} blocks, {} transactions",
                name, w.from, w.to, w.explorer_requests, w.blocks_written, w.transactions_written
            ),
            None => format!("{}: skipped", name),
        };
        format!(
            "Sync to {}: {}; {}; {} pending transactions",
            self.tip_height,
            describe("stable", &self.stable),
            describe("unstable", &self.unstable),
            self.pending_transactions
        )
    }
}
