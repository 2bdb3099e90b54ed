//! Event system for account synchronization.
//!
//! This module defines the events emitted while an account synchronizes, the handler trait and
//! the dispatcher fanning events out to registered handlers. Events let callers observe
//! progress (finalized blocks, completed windows, pending transactions) without coupling to the
//! synchronizer internals.
//!
//! Events are dispatched synchronously from the task that produced them, so handlers must be
//! quick and must not block.

use crate::wallet::WalletSyncError;

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which database a window writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Heights deep enough to be final.
    Stable,
    /// Recent heights, rebuilt on every pass.
    Unstable,
}

/// Events that occur during account synchronization
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A pass started against the given explorer tip
    SyncStarted { tip_height: u32 },
    /// Every batch touching a height reported back and its transactions were stored
    BlockFinalized {
        window: WindowKind,
        height: u32,
        transaction_count: usize,
    },
    /// A window finished
    WindowCompleted {
        window: WindowKind,
        from: u32,
        to: u32,
        blocks_written: usize,
    },
    /// The pending transaction set was refreshed
    PendingTransactionsUpdated { count: usize },
    /// The pass completed
    SyncCompleted { tip_height: u32 },
    /// The pass failed
    SyncFailed { error: String },
}

/// Trait for handling sync events.
///
/// Implementors receive all sync events and can perform side effects or state updates.
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    fn handle(&self, event: &SyncEvent) -> Result<(), WalletSyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// The dispatcher allows multiple handlers to be registered and ensures all are called for each event.
/// It is shared between every task of a pass and can gain handlers while a pass runs.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<Vec<Arc<dyn SyncEventHandler>>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new event handler.
    ///
    /// Handlers are called in the order they are registered.
    pub fn register_handler(&self, handler: Arc<dyn SyncEventHandler>) {
        debug!("Registering sync event handler {}", handler.name());
        self.handlers.write().push(handler);
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub fn dispatch(&self, event: &SyncEvent) {
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            if let Err(e) = handler.handle(event) {
                error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}

/// Handler writing every event to the log.
pub struct LoggingEventHandler;

impl SyncEventHandler for LoggingEventHandler {
    fn handle(&self, event: &SyncEvent) -> Result<(), WalletSyncError> {
        match event {
            SyncEvent::SyncStarted { tip_height } => {
                info!("Synchronization started, explorer tip at {}", tip_height)
            }
            SyncEvent::BlockFinalized {
                window,
                height,
                transaction_count,
            } => debug!(
                "{:?} block {} stored with {} transactions",
                window, height, transaction_count
            ),
            SyncEvent::WindowCompleted {
                window,
                from,
                to,
                blocks_written,
            } => info!(
                "{:?} window [{}, {}] synchronized, {} blocks written",
                window, from, to, blocks_written
            ),
            SyncEvent::PendingTransactionsUpdated { count } => {
                info!("{} pending transactions", count)
            }
            SyncEvent::SyncCompleted { tip_height } => {
                info!("Synchronization completed up to {}", tip_height)
            }
            SyncEvent::SyncFailed { error } => warn!("Synchronization failed: {}", error),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingEventHandler"
    }
}
