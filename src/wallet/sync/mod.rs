//! Account Synchronization Module
//!
//! This module provides the core logic for discovering an account's transaction history through
//! a remote explorer and persisting it block by block. It is composed of several submodules:
//!
//! - `account_synchronizer`: The entry point. Splits a pass into stable and unstable windows and refreshes pending transactions.
//! - `blocks_synchronizer`: Address batch discovery over one height window, including gap discovery and truncated responses.
//! - `batch`: Address batches and their initial partition.
//! - `completion_tracker`: Per-height reference counts of in-flight batches, deciding when a height is complete.
//! - `partial_blocks`: In-memory accumulator of transactions for heights not yet complete.
//! - `repositories`: Block, checkpoint and pending transaction stores.
//! - `events`: Event types and handlers for observing a pass.
//! - `progress_tracker`: Counters and statistics of a pass.

/// Entry point coordinating a synchronization pass
pub mod account_synchronizer;
/// Address batches
pub mod batch;
/// Batch discovery over one height window
pub mod blocks_synchronizer;
/// Per-height completion tracking
pub mod completion_tracker;
/// Event system for observing synchronization
pub mod events;
/// Accumulator of incomplete heights
pub mod partial_blocks;
/// Synchronization statistics
pub mod progress_tracker;
/// Persistence of synchronized blocks
pub mod repositories;

pub use account_synchronizer::{AccountStorage, AccountSynchronizer, SyncHandle};
pub use blocks_synchronizer::BlocksSynchronizer;
pub use events::{EventDispatcher, LoggingEventHandler, SyncEvent, SyncEventHandler, WindowKind};
pub use progress_tracker::{SyncStats, WindowStats};
pub use repositories::{
    BlockchainDatabase, CheckpointRepository, FileBlockchainDatabase, FileCheckpointRepository,
    InMemoryBlockchainDatabase, InMemoryCheckpointRepository, InMemoryPendingTransactions,
    PendingTransactionDatabase, StableCheckpoint,
};
