//! Account synchronizer and integration point for all sync services.
//!
//! This module defines the `AccountSynchronizer`, which coordinates one synchronization pass of
//! an account against the explorer:
//! - The **stable** window, from the stable checkpoint up to `tip - maxPossibleUnstableBlocks`,
//!   written to durable storage and never rescanned once passed.
//! - The **unstable** window, the trailing `maxPossibleUnstableBlocks` heights, rebuilt from
//!   scratch on every pass into a disposable store since those heights may still reorganize.
//! - Pending transactions, fetched for every known address once both windows are done.
//!
//! The unstable window starts once the stable one is done, so its batches cover every address
//! the stable window discovered.
//!
//! A pass is exposed as a shared handle. Asking for a pass while one is in flight returns the
//! handle of the running one.

use crate::explorer::{Explorer, ExplorerError};
use crate::network::{BlockLike, Network, TransactionLike};
use crate::wallet::WalletSyncError;
use crate::wallet::config::SynchronizerConfig;
use crate::wallet::keychain::Keychain;
use crate::wallet::sync::{
    blocks_synchronizer::BlocksSynchronizer,
    events::{EventDispatcher, SyncEvent, WindowKind},
    progress_tracker::{SyncStats, WindowStats},
    repositories::{
        BlockchainDatabase, CheckpointRepository, PendingTransactionDatabase, StableCheckpoint,
    },
};

use chrono::Utc;
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Completion handle of a synchronization pass. Cloneable; every clone resolves to the same outcome.
pub type SyncHandle = Shared<BoxFuture<'static, Result<SyncStats, Arc<WalletSyncError>>>>;

/// Stores written by a pass.
pub struct AccountStorage<N: Network> {
    /// Blocks below the unstable depth.
    pub stable: Arc<dyn BlockchainDatabase<N>>,
    /// Blocks of the trailing unstable window, cleared on every pass.
    pub unstable: Arc<dyn BlockchainDatabase<N>>,
    pub pending: Arc<dyn PendingTransactionDatabase<N>>,
    /// High-water mark of the stable window.
    pub checkpoints: Arc<dyn CheckpointRepository>,
}

/// Stable and unstable windows for a tip.
///
/// Returns the last stable height (`None` when the chain is shorter than the unstable depth) and
/// the first unstable height (`None` when the unstable depth is zero).
pub fn split_windows(tip_height: u32, max_unstable: u32) -> (Option<u32>, Option<u32>) {
    let stable_to = tip_height.checked_sub(max_unstable);
    let unstable_from = if max_unstable == 0 {
        None
    } else {
        Some(stable_to.map_or(0, |height| height + 1))
    };
    (stable_to, unstable_from)
}

/// Main account synchronizer coordinating the stable, unstable and pending steps.
pub struct AccountSynchronizer<N: Network> {
    context: Arc<SyncContext<N>>,
    current: Arc<Mutex<Option<SyncHandle>>>,
}

struct SyncContext<N: Network> {
    explorer: Arc<dyn Explorer<N>>,
    stable: BlocksSynchronizer<N>,
    unstable: BlocksSynchronizer<N>,
    pending_db: Arc<dyn PendingTransactionDatabase<N>>,
    checkpoints: Arc<dyn CheckpointRepository>,
    receive: Arc<dyn Keychain>,
    change: Arc<dyn Keychain>,
    events: Arc<EventDispatcher>,
    config: SynchronizerConfig,
}

impl<N: Network> AccountSynchronizer<N> {
    /// Create a new synchronizer for the account made of the `receive` and `change` chains.
    ///
    /// Fails if the configuration is invalid.
    pub fn new(
        explorer: Arc<dyn Explorer<N>>,
        storage: AccountStorage<N>,
        receive: Arc<dyn Keychain>,
        change: Arc<dyn Keychain>,
        events: Arc<EventDispatcher>,
        config: SynchronizerConfig,
    ) -> Result<Self, WalletSyncError> {
        config.validate()?;

        let stable = BlocksSynchronizer::new(
            Arc::clone(&explorer),
            Arc::clone(&receive),
            Arc::clone(&change),
            storage.stable,
            Arc::clone(&events),
            WindowKind::Stable,
            &config,
        );
        let unstable = BlocksSynchronizer::new(
            Arc::clone(&explorer),
            Arc::clone(&receive),
            Arc::clone(&change),
            storage.unstable,
            Arc::clone(&events),
            WindowKind::Unstable,
            &config,
        );

        Ok(Self {
            context: Arc::new(SyncContext {
                explorer,
                stable,
                unstable,
                pending_db: storage.pending,
                checkpoints: storage.checkpoints,
                receive,
                change,
                events,
                config,
            }),
            current: Arc::new(Mutex::new(None)),
        })
    }

    /// Start a synchronization pass, or join the one in flight.
    ///
    /// The pass runs when the returned handle is polled, on whatever executor polls it.
    pub fn synchronize(&self) -> SyncHandle {
        let mut current = self.current.lock();
        if let Some(handle) = current.as_ref() {
            debug!("Synchronization already in progress, joining it");
            return handle.clone();
        }

        let context = Arc::clone(&self.context);
        let slot: Weak<Mutex<Option<SyncHandle>>> = Arc::downgrade(&self.current);
        let handle = async move {
            let result = context.run().await.map_err(Arc::new);
            if let Some(slot) = slot.upgrade() {
                *slot.lock() = None;
            }
            result
        }
        .boxed()
        .shared();

        *current = Some(handle.clone());
        handle
    }

    pub fn is_synchronizing(&self) -> bool {
        self.current.lock().is_some()
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.context.events
    }

    /// Refresh the pending transaction store on its own, outside of a pass.
    pub async fn synchronize_pending_transactions(&self) -> Result<usize, WalletSyncError> {
        self.context.synchronize_pending_transactions().await
    }
}

impl<N: Network> SyncContext<N> {
    async fn run(&self) -> Result<SyncStats, WalletSyncError> {
        match self.synchronize_all().await {
            Ok(stats) => {
                self.events.dispatch(&SyncEvent::SyncCompleted {
                    tip_height: stats.tip_height,
                });
                Ok(stats)
            }
            Err(e) => {
                self.events.dispatch(&SyncEvent::SyncFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn synchronize_all(&self) -> Result<SyncStats, WalletSyncError> {
        let tip = self.explorer.get_current_block().await?;
        self.events.dispatch(&SyncEvent::SyncStarted {
            tip_height: tip.height(),
        });

        let (stable_to, unstable_from) =
            split_windows(tip.height(), self.config.max_possible_unstable_blocks);

        let stable = self.synchronize_stable(stable_to).await?;
        let unstable = self
            .synchronize_unstable(unstable_from, tip.height())
            .await?;

        let pending_transactions = self.synchronize_pending_transactions().await?;

        let stats = SyncStats {
            tip_height: tip.height(),
            stable,
            unstable,
            pending_transactions,
        };
        info!("{}", stats.summary());
        Ok(stats)
    }

    /// Resume the stable window right after the checkpoint and move the checkpoint to `stable_to`.
    ///
    /// Without a checkpoint the window restarts at the last stored stable block, inclusive, or at
    /// genesis.
    async fn synchronize_stable(
        &self,
        stable_to: Option<u32>,
    ) -> Result<Option<WindowStats>, WalletSyncError> {
        let Some(stable_to) = stable_to else {
            debug!("Chain shorter than the unstable depth, no stable window");
            return Ok(None);
        };

        let (start_hash, from) = match self.checkpoints.load().await? {
            Some(checkpoint) if checkpoint.height >= stable_to => {
                debug!(
                    "Stable window already synchronized through height {}",
                    checkpoint.height
                );
                return Ok(Some(WindowStats::empty(checkpoint.height + 1, stable_to)));
            }
            Some(checkpoint) => {
                let from = checkpoint.height + 1;
                (self.block_hash_at(from).await?, from)
            }
            None => match self.stable.blocks_db().last_block() {
                Some(last) => (last.hash().to_string(), last.height()),
                None => (self.config.genesis_block_hash.clone(), 0),
            },
        };

        let stats = self
            .stable
            .synchronize(Some(&start_hash), from, stable_to)
            .await?;

        self.checkpoints
            .save(&StableCheckpoint {
                height: stable_to,
                hash: self.block_hash_at(stable_to).await?,
                saved_at: Utc::now(),
            })
            .await?;
        Ok(Some(stats))
    }

    /// Rebuild the unstable window from scratch.
    async fn synchronize_unstable(
        &self,
        unstable_from: Option<u32>,
        tip_height: u32,
    ) -> Result<Option<WindowStats>, WalletSyncError> {
        let Some(from) = unstable_from else {
            return Ok(None);
        };

        self.unstable.blocks_db().clean_all().await?;
        let start_hash = self.block_hash_at(from).await?;

        let stats = self
            .unstable
            .synchronize(Some(&start_hash), from, tip_height)
            .await?;
        Ok(Some(stats))
    }

    async fn block_hash_at(&self, height: u32) -> Result<String, WalletSyncError> {
        if height == 0 {
            return Ok(self.config.genesis_block_hash.clone());
        }
        let block = self
            .explorer
            .get_block(height)
            .await?
            .ok_or_else(|| ExplorerError::BlockNotFound(format!("height {}", height)))?;
        Ok(block.hash().to_string())
    }

    /// Replace the pending store with the unconfirmed transactions of every used address and the
    /// gap after them.
    async fn synchronize_pending_transactions(&self) -> Result<usize, WalletSyncError> {
        let mut addresses = Vec::new();
        for keychain in [&self.receive, &self.change] {
            let count = keychain
                .used_address_count()
                .saturating_add(self.config.discovery_gap_size);
            addresses.extend(keychain.addresses_in_range(0, count));
        }

        let requests = addresses
            .chunks(self.config.max_number_of_addresses_in_request as usize)
            .map(|chunk| self.explorer.get_pending_transactions(chunk));
        let responses = future::try_join_all(requests).await?;

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for tx in responses.into_iter().flatten() {
            if tx.block().is_some() || !seen.insert(tx.hash().to_string()) {
                continue;
            }
            for address in tx.output_addresses() {
                if !self.receive.mark_used(address) {
                    self.change.mark_used(address);
                }
            }
            pending.push(tx);
        }

        let count = pending.len();
        self.pending_db.replace(pending).await?;
        self.events
            .dispatch(&SyncEvent::PendingTransactionsUpdated { count });
        Ok(count)
    }
}
