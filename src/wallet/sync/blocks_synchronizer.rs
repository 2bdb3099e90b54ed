//! Batch discovery of an account's transactions over one height window.
//!
//! Every address batch of both chains is queried against the explorer concurrently. A response
//! either retires the batch (nothing found), or spawns continuations: the rest of the window
//! when the explorer truncated its answer, and a wider gap batch when a gap batch found activity.
//! Heights are handed to storage by the batch that resolves them last, tracked by the
//! [`CompletionTracker`].

use crate::explorer::Explorer;
use crate::network::{BlockLike, Network, TransactionLike};
use crate::wallet::WalletSyncError;
use crate::wallet::config::SynchronizerConfig;
use crate::wallet::keychain::Keychain;
use crate::wallet::sync::batch::{AddressBatch, bootstrap};
use crate::wallet::sync::completion_tracker::CompletionTracker;
use crate::wallet::sync::events::{EventDispatcher, SyncEvent, WindowKind};
use crate::wallet::sync::partial_blocks::PartialBlockStore;
use crate::wallet::sync::progress_tracker::{WindowProgress, WindowStats};
use crate::wallet::sync::repositories::BlockchainDatabase;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use itertools::{Itertools, MinMaxResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synchronizes the receive and change chains of one account into one block database.
pub struct BlocksSynchronizer<N: Network> {
	explorer: Arc<dyn Explorer<N>>,
	receive: Arc<dyn Keychain>,
	change: Arc<dyn Keychain>,
	blocks_db: Arc<dyn BlockchainDatabase<N>>,
	events: Arc<EventDispatcher>,
	window: WindowKind,
	batch_size: u32,
	gap_size: u32,
	max_transaction_per_response: u32,
}

impl<N: Network> Clone for BlocksSynchronizer<N> {
	fn clone(&self) -> Self {
		Self {
			explorer: Arc::clone(&self.explorer),
			receive: Arc::clone(&self.receive),
			change: Arc::clone(&self.change),
			blocks_db: Arc::clone(&self.blocks_db),
			events: Arc::clone(&self.events),
			window: self.window,
			batch_size: self.batch_size,
			gap_size: self.gap_size,
			max_transaction_per_response: self.max_transaction_per_response,
		}
	}
}

impl<N: Network> BlocksSynchronizer<N> {
	pub fn new(
		explorer: Arc<dyn Explorer<N>>,
		receive: Arc<dyn Keychain>,
		change: Arc<dyn Keychain>,
		blocks_db: Arc<dyn BlockchainDatabase<N>>,
		events: Arc<EventDispatcher>,
		window: WindowKind,
		config: &SynchronizerConfig,
	) -> Self {
		Self {
			explorer,
			receive,
			change,
			blocks_db,
			events,
			window,
			batch_size: config.max_number_of_addresses_in_request,
			gap_size: config.discovery_gap_size,
			max_transaction_per_response: config.max_transaction_per_response,
		}
	}

	pub fn blocks_db(&self) -> &Arc<dyn BlockchainDatabase<N>> {
		&self.blocks_db
	}

	/// Discover every wallet transaction mined in `[from, to]` and store one block per height
	/// holding any.
	///
	/// `start_hash` is the hash of the block at `from`, `None` to let the explorer start at the
	/// beginning of the chain. Fails on the first explorer or protocol error; heights finalized
	/// before the failure stay stored and are flushed before the error is returned.
	pub async fn synchronize(
		&self,
		start_hash: Option<&str>,
		from: u32,
		to: u32,
	) -> Result<WindowStats, WalletSyncError> {
		if to < from {
			debug!("{:?} window [{}, {}] is empty", self.window, from, to);
			return Ok(WindowStats::empty(from, to));
		}

		info!(
			"Synchronizing {:?} window [{}, {}] from block {:?}",
			self.window, from, to, start_hash
		);

		let run = Arc::new(WindowRun {
			synchronizer: self.clone(),
			tracker: CompletionTracker::new(from, to),
			store: PartialBlockStore::new(),
			progress: WindowProgress::new(),
		});

		// Every bootstrap batch is registered before any request goes out.
		let mut tasks = Vec::new();
		for keychain in [&self.receive, &self.change] {
			for batch in bootstrap(keychain.as_ref(), self.batch_size, self.gap_size) {
				tasks.push(run.create_batch_task(
					Arc::clone(keychain),
					batch,
					start_hash.map(str::to_string),
					from,
					to,
				));
			}
		}
		let joined = future::try_join_all(tasks).await;
		// Heights finalized before a failure are made durable too.
		let flushed = self.blocks_db.flush().await;
		joined?;
		flushed?;

		let unfinalized = run.tracker.unfinalized_heights();
		if !unfinalized.is_empty() {
			warn!(
				"{} heights of window [{}, {}] never completed, first one {}",
				unfinalized.len(),
				from,
				to,
				unfinalized[0]
			);
		}
		if run.store.pending_heights() > 0 {
			warn!(
				"{} heights still buffered after window [{}, {}]",
				run.store.pending_heights(),
				from,
				to
			);
		}

		let stats = run.progress.snapshot(from, to);
		self.events.dispatch(&SyncEvent::WindowCompleted {
			window: self.window,
			from,
			to,
			blocks_written: stats.blocks_written,
		});
		Ok(stats)
	}
}

/// State of one `synchronize` call, shared by all of its batch tasks.
struct WindowRun<N: Network> {
	synchronizer: BlocksSynchronizer<N>,
	tracker: CompletionTracker,
	store: PartialBlockStore<N>,
	progress: WindowProgress,
}

impl<N: Network> WindowRun<N> {
	/// Register `batch` on `[from, to]` right away and return the task querying it.
	fn create_batch_task(
		self: &Arc<Self>,
		keychain: Arc<dyn Keychain>,
		batch: AddressBatch,
		start_hash: Option<String>,
		from: u32,
		to: u32,
	) -> BoxFuture<'static, Result<(), WalletSyncError>> {
		if batch.is_empty() || to < from {
			return future::ok(()).boxed();
		}

		self.tracker.add_batch(from, to);
		let run = Arc::clone(self);
		async move {
			run.synchronize_batch(keychain, batch, start_hash, from, to)
				.await
		}
		.boxed()
	}

	async fn synchronize_batch(
		self: Arc<Self>,
		keychain: Arc<dyn Keychain>,
		batch: AddressBatch,
		start_hash: Option<String>,
		from: u32,
		to: u32,
	) -> Result<(), WalletSyncError> {
		let sync = &self.synchronizer;
		debug!(
			"Querying {} {:?} addresses up to index {} over [{}, {}]",
			batch.addresses.len(),
			batch.kind,
			batch.last_address_index,
			from,
			to
		);

		let bulk = sync
			.explorer
			.get_transactions(&batch.addresses, start_hash.as_deref())
			.await?;
		self.progress.record_request(bulk.transactions.len());

		let bounds = bulk
			.transactions
			.iter()
			.filter_map(|tx| tx.block())
			.minmax_by_key(|block| block.height());
		let (lowest, highest) = match bounds {
			MinMaxResult::NoElements => {
				self.finalize(from, to);
				return Ok(());
			}
			MinMaxResult::OneElement(block) => (block.clone(), block.clone()),
			MinMaxResult::MinMax(lowest, highest) => (lowest.clone(), highest.clone()),
		};

		if lowest.height() < from {
			return Err(WalletSyncError::ProtocolViolation(format!(
				"block {} at height {} returned for a request starting at height {}",
				lowest.hash(),
				lowest.height(),
				from
			)));
		}

		let last_full = if bulk.truncated {
			if (bulk.transactions.len() as u64) < sync.max_transaction_per_response as u64 {
				warn!(
					"Explorer truncated a response of only {} transactions (page size {})",
					bulk.transactions.len(),
					sync.max_transaction_per_response
				);
			}
			if highest.height() == from {
				return Err(WalletSyncError::ProtocolViolation(format!(
					"truncated response holds the single height {}",
					from
				)));
			}
			highest.height() - 1
		} else {
			to
		};

		let limit = last_full.min(to);
		for tx in bulk.transactions {
			match tx.block() {
				Some(block) if block.height() <= limit => {}
				_ => continue,
			}
			for address in tx.output_addresses() {
				keychain.mark_used(address);
			}
			self.store.add_transaction(tx);
		}

		let mut continuations = Vec::with_capacity(2);
		if batch.is_gap() {
			let next = batch.next_gap(keychain.as_ref(), sync.gap_size);
			continuations.push(self.create_batch_task(
				Arc::clone(&keychain),
				next,
				Some(lowest.hash().to_string()),
				lowest.height(),
				to,
			));
		}
		if last_full < to {
			continuations.push(self.create_batch_task(
				keychain,
				batch.continuation(),
				Some(highest.hash().to_string()),
				last_full + 1,
				to,
			));
		}

		self.finalize(from, to);
		future::try_join_all(continuations).await?;
		Ok(())
	}

	/// Report this batch done on `[from, to]` and store the heights it was the last one on.
	fn finalize(&self, from: u32, to: u32) {
		let sync = &self.synchronizer;
		for height in from..=to {
			if !self.tracker.finish_batch(height) {
				continue;
			}

			let transactions = self.store.take_block(height);
			if let Some(header) = transactions.first().and_then(|tx| tx.block()).cloned() {
				let transaction_count = transactions.len();
				self.progress.record_block(transaction_count);
				sync.blocks_db.add_block(N::fill_block(header, transactions));
				sync.events.dispatch(&SyncEvent::BlockFinalized {
					window: sync.window,
					height,
					transaction_count,
				});
			}
			self.tracker.mark_finalized(height);
		}
	}
}
