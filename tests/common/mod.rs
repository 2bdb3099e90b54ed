#![allow(dead_code)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wallet_account_sync::explorer::{Explorer, ExplorerError, TransactionBulk};
use wallet_account_sync::network::Amount;
use wallet_account_sync::network::bitcoin::{
	BitcoinLikeNetwork, Block, FilledBlock, Output, Transaction,
};
use wallet_account_sync::wallet::SynchronizerConfig;
use wallet_account_sync::wallet::WalletSyncError;
use wallet_account_sync::wallet::keychain::WatchOnlyKeychain;
use wallet_account_sync::wallet::sync::{BlockchainDatabase, InMemoryBlockchainDatabase};

pub fn block_hash(height: u32) -> String {
	format!("block-{}", height)
}

pub fn block(height: u32) -> Block {
	Block {
		hash: block_hash(height),
		height,
		created_at: DateTime::<Utc>::from_timestamp(1_500_000_000 + height as i64 * 600, 0)
			.unwrap(),
	}
}

/// Transaction paying `value` to every address of `to`, mined at `height` if any.
pub fn payment(hash: &str, height: Option<u32>, to: &[&str]) -> Transaction {
	Transaction {
		hash: hash.to_string(),
		block: height.map(block),
		outputs: to
			.iter()
			.enumerate()
			.map(|(index, address)| Output {
				index: index as u64,
				transaction_hash: hash.to_string(),
				value: Amount::from(10_000u64),
				address: Some(address.to_string()),
				..Default::default()
			})
			.collect(),
		..Default::default()
	}
}

/// Keychain over `count` addresses named `{prefix}{index}`.
pub fn numeric_keychain(prefix: &str, count: u32, used: u32) -> WatchOnlyKeychain {
	WatchOnlyKeychain::with_used((0..count).map(|i| format!("{}{}", prefix, i)).collect(), used)
}

pub fn config(max_unstable: u32, batch_size: u32, gap_size: u32, page_size: u32) -> SynchronizerConfig {
	SynchronizerConfig {
		max_possible_unstable_blocks: max_unstable,
		max_number_of_addresses_in_request: batch_size,
		discovery_gap_size: gap_size,
		max_transaction_per_response: page_size,
		genesis_block_hash: block_hash(0),
	}
}

/// One `get_transactions` call seen by the fake explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub addresses: Vec<String>,
	pub from_block_hash: Option<String>,
}

/// In-memory explorer over a chain of blocks `0..=tip`.
///
/// Honours the explorer contract: results start at the height of the requested block and a
/// response holding more than `page_size` transactions is cut at `page_size` and flagged
/// truncated. Scripted responses, when queued, are served instead of the chain.
pub struct FakeExplorer {
	tip: Mutex<u32>,
	transactions: Mutex<Vec<Transaction>>,
	pending: Mutex<Vec<Transaction>>,
	page_size: usize,
	scripted: Mutex<VecDeque<TransactionBulk<Transaction>>>,
	failing: Mutex<bool>,
	requests: Mutex<Vec<Request>>,
	tip_requests: AtomicUsize,
}

impl FakeExplorer {
	pub fn new(tip: u32, page_size: usize) -> Self {
		Self {
			tip: Mutex::new(tip),
			transactions: Mutex::new(Vec::new()),
			pending: Mutex::new(Vec::new()),
			page_size,
			scripted: Mutex::new(VecDeque::new()),
			failing: Mutex::new(false),
			requests: Mutex::new(Vec::new()),
			tip_requests: AtomicUsize::new(0),
		}
	}

	pub fn with_transactions(self, transactions: Vec<Transaction>) -> Self {
		*self.transactions.lock() = transactions;
		self
	}

	pub fn set_transactions(&self, transactions: Vec<Transaction>) {
		*self.transactions.lock() = transactions;
	}

	pub fn set_pending(&self, transactions: Vec<Transaction>) {
		*self.pending.lock() = transactions;
	}

	pub fn set_tip(&self, tip: u32) {
		*self.tip.lock() = tip;
	}

	pub fn push_scripted(&self, bulk: TransactionBulk<Transaction>) {
		self.scripted.lock().push_back(bulk);
	}

	pub fn set_failing(&self, failing: bool) {
		*self.failing.lock() = failing;
	}

	pub fn requests(&self) -> Vec<Request> {
		self.requests.lock().clone()
	}

	pub fn tip_requests(&self) -> usize {
		self.tip_requests.load(Ordering::SeqCst)
	}

	fn height_of(&self, hash: &str) -> Option<u32> {
		let height = hash.strip_prefix("block-")?.parse::<u32>().ok()?;
		(height <= *self.tip.lock()).then_some(height)
	}

	fn touches(tx: &Transaction, addresses: &[String]) -> bool {
		tx.outputs
			.iter()
			.filter_map(|output| output.address.as_ref())
			.chain(tx.inputs.iter().filter_map(|input| input.address.as_ref()))
			.any(|address| addresses.contains(address))
	}
}

#[async_trait::async_trait]
impl Explorer<BitcoinLikeNetwork> for FakeExplorer {
	async fn get_transactions(
		&self,
		addresses: &[String],
		from_block_hash: Option<&str>,
	) -> Result<TransactionBulk<Transaction>, ExplorerError> {
		self.requests.lock().push(Request {
			addresses: addresses.to_vec(),
			from_block_hash: from_block_hash.map(str::to_string),
		});
		if *self.failing.lock() {
			return Err(ExplorerError::Transport("connection reset".to_string()));
		}
		if let Some(bulk) = self.scripted.lock().pop_front() {
			return Ok(bulk);
		}

		let from = match from_block_hash {
			Some(hash) => self
				.height_of(hash)
				.ok_or_else(|| ExplorerError::BlockNotFound(hash.to_string()))?,
			None => 0,
		};
		let tip = *self.tip.lock();

		let mut matching: Vec<Transaction> = self
			.transactions
			.lock()
			.iter()
			.filter(|tx| {
				tx.block
					.as_ref()
					.is_some_and(|block| block.height >= from && block.height <= tip)
			})
			.filter(|tx| Self::touches(tx, addresses))
			.cloned()
			.collect();
		matching.sort_by_key(|tx| tx.block.as_ref().map(|block| block.height));

		let truncated = matching.len() > self.page_size;
		matching.truncate(self.page_size);
		Ok(TransactionBulk::new(matching, truncated))
	}

	async fn get_current_block(&self) -> Result<Block, ExplorerError> {
		self.tip_requests.fetch_add(1, Ordering::SeqCst);
		if *self.failing.lock() {
			return Err(ExplorerError::Transport("connection reset".to_string()));
		}
		Ok(block(*self.tip.lock()))
	}

	async fn get_block(&self, height: u32) -> Result<Option<Block>, ExplorerError> {
		Ok((height <= *self.tip.lock()).then(|| block(height)))
	}

	async fn get_pending_transactions(
		&self,
		addresses: &[String],
	) -> Result<Vec<Transaction>, ExplorerError> {
		Ok(self
			.pending
			.lock()
			.iter()
			.filter(|tx| Self::touches(tx, addresses))
			.cloned()
			.collect())
	}
}

/// Explorer handing control back to the executor before every answer, so that concurrent
/// batches really interleave.
pub struct YieldingExplorer(pub Arc<FakeExplorer>);

#[async_trait::async_trait]
impl Explorer<BitcoinLikeNetwork> for YieldingExplorer {
	async fn get_transactions(
		&self,
		addresses: &[String],
		from_block_hash: Option<&str>,
	) -> Result<TransactionBulk<Transaction>, ExplorerError> {
		tokio::task::yield_now().await;
		self.0.get_transactions(addresses, from_block_hash).await
	}

	async fn get_current_block(&self) -> Result<Block, ExplorerError> {
		tokio::task::yield_now().await;
		self.0.get_current_block().await
	}

	async fn get_block(&self, height: u32) -> Result<Option<Block>, ExplorerError> {
		tokio::task::yield_now().await;
		self.0.get_block(height).await
	}

	async fn get_pending_transactions(
		&self,
		addresses: &[String],
	) -> Result<Vec<Transaction>, ExplorerError> {
		tokio::task::yield_now().await;
		self.0.get_pending_transactions(addresses).await
	}
}

/// Block store recording every `add_block` call.
#[derive(Default)]
pub struct RecordingDatabase {
	inner: InMemoryBlockchainDatabase<BitcoinLikeNetwork>,
	added: Mutex<Vec<u32>>,
}

impl RecordingDatabase {
	/// Heights passed to `add_block`, in call order.
	pub fn added_heights(&self) -> Vec<u32> {
		self.added.lock().clone()
	}

	/// Number of `add_block` calls per height.
	pub fn add_counts(&self) -> BTreeMap<u32, usize> {
		let mut counts = BTreeMap::new();
		for height in self.added.lock().iter() {
			*counts.entry(*height).or_insert(0) += 1;
		}
		counts
	}

	pub async fn stored(&self) -> Vec<FilledBlock> {
		self.inner.get_blocks(0, u32::MAX).await.unwrap()
	}
}

#[async_trait::async_trait]
impl BlockchainDatabase<BitcoinLikeNetwork> for RecordingDatabase {
	fn add_block(&self, block: FilledBlock) {
		self.added.lock().push(block.header.height);
		self.inner.add_block(block);
	}

	fn last_block(&self) -> Option<Block> {
		self.inner.last_block()
	}

	async fn get_blocks(&self, from: u32, to: u32) -> Result<Vec<FilledBlock>, WalletSyncError> {
		self.inner.get_blocks(from, to).await
	}

	async fn remove_blocks_from(&self, height: u32) -> Result<(), WalletSyncError> {
		self.inner.remove_blocks_from(height).await
	}

	async fn flush(&self) -> Result<(), WalletSyncError> {
		self.inner.flush().await
	}
}
