use crate::network::{BlockLike, Network, TransactionLike};

use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::warn;

/// In-memory accumulator of wallet transactions per height, for heights not yet complete.
///
/// Several batches can return the same transaction (it may touch addresses of more than one
/// batch), so a bucket keeps at most one copy per transaction hash.
pub struct PartialBlockStore<N: Network> {
	blocks: Mutex<BTreeMap<u32, Vec<N::Transaction>>>,
}

impl<N: Network> PartialBlockStore<N> {
	pub fn new() -> Self {
		Self {
			blocks: Mutex::new(BTreeMap::new()),
		}
	}

	/// Append a confirmed transaction to the bucket of its block height.
	///
	/// Returns `false` if it was already there or carries no block.
	pub fn add_transaction(&self, transaction: N::Transaction) -> bool {
		let Some(height) = transaction.block().map(|block| block.height()) else {
			warn!(
				"Ignoring unconfirmed transaction {} in block accumulator",
				transaction.hash()
			);
			return false;
		};

		let mut blocks = self.blocks.lock();
		let bucket = blocks.entry(height).or_default();
		if bucket.iter().any(|known| known.hash() == transaction.hash()) {
			return false;
		}
		bucket.push(transaction);
		true
	}

	pub fn get_transactions(&self, height: u32) -> Vec<N::Transaction> {
		self.blocks
			.lock()
			.get(&height)
			.cloned()
			.unwrap_or_default()
	}

	pub fn remove_block(&self, height: u32) {
		self.blocks.lock().remove(&height);
	}

	/// Read and evict the bucket of `height` in one step.
	pub fn take_block(&self, height: u32) -> Vec<N::Transaction> {
		self.blocks.lock().remove(&height).unwrap_or_default()
	}

	/// Number of heights currently buffered.
	pub fn pending_heights(&self) -> usize {
		self.blocks.lock().len()
	}
}

impl<N: Network> Default for PartialBlockStore<N> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::network::bitcoin::{BitcoinLikeNetwork, Block, Transaction};
	use chrono::Utc;

	fn tx(hash: &str, height: Option<u32>) -> Transaction {
		Transaction {
			hash: hash.to_string(),
			block: height.map(|height| Block {
				hash: format!("block-{}", height),
				height,
				created_at: Utc::now(),
			}),
			..Default::default()
		}
	}

	#[test]
	fn test_buckets_by_height_without_duplicates() {
		let store = PartialBlockStore::<BitcoinLikeNetwork>::new();
		assert!(store.add_transaction(tx("a", Some(7))));
		assert!(store.add_transaction(tx("b", Some(7))));
		assert!(!store.add_transaction(tx("a", Some(7))));
		assert!(store.add_transaction(tx("c", Some(9))));
		assert!(!store.add_transaction(tx("pending", None)));

		assert_eq!(store.get_transactions(7).len(), 2);
		assert_eq!(store.pending_heights(), 2);

		let taken = store.take_block(7);
		assert_eq!(taken.len(), 2);
		assert!(store.get_transactions(7).is_empty());

		store.remove_block(9);
		assert_eq!(store.pending_heights(), 0);
	}
}
