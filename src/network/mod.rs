//! Network-agnostic view of blocks and transactions.
//!
//! The synchronizer only needs a handful of facts about the records it moves around: a block's
//! hash and height, a transaction's hash, its (optional) block and the addresses it pays to.
//! Each currency family plugs its own record types in through the [`Network`] bundle so the
//! same batch discovery algorithm runs for all of them.

/// Fixed-width amount type shared by all record definitions
pub mod amount;
/// Bitcoin-like records and their network bundle
pub mod bitcoin;

use std::fmt::Debug;

pub use amount::Amount;

/// Minimal header information the synchronizer reads from a block.
pub trait BlockLike: Clone + Debug + Send + Sync + 'static {
	fn hash(&self) -> &str;
	fn height(&self) -> u32;
}

/// Minimal information the synchronizer reads from a transaction.
pub trait TransactionLike: Clone + Debug + Send + Sync + 'static {
	type Block: BlockLike;

	fn hash(&self) -> &str;

	/// The block this transaction was mined in, `None` while unconfirmed.
	fn block(&self) -> Option<&Self::Block>;

	/// Addresses receiving an output of this transaction, in output order.
	fn output_addresses(&self) -> Vec<&str>;
}

/// Associated-type bundle describing one family of currencies.
pub trait Network: Send + Sync + 'static {
	type Block: BlockLike;
	type Transaction: TransactionLike<Block = Self::Block>;
	type FilledBlock: Clone + Debug + Send + Sync + 'static;

	/// Build a persisted block record out of a header and every wallet transaction it holds.
	fn fill_block(header: Self::Block, transactions: Vec<Self::Transaction>) -> Self::FilledBlock;

	fn filled_block_header(block: &Self::FilledBlock) -> &Self::Block;

	fn filled_block_transactions(block: &Self::FilledBlock) -> &[Self::Transaction];
}
