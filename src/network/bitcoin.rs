//! Bitcoin-like records as stored by the wallet.
//!
//! Every optional field and every amount round-trips through both the explorer JSON shape and
//! the bincode representation used by the block database.

use super::{Amount, BlockLike, Network, TransactionLike};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default input sequence (final).
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
	pub hash: String,
	pub height: u32,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
	pub index: u64,
	pub value: Option<Amount>,
	pub previous_tx_hash: Option<String>,
	pub previous_output_index: Option<u32>,
	pub address: Option<String>,
	pub signature_script: Option<String>,
	pub coinbase: Option<String>,
	pub sequence: u32,
}

impl Default for Input {
	fn default() -> Self {
		Self {
			index: 0,
			value: None,
			previous_tx_hash: None,
			previous_output_index: None,
			address: None,
			signature_script: None,
			coinbase: None,
			sequence: DEFAULT_SEQUENCE,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
	pub index: u64,
	pub transaction_hash: String,
	pub value: Amount,
	pub address: Option<String>,
	pub script: String,
	pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub version: u32,
	pub hash: String,
	pub received_at: DateTime<Utc>,
	pub lock_time: u64,
	pub block: Option<Block>,
	pub inputs: Vec<Input>,
	pub outputs: Vec<Output>,
	pub fees: Option<Amount>,
	pub confirmations: u64,
}

impl Default for Transaction {
	fn default() -> Self {
		Self {
			version: 1,
			hash: String::new(),
			received_at: DateTime::<Utc>::UNIX_EPOCH,
			lock_time: 0,
			block: None,
			inputs: Vec::new(),
			outputs: Vec::new(),
			fees: None,
			confirmations: 1,
		}
	}
}

/// A block header together with the wallet transactions it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledBlock {
	pub header: Block,
	pub transactions: Vec<Transaction>,
}

impl BlockLike for Block {
	fn hash(&self) -> &str {
		&self.hash
	}

	fn height(&self) -> u32 {
		self.height
	}
}

impl TransactionLike for Transaction {
	type Block = Block;

	fn hash(&self) -> &str {
		&self.hash
	}

	fn block(&self) -> Option<&Block> {
		self.block.as_ref()
	}

	fn output_addresses(&self) -> Vec<&str> {
		self.outputs
			.iter()
			.filter_map(|output| output.address.as_deref())
			.collect()
	}
}

/// Bitcoin and its forks (same UTXO record layout).
#[derive(Debug, Clone, Copy)]
pub struct BitcoinLikeNetwork;

impl Network for BitcoinLikeNetwork {
	type Block = Block;
	type Transaction = Transaction;
	type FilledBlock = FilledBlock;

	fn fill_block(header: Block, transactions: Vec<Transaction>) -> FilledBlock {
		FilledBlock {
			header,
			transactions,
		}
	}

	fn filled_block_header(block: &FilledBlock) -> &Block {
		&block.header
	}

	fn filled_block_transactions(block: &FilledBlock) -> &[Transaction] {
		&block.transactions
	}
}
