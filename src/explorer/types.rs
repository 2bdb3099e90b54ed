//! Explorer contract and the JSON shapes returned by the REST explorer

use crate::network::bitcoin::{Block, Input, Output, Transaction};
use crate::network::{Amount, Network};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transactions returned for one address set, plus the explorer's truncation flag.
///
/// When `truncated` is set the explorer guarantees that at least the lowest returned height is
/// completely represented; the highest returned height may be partial.
#[derive(Debug, Clone)]
pub struct TransactionBulk<T> {
	pub transactions: Vec<T>,
	pub truncated: bool,
}

impl<T> TransactionBulk<T> {
	pub fn new(transactions: Vec<T>, truncated: bool) -> Self {
		Self {
			transactions,
			truncated,
		}
	}

	pub fn empty() -> Self {
		Self::new(Vec::new(), false)
	}
}

/// Remote source of account history.
#[async_trait::async_trait]
pub trait Explorer<N: Network>: Send + Sync {
	/// Transactions touching any of `addresses` at or above the height of `from_block_hash`.
	///
	/// Must never return a transaction mined below that height.
	async fn get_transactions(
		&self,
		addresses: &[String],
		from_block_hash: Option<&str>,
	) -> Result<TransactionBulk<N::Transaction>, ExplorerError>;

	/// Current chain tip.
	async fn get_current_block(&self) -> Result<N::Block, ExplorerError>;

	/// Block at `height` on the explorer's best chain, `None` above the tip.
	async fn get_block(&self, height: u32) -> Result<Option<N::Block>, ExplorerError>;

	/// Unconfirmed transactions touching any of `addresses`.
	async fn get_pending_transactions(
		&self,
		addresses: &[String],
	) -> Result<Vec<N::Transaction>, ExplorerError>;
}

/// Block header as served by the explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerBlock {
	pub hash: String,
	pub height: u32,
	/// Block timestamp (RFC 3339).
	pub time: DateTime<Utc>,
}

impl From<ExplorerBlock> for Block {
	fn from(block: ExplorerBlock) -> Self {
		Block {
			hash: block.hash,
			height: block.height,
			created_at: block.time,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerInput {
	pub input_index: u64,
	#[serde(default)]
	pub value: Option<Amount>,
	/// Hash of the transaction holding the spent output.
	#[serde(default)]
	pub output_hash: Option<String>,
	#[serde(default)]
	pub output_index: Option<u32>,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub script_signature: Option<String>,
	#[serde(default)]
	pub coinbase: Option<String>,
	#[serde(default = "default_sequence")]
	pub sequence: u32,
}

fn default_sequence() -> u32 {
	crate::network::bitcoin::DEFAULT_SEQUENCE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerOutput {
	pub output_index: u64,
	pub value: Amount,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub script_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerTransaction {
	pub hash: String,
	pub received_at: DateTime<Utc>,
	#[serde(default)]
	pub lock_time: u64,
	#[serde(default)]
	pub block: Option<ExplorerBlock>,
	#[serde(default)]
	pub inputs: Vec<ExplorerInput>,
	#[serde(default)]
	pub outputs: Vec<ExplorerOutput>,
	#[serde(default)]
	pub fees: Option<Amount>,
	#[serde(default)]
	pub confirmations: u64,
}

impl From<ExplorerTransaction> for Transaction {
	fn from(tx: ExplorerTransaction) -> Self {
		let received_at = tx.received_at.to_rfc3339();
		let outputs = tx
			.outputs
			.into_iter()
			.map(|output| Output {
				index: output.output_index,
				transaction_hash: tx.hash.clone(),
				value: output.value,
				address: output.address,
				script: output.script_hex,
				time: received_at.clone(),
			})
			.collect();
		let inputs = tx
			.inputs
			.into_iter()
			.map(|input| Input {
				index: input.input_index,
				value: input.value,
				previous_tx_hash: input.output_hash,
				previous_output_index: input.output_index,
				address: input.address,
				signature_script: input.script_signature,
				coinbase: input.coinbase,
				sequence: input.sequence,
			})
			.collect();

		Transaction {
			version: 1,
			hash: tx.hash,
			received_at: tx.received_at,
			lock_time: tx.lock_time,
			block: tx.block.map(Block::from),
			inputs,
			outputs,
			fees: tx.fees,
			confirmations: tx.confirmations,
		}
	}
}

/// Response body of the address transactions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsResponse {
	#[serde(default)]
	pub truncated: bool,
	pub txs: Vec<ExplorerTransaction>,
}

/// Error types for explorer requests
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Explorer returned status {status}: {body}")]
	StatusError { status: u16, body: String },

	#[error("Block not found: {0}")]
	BlockNotFound(String),

	#[error("No data returned")]
	NoData,

	#[error("Transport error: {0}")]
	Transport(String),
}
