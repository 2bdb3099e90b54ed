use crate::network::{BlockLike, Network};
use crate::wallet::WalletSyncError;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Store of finalized blocks holding wallet transactions.
///
/// `add_block` is fire-and-forget: it never blocks the synchronizer and never fails. The write
/// becomes durable at the next `flush`.
#[async_trait::async_trait]
pub trait BlockchainDatabase<N: Network>: Send + Sync {
	/// Queue a block. A block already stored at the same height is replaced.
	fn add_block(&self, block: N::FilledBlock);

	/// Header of the highest stored block.
	fn last_block(&self) -> Option<N::Block>;

	/// Stored blocks with a height in `[from, to]`, ascending.
	async fn get_blocks(&self, from: u32, to: u32) -> Result<Vec<N::FilledBlock>, WalletSyncError>;

	/// Drop every block at or above `height`.
	async fn remove_blocks_from(&self, height: u32) -> Result<(), WalletSyncError>;

	async fn clean_all(&self) -> Result<(), WalletSyncError> {
		self.remove_blocks_from(0).await
	}

	/// Wait until every queued block is durable.
	async fn flush(&self) -> Result<(), WalletSyncError>;
}

/// Store of unconfirmed wallet transactions, rebuilt on every pass.
#[async_trait::async_trait]
pub trait PendingTransactionDatabase<N: Network>: Send + Sync {
	async fn replace(&self, transactions: Vec<N::Transaction>) -> Result<(), WalletSyncError>;
	async fn get_all(&self) -> Result<Vec<N::Transaction>, WalletSyncError>;
}

fn block_height<N: Network>(block: &N::FilledBlock) -> u32 {
	N::filled_block_header(block).height()
}

/// Volatile block store, used for the unstable window.
pub struct InMemoryBlockchainDatabase<N: Network> {
	blocks: RwLock<BTreeMap<u32, N::FilledBlock>>,
}

impl<N: Network> InMemoryBlockchainDatabase<N> {
	pub fn new() -> Self {
		Self {
			blocks: RwLock::new(BTreeMap::new()),
		}
	}

	pub fn len(&self) -> usize {
		self.blocks.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.blocks.read().is_empty()
	}
}

impl<N: Network> Default for InMemoryBlockchainDatabase<N> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait::async_trait]
impl<N: Network> BlockchainDatabase<N> for InMemoryBlockchainDatabase<N> {
	fn add_block(&self, block: N::FilledBlock) {
		self.blocks.write().insert(block_height::<N>(&block), block);
	}

	fn last_block(&self) -> Option<N::Block> {
		self.blocks
			.read()
			.values()
			.next_back()
			.map(|block| N::filled_block_header(block).clone())
	}

	async fn get_blocks(&self, from: u32, to: u32) -> Result<Vec<N::FilledBlock>, WalletSyncError> {
		if to < from {
			return Ok(Vec::new());
		}
		Ok(self.blocks.read().range(from..=to).map(|(_, b)| b.clone()).collect())
	}

	async fn remove_blocks_from(&self, height: u32) -> Result<(), WalletSyncError> {
		self.blocks.write().split_off(&height);
		Ok(())
	}

	async fn flush(&self) -> Result<(), WalletSyncError> {
		Ok(())
	}
}

/// File-based implementation of BlockchainDatabase
///
/// Every block is a bincode file named after its height in `data_dir`. Blocks are kept in memory
/// as well; `add_block` only records the height as dirty and `flush` writes the dirty ones.
pub struct FileBlockchainDatabase<N: Network> {
	data_dir: PathBuf,
	blocks: RwLock<BTreeMap<u32, N::FilledBlock>>,
	dirty: Mutex<BTreeSet<u32>>,
	_network: PhantomData<N>,
}

const BLOCK_FILE_PREFIX: &str = "block_";
const BLOCK_FILE_SUFFIX: &str = ".bin";

impl<N: Network> FileBlockchainDatabase<N>
where
	N::FilledBlock: Serialize + DeserializeOwned,
{
	/// Open the store in `data_dir`, creating the directory and loading existing blocks.
	pub async fn open(data_dir: PathBuf) -> Result<Self, WalletSyncError> {
		tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to create {:?}: {}", data_dir, e))
		})?;

		let mut entries = tokio::fs::read_dir(&data_dir).await.map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to read directory: {}", e))
		})?;

		let mut blocks = BTreeMap::new();
		while let Some(entry) = entries.next_entry().await.map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to read directory entry: {}", e))
		})? {
			let path = entry.path();
			let Some(height) = Self::parse_height(&path) else {
				continue;
			};
			let bytes = tokio::fs::read(&path).await?;
			match bincode::deserialize::<N::FilledBlock>(&bytes) {
				Ok(block) if block_height::<N>(&block) == height => {
					blocks.insert(height, block);
				}
				Ok(_) => warn!("Ignoring block file {:?} holding another height", path),
				Err(e) => warn!("Ignoring unreadable block file {:?}: {}", path, e),
			}
		}

		info!("Opened block store {:?} with {} blocks", data_dir, blocks.len());
		Ok(Self {
			data_dir,
			blocks: RwLock::new(blocks),
			dirty: Mutex::new(BTreeSet::new()),
			_network: PhantomData,
		})
	}

	fn block_filename(&self, height: u32) -> PathBuf {
		self.data_dir
			.join(format!("{}{:010}{}", BLOCK_FILE_PREFIX, height, BLOCK_FILE_SUFFIX))
	}

	fn parse_height(path: &Path) -> Option<u32> {
		path.file_name()
			.and_then(|f| f.to_str())
			.and_then(|f| f.strip_prefix(BLOCK_FILE_PREFIX))
			.and_then(|s| s.strip_suffix(BLOCK_FILE_SUFFIX))
			.and_then(|s| s.parse::<u32>().ok())
	}

	/// Write the block stored at `height`, if any, to its file.
	async fn write_block(&self, height: u32) -> Result<(), WalletSyncError> {
		let bytes = {
			let blocks = self.blocks.read();
			match blocks.get(&height) {
				Some(block) => bincode::serialize(block)?,
				None => return Ok(()),
			}
		};

		let filename = self.block_filename(height);
		tokio::fs::write(&filename, &bytes).await.map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to write block file {:?}: {}", filename, e))
		})?;
		debug!("Saved block {} to {:?}", height, filename);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.blocks.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.blocks.read().is_empty()
	}
}

#[async_trait::async_trait]
impl<N: Network> BlockchainDatabase<N> for FileBlockchainDatabase<N>
where
	N::FilledBlock: Serialize + DeserializeOwned,
{
	fn add_block(&self, block: N::FilledBlock) {
		let height = block_height::<N>(&block);
		self.blocks.write().insert(height, block);
		self.dirty.lock().insert(height);
	}

	fn last_block(&self) -> Option<N::Block> {
		self.blocks
			.read()
			.values()
			.next_back()
			.map(|block| N::filled_block_header(block).clone())
	}

	async fn get_blocks(&self, from: u32, to: u32) -> Result<Vec<N::FilledBlock>, WalletSyncError> {
		if to < from {
			return Ok(Vec::new());
		}
		Ok(self.blocks.read().range(from..=to).map(|(_, b)| b.clone()).collect())
	}

	async fn remove_blocks_from(&self, height: u32) -> Result<(), WalletSyncError> {
		let removed = self.blocks.write().split_off(&height);
		self.dirty.lock().split_off(&height);

		for height in removed.keys() {
			let path = self.block_filename(*height);
			match tokio::fs::remove_file(&path).await {
				Ok(()) => {}
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
				Err(e) => {
					return Err(WalletSyncError::StorageError(format!(
						"Failed to remove block file {:?}: {}",
						path, e
					)));
				}
			}
		}
		if !removed.is_empty() {
			info!("Removed {} blocks from height {}", removed.len(), height);
		}
		Ok(())
	}

	async fn flush(&self) -> Result<(), WalletSyncError> {
		let mut unwritten = std::mem::take(&mut *self.dirty.lock());
		while let Some(height) = unwritten.first().copied() {
			if let Err(e) = self.write_block(height).await {
				self.dirty.lock().extend(unwritten);
				return Err(e);
			}
			unwritten.remove(&height);
		}
		Ok(())
	}
}

/// Height the stable window was last synchronized through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableCheckpoint {
	pub height: u32,
	/// Hash of the block at `height` when the checkpoint was taken.
	pub hash: String,
	pub saved_at: DateTime<Utc>,
}

/// Store of the stable window's high-water mark.
#[async_trait::async_trait]
pub trait CheckpointRepository: Send + Sync {
	async fn save(&self, checkpoint: &StableCheckpoint) -> Result<(), WalletSyncError>;
	async fn load(&self) -> Result<Option<StableCheckpoint>, WalletSyncError>;
}

#[derive(Default)]
pub struct InMemoryCheckpointRepository {
	checkpoint: RwLock<Option<StableCheckpoint>>,
}

impl InMemoryCheckpointRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
	async fn save(&self, checkpoint: &StableCheckpoint) -> Result<(), WalletSyncError> {
		*self.checkpoint.write() = Some(checkpoint.clone());
		Ok(())
	}

	async fn load(&self) -> Result<Option<StableCheckpoint>, WalletSyncError> {
		Ok(self.checkpoint.read().clone())
	}
}

/// File-based implementation of CheckpointRepository
pub struct FileCheckpointRepository {
	data_dir: PathBuf,
}

const CHECKPOINT_FILENAME: &str = "stable_checkpoint.json";

impl FileCheckpointRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_checkpoint_filename(&self) -> PathBuf {
		self.data_dir.join(CHECKPOINT_FILENAME)
	}
}

#[async_trait::async_trait]
impl CheckpointRepository for FileCheckpointRepository {
	async fn save(&self, checkpoint: &StableCheckpoint) -> Result<(), WalletSyncError> {
		tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to create {:?}: {}", self.data_dir, e))
		})?;

		let content = serde_json::to_string_pretty(checkpoint).map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to serialize checkpoint: {}", e))
		})?;

		let checkpoint_file_path = self.get_checkpoint_filename();
		tokio::fs::write(&checkpoint_file_path, content)
			.await
			.map_err(|e| {
				WalletSyncError::StorageError(format!("Failed to write checkpoint file: {}", e))
			})?;

		info!(
			"Checkpoint saved: stable window synchronized through height {}",
			checkpoint.height
		);
		Ok(())
	}

	async fn load(&self) -> Result<Option<StableCheckpoint>, WalletSyncError> {
		let content = match tokio::fs::read_to_string(self.get_checkpoint_filename()).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => {
				return Err(WalletSyncError::StorageError(format!(
					"Failed to read checkpoint file: {}",
					e
				)));
			}
		};

		let checkpoint: StableCheckpoint = serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::StorageError(format!("Failed to parse checkpoint file: {}", e))
		})?;
		debug!("Loaded stable checkpoint at height {}", checkpoint.height);
		Ok(Some(checkpoint))
	}
}

pub struct InMemoryPendingTransactions<N: Network> {
	transactions: RwLock<Vec<N::Transaction>>,
}

impl<N: Network> InMemoryPendingTransactions<N> {
	pub fn new() -> Self {
		Self {
			transactions: RwLock::new(Vec::new()),
		}
	}
}

impl<N: Network> Default for InMemoryPendingTransactions<N> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait::async_trait]
impl<N: Network> PendingTransactionDatabase<N> for InMemoryPendingTransactions<N> {
	async fn replace(&self, transactions: Vec<N::Transaction>) -> Result<(), WalletSyncError> {
		*self.transactions.write() = transactions;
		Ok(())
	}

	async fn get_all(&self) -> Result<Vec<N::Transaction>, WalletSyncError> {
		Ok(self.transactions.read().clone())
	}
}
