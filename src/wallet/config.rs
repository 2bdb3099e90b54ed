//! Synchronizer and application configuration.

use crate::wallet::WalletSyncError;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Tuning of one account synchronizer. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizerConfig {
	/// Depth below the tip still subject to reorganization.
	pub max_possible_unstable_blocks: u32,
	/// Addresses per explorer request (batch size).
	pub max_number_of_addresses_in_request: u32,
	/// Width of a gap batch.
	pub discovery_gap_size: u32,
	/// Page size the explorer truncates at; only used to flag odd truncations.
	#[serde(alias = "maxTransactionPerResponce")]
	pub max_transaction_per_response: u32,
	/// Hash of the genesis block, the starting point of a fresh account.
	pub genesis_block_hash: String,
}

impl SynchronizerConfig {
	pub fn validate(&self) -> Result<(), WalletSyncError> {
		if self.max_number_of_addresses_in_request == 0 {
			return Err(WalletSyncError::ConfigError(
				"maxNumberOfAddressesInRequest must be positive".to_string(),
			));
		}
		if self.discovery_gap_size == 0 {
			return Err(WalletSyncError::ConfigError(
				"discoveryGapSize must be positive".to_string(),
			));
		}
		if self.genesis_block_hash.is_empty() {
			return Err(WalletSyncError::ConfigError(
				"genesisBlockHash must not be empty".to_string(),
			));
		}
		Ok(())
	}
}

/// Configuration of the command line synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
	pub explorer_url: String,
	pub currency: String,
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
	pub data_dir: PathBuf,
	pub receive_addresses: Vec<String>,
	#[serde(default)]
	pub change_addresses: Vec<String>,
	/// Decimal places used when logging amounts.
	#[serde(default = "default_decimals")]
	pub decimals: u32,
	pub synchronizer: SynchronizerConfig,
}

fn default_request_timeout_secs() -> u64 {
	30
}

fn default_decimals() -> u32 {
	8
}

impl AppConfig {
	pub async fn load(path: &Path) -> Result<Self, WalletSyncError> {
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			WalletSyncError::ConfigError(format!("Failed to read {:?}: {}", path, e))
		})?;
		let config = Self::from_json(&content)?;
		info!("Loaded configuration from {:?}", path);
		Ok(config)
	}

	pub fn from_json(content: &str) -> Result<Self, WalletSyncError> {
		let config: AppConfig = serde_json::from_str(content)
			.map_err(|e| WalletSyncError::ConfigError(format!("Invalid configuration: {}", e)))?;
		config.synchronizer.validate()?;
		Ok(config)
	}
}
