use crate::explorer::ExplorerError;

/// Error types for account synchronization
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	/// The explorer request itself failed.
	#[error("Explorer error: {0}")]
	ExplorerError(#[from] ExplorerError),

	/// The explorer answered with data breaking its contract.
	#[error("Explorer protocol violation: {0}")]
	ProtocolViolation(String),

	#[error("Storage error: {0}")]
	StorageError(String),

	#[error("Serialization error: {0}")]
	SerializationError(#[from] bincode::Error),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("Sync error: {0}")]
	SyncError(String),
}

impl WalletSyncError {
	/// Whether this error means the explorer cannot be trusted for the current pass.
	pub fn is_protocol_violation(&self) -> bool {
		matches!(self, WalletSyncError::ProtocolViolation(_))
	}
}
