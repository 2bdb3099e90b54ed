use itertools::Itertools;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use wallet_account_sync::explorer::{Explorer, HttpExplorer};
use wallet_account_sync::network::bitcoin::{BitcoinLikeNetwork, Transaction};
use wallet_account_sync::utils::format_amount;
use wallet_account_sync::wallet::sync::{
	BlockchainDatabase, EventDispatcher, FileBlockchainDatabase, FileCheckpointRepository,
	InMemoryBlockchainDatabase, InMemoryPendingTransactions, LoggingEventHandler,
	PendingTransactionDatabase,
};
use wallet_account_sync::wallet::{
	AccountStorage, AccountSynchronizer, AppConfig, TrustLevel, UtxoSourceList, WalletSyncError,
	WatchOnlyKeychain,
};

const CONFIG_ENV: &str = "WALLET_SYNC_CONFIG";

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	if let Err(e) = run().await {
		error!("Account synchronization failed: {}", e);
		std::process::exit(1);
	}
}

async fn run() -> Result<(), WalletSyncError> {
	let config_path = std::env::args()
		.nth(1)
		.or_else(|| std::env::var(CONFIG_ENV).ok())
		.map(PathBuf::from)
		.ok_or_else(|| {
			WalletSyncError::ConfigError(format!(
				"usage: wallet-account-sync <config.json> (or set {})",
				CONFIG_ENV
			))
		})?;
	let config = AppConfig::load(&config_path).await?;

	info!("Starting account synchronization against {}", config.explorer_url);

	let explorer: Arc<dyn Explorer<BitcoinLikeNetwork>> = Arc::new(HttpExplorer::new(
		&config.explorer_url,
		&config.currency,
		Duration::from_secs(config.request_timeout_secs),
	)?);

	let receive = Arc::new(WatchOnlyKeychain::new(config.receive_addresses.clone()));
	let change = Arc::new(WatchOnlyKeychain::new(config.change_addresses.clone()));

	let stable_dir = config.data_dir.join("stable");
	let stable =
		Arc::new(FileBlockchainDatabase::<BitcoinLikeNetwork>::open(stable_dir.clone()).await?);
	let checkpoints = Arc::new(FileCheckpointRepository::new(stable_dir));
	let unstable = Arc::new(InMemoryBlockchainDatabase::<BitcoinLikeNetwork>::new());
	let pending = Arc::new(InMemoryPendingTransactions::<BitcoinLikeNetwork>::new());

	let events = Arc::new(EventDispatcher::new());
	events.register_handler(Arc::new(LoggingEventHandler));

	let synchronizer = AccountSynchronizer::new(
		explorer,
		AccountStorage {
			stable: stable.clone(),
			unstable: unstable.clone(),
			pending: pending.clone(),
			checkpoints,
		},
		receive.clone(),
		change.clone(),
		events,
		config.synchronizer.clone(),
	)?;

	let stats = synchronizer
		.synchronize()
		.await
		.map_err(|e| WalletSyncError::SyncError(e.to_string()))?;

	let mut transactions: Vec<Transaction> = Vec::new();
	for block in stable.get_blocks(0, u32::MAX).await? {
		transactions.extend(block.transactions);
	}
	for block in unstable.get_blocks(0, u32::MAX).await? {
		transactions.extend(block.transactions);
	}
	transactions.extend(pending.get_all().await?);

	let trust = transactions
		.iter()
		.map(|tx| {
			let height = tx.block.as_ref().map(|block| block.height);
			TrustLevel::compute(stats.tip_height, height, height.is_none())
		})
		.counts();
	info!("{} wallet transactions, trust levels {:?}", transactions.len(), trust);

	let utxos = UtxoSourceList::from_transactions(&transactions, |address| {
		receive.contains(address) || change.contains(address)
	});
	info!(
		"{} unspent outputs, balance {}",
		utxos.available.len(),
		format_amount(utxos.balance(), config.decimals)
	);
	if !utxos.spent.is_empty() {
		info!("{} spent outputs with unknown origin", utxos.spent.len());
	}

	Ok(())
}
