mod common;

use common::*;
use std::collections::BTreeSet;
use std::sync::Arc;

use wallet_account_sync::explorer::{Explorer, ExplorerError, TransactionBulk};
use wallet_account_sync::network::bitcoin::BitcoinLikeNetwork;
use wallet_account_sync::wallet::keychain::{Keychain, WatchOnlyKeychain};
use wallet_account_sync::wallet::sync::{
	BlockchainDatabase, BlocksSynchronizer, EventDispatcher, FileBlockchainDatabase, WindowKind,
};
use wallet_account_sync::wallet::{SynchronizerConfig, WalletSyncError};

struct Harness {
	explorer: Arc<FakeExplorer>,
	receive: Arc<WatchOnlyKeychain>,
	db: Arc<RecordingDatabase>,
	synchronizer: BlocksSynchronizer<BitcoinLikeNetwork>,
}

fn harness(
	explorer: FakeExplorer,
	receive: WatchOnlyKeychain,
	change: WatchOnlyKeychain,
	config: &SynchronizerConfig,
) -> Harness {
	let explorer = Arc::new(explorer);
	harness_over(explorer.clone(), explorer, receive, change, config)
}

/// Same as `harness`, with every explorer answer delayed by one executor turn.
fn yielding_harness(
	explorer: FakeExplorer,
	receive: WatchOnlyKeychain,
	change: WatchOnlyKeychain,
	config: &SynchronizerConfig,
) -> Harness {
	let explorer = Arc::new(explorer);
	let yielding = Arc::new(YieldingExplorer(explorer.clone()));
	harness_over(explorer, yielding, receive, change, config)
}

fn harness_over(
	explorer: Arc<FakeExplorer>,
	transport: Arc<dyn Explorer<BitcoinLikeNetwork>>,
	receive: WatchOnlyKeychain,
	change: WatchOnlyKeychain,
	config: &SynchronizerConfig,
) -> Harness {
	let receive = Arc::new(receive);
	let db = Arc::new(RecordingDatabase::default());
	let synchronizer = BlocksSynchronizer::new(
		transport,
		receive.clone(),
		Arc::new(change),
		db.clone(),
		Arc::new(EventDispatcher::new()),
		WindowKind::Stable,
		config,
	);
	Harness {
		explorer,
		receive,
		db,
		synchronizer,
	}
}

fn no_change() -> WatchOnlyKeychain {
	numeric_keychain("c", 0, 0)
}

fn addresses(prefix: &str, range: std::ops::Range<u32>) -> Vec<String> {
	range.map(|i| format!("{}{}", prefix, i)).collect()
}

#[tokio::test]
async fn test_single_transaction_in_three_block_window() {
	let explorer = FakeExplorer::new(102, 100)
		.with_transactions(vec![payment("t101", Some(101), &["r0"])]);
	let h = harness(
		explorer,
		numeric_keychain("r", 10, 2),
		no_change(),
		&config(0, 2, 2, 100),
	);

	let stats = h
		.synchronizer
		.synchronize(Some(&block_hash(100)), 100, 102)
		.await
		.unwrap();

	let requests = h.explorer.requests();
	assert_eq!(requests.len(), 2);
	let queried: BTreeSet<Vec<String>> = requests.iter().map(|r| r.addresses.clone()).collect();
	assert!(queried.contains(&addresses("r", 0..2)));
	assert!(queried.contains(&addresses("r", 2..4)));
	assert!(
		requests
			.iter()
			.all(|r| r.from_block_hash.as_deref() == Some("block-100"))
	);

	assert_eq!(h.db.added_heights(), vec![101]);
	assert_eq!(stats.blocks_written, 1);
	assert_eq!(stats.explorer_requests, 2);
}

#[tokio::test]
async fn test_window_without_activity_writes_nothing() {
	let explorer = FakeExplorer::new(50, 100)
		.with_transactions(vec![payment("elsewhere", Some(20), &["stranger"])]);
	let h = harness(
		explorer,
		numeric_keychain("r", 30, 4),
		numeric_keychain("c", 30, 1),
		&config(0, 2, 5, 100),
	);

	let stats = h
		.synchronizer
		.synchronize(Some(&block_hash(0)), 0, 50)
		.await
		.unwrap();

	assert!(h.db.added_heights().is_empty());
	assert_eq!(stats.blocks_written, 0);
	assert_eq!(h.receive.used_address_count(), 4);
}

#[tokio::test]
async fn test_gap_batch_activity_pushes_frontier() {
	let explorer =
		FakeExplorer::new(10, 100).with_transactions(vec![payment("t5", Some(5), &["r5"])]);
	let h = harness(
		explorer,
		numeric_keychain("r", 60, 0),
		no_change(),
		&config(0, 20, 20, 100),
	);

	h.synchronizer
		.synchronize(Some(&block_hash(0)), 0, 10)
		.await
		.unwrap();

	let requests = h.explorer.requests();
	assert_eq!(requests.len(), 2);
	assert_eq!(requests[0].addresses, addresses("r", 0..20));
	assert_eq!(requests[1].addresses, addresses("r", 20..40));
	assert_eq!(requests[1].from_block_hash.as_deref(), Some("block-5"));
	assert_eq!(h.receive.used_address_count(), 6);
	assert_eq!(h.db.added_heights(), vec![5]);
}

#[tokio::test]
async fn test_truncated_response_continues_after_last_full_height() {
	let explorer = FakeExplorer::new(20, 2).with_transactions(vec![
		payment("t10", Some(10), &["r0"]),
		payment("t11", Some(11), &["r0"]),
		payment("t12", Some(12), &["r0"]),
	]);
	let h = harness(
		explorer,
		numeric_keychain("r", 10, 1),
		no_change(),
		&config(0, 2, 2, 2),
	);

	h.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap();

	let counts = h.db.add_counts();
	assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![(10, 1), (11, 1), (12, 1)]);

	let stored = h.db.stored().await;
	assert!(stored.iter().all(|block| block.transactions.len() == 1));
	assert!(
		h.explorer
			.requests()
			.iter()
			.any(|r| r.from_block_hash.as_deref() == Some("block-11"))
	);
}

#[tokio::test]
async fn test_truncated_gap_batch_spawns_gap_and_plain_continuations() {
	let explorer = FakeExplorer::new(20, 2).with_transactions(vec![
		payment("t10", Some(10), &["r0"]),
		payment("t11", Some(11), &["r1"]),
		payment("t12", Some(12), &["r0"]),
	]);
	let h = harness(
		explorer,
		numeric_keychain("r", 20, 0),
		no_change(),
		&config(0, 2, 2, 2),
	);

	h.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap();

	let requests = h.explorer.requests();
	assert_eq!(requests.len(), 3);
	assert_eq!(requests[0].addresses, addresses("r", 0..2));
	let follow_ups: BTreeSet<(Vec<String>, Option<String>)> = requests[1..]
		.iter()
		.map(|r| (r.addresses.clone(), r.from_block_hash.clone()))
		.collect();
	let expected: BTreeSet<(Vec<String>, Option<String>)> = [
		(addresses("r", 2..4), Some(block_hash(10))),
		(addresses("r", 0..2), Some(block_hash(11))),
	]
	.into_iter()
	.collect();
	assert_eq!(follow_ups, expected);

	assert_eq!(
		h.db.add_counts().into_iter().collect::<Vec<_>>(),
		vec![(10, 1), (11, 1), (12, 1)]
	);
	assert_eq!(h.receive.used_address_count(), 2);
}

#[tokio::test]
async fn test_gap_discovery_recurses_while_gap_batches_find_activity() {
	let explorer = FakeExplorer::new(10, 100).with_transactions(vec![
		payment("t3", Some(3), &["r2"]),
		payment("t5", Some(5), &["r7"]),
		payment("t8", Some(8), &["r12"]),
	]);
	let h = harness(
		explorer,
		numeric_keychain("r", 30, 0),
		no_change(),
		&config(0, 5, 5, 100),
	);

	h.synchronizer
		.synchronize(Some(&block_hash(0)), 0, 10)
		.await
		.unwrap();

	let requests: Vec<(Vec<String>, Option<String>)> = h
		.explorer
		.requests()
		.into_iter()
		.map(|r| (r.addresses, r.from_block_hash))
		.collect();
	assert_eq!(
		requests,
		vec![
			(addresses("r", 0..5), Some(block_hash(0))),
			(addresses("r", 5..10), Some(block_hash(3))),
			(addresses("r", 10..15), Some(block_hash(5))),
			(addresses("r", 15..20), Some(block_hash(8))),
		]
	);
	assert_eq!(h.receive.used_address_count(), 13);
	assert_eq!(h.db.added_heights(), vec![3, 5, 8]);
}

#[tokio::test]
async fn test_truncated_single_height_is_fatal() {
	let explorer = FakeExplorer::new(20, 100);
	explorer.push_scripted(TransactionBulk::new(
		vec![payment("t10", Some(10), &["r0"])],
		true,
	));
	let h = harness(
		explorer,
		numeric_keychain("r", 10, 0),
		no_change(),
		&config(0, 2, 2, 100),
	);

	let err = h
		.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap_err();

	assert!(err.is_protocol_violation());
	assert!(h.db.added_heights().is_empty());
}

#[tokio::test]
async fn test_result_below_window_is_fatal() {
	let explorer = FakeExplorer::new(20, 100);
	explorer.push_scripted(TransactionBulk::new(
		vec![
			payment("t5", Some(5), &["r0"]),
			payment("t12", Some(12), &["r0"]),
		],
		false,
	));
	let h = harness(
		explorer,
		numeric_keychain("r", 10, 0),
		no_change(),
		&config(0, 2, 2, 100),
	);

	let err = h
		.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap_err();

	assert!(err.is_protocol_violation());
	assert_eq!(h.receive.used_address_count(), 0);
}

#[tokio::test]
async fn test_transport_failure_fails_the_window() {
	let explorer = FakeExplorer::new(20, 100)
		.with_transactions(vec![payment("t12", Some(12), &["r0"])]);
	explorer.set_failing(true);
	let h = harness(
		explorer,
		numeric_keychain("r", 10, 2),
		no_change(),
		&config(0, 2, 2, 100),
	);

	let err = h
		.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		WalletSyncError::ExplorerError(ExplorerError::Transport(_))
	));
}

#[tokio::test]
async fn test_heights_finalized_before_a_failure_are_flushed() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("stable");
	let db = Arc::new(
		FileBlockchainDatabase::<BitcoinLikeNetwork>::open(path.clone())
			.await
			.unwrap(),
	);

	let explorer = Arc::new(FakeExplorer::new(20, 2));
	explorer.push_scripted(TransactionBulk::new(
		vec![
			payment("t10", Some(10), &["r0"]),
			payment("t11", Some(11), &["r0"]),
		],
		true,
	));
	explorer.push_scripted(TransactionBulk::new(
		vec![payment("t5", Some(5), &["r1"])],
		false,
	));
	let synchronizer = BlocksSynchronizer::new(
		explorer,
		Arc::new(numeric_keychain("r", 2, 2)),
		Arc::new(no_change()),
		db,
		Arc::new(EventDispatcher::new()),
		WindowKind::Stable,
		&config(0, 2, 2, 2),
	);

	let err = synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap_err();
	assert!(err.is_protocol_violation());

	let reopened = FileBlockchainDatabase::<BitcoinLikeNetwork>::open(path)
		.await
		.unwrap();
	let durable: Vec<u32> = reopened
		.get_blocks(0, u32::MAX)
		.await
		.unwrap()
		.iter()
		.map(|block| block.header.height)
		.collect();
	assert_eq!(durable, vec![10]);
}

fn activity_across_chains() -> FakeExplorer {
	FakeExplorer::new(20, 2).with_transactions(vec![
		payment("a", Some(12), &["r0", "r3"]),
		payment("b", Some(12), &["c1"]),
		payment("c", Some(13), &["r5"]),
		payment("d", Some(15), &["r1"]),
		payment("e", Some(15), &["r2"]),
		payment("f", Some(15), &["r4"]),
		payment("g", Some(16), &["r0"]),
	])
}

async fn assert_each_height_written_once(h: Harness) {
	let stats = h
		.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap();

	assert!(h.db.add_counts().values().all(|count| *count == 1));

	let stored: Vec<(u32, BTreeSet<String>)> = h
		.db
		.stored()
		.await
		.into_iter()
		.map(|block| {
			(
				block.header.height,
				block.transactions.into_iter().map(|tx| tx.hash).collect(),
			)
		})
		.collect();
	let expected: Vec<(u32, BTreeSet<String>)> = vec![
		(12, ["a", "b"].iter().map(|s| s.to_string()).collect()),
		(13, ["c"].iter().map(|s| s.to_string()).collect()),
		(15, ["d", "e", "f"].iter().map(|s| s.to_string()).collect()),
		(16, ["g"].iter().map(|s| s.to_string()).collect()),
	];
	assert_eq!(stored, expected);
	assert_eq!(stats.blocks_written, 4);
	assert_eq!(stats.transactions_written, 7);
}

#[tokio::test]
async fn test_each_height_is_written_once_across_batches_and_chains() {
	let h = harness(
		activity_across_chains(),
		numeric_keychain("r", 20, 6),
		numeric_keychain("c", 10, 2),
		&config(0, 2, 3, 2),
	);
	assert_each_height_written_once(h).await;
}

#[tokio::test]
async fn test_each_height_is_written_once_with_interleaved_batches() {
	let h = yielding_harness(
		activity_across_chains(),
		numeric_keychain("r", 20, 6),
		numeric_keychain("c", 10, 2),
		&config(0, 2, 3, 2),
	);
	assert_each_height_written_once(h).await;
}

#[tokio::test]
async fn test_interleaved_gap_discovery_matches_sequential() {
	let transactions = vec![
		payment("t10", Some(10), &["r0"]),
		payment("t11", Some(11), &["r1"]),
		payment("t12", Some(12), &["r0"]),
		payment("t14", Some(14), &["r3"]),
		payment("t17", Some(17), &["c1"]),
	];
	let h = yielding_harness(
		FakeExplorer::new(20, 2).with_transactions(transactions),
		numeric_keychain("r", 20, 0),
		numeric_keychain("c", 20, 0),
		&config(0, 2, 2, 2),
	);

	h.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 20)
		.await
		.unwrap();

	assert!(h.db.add_counts().values().all(|count| *count == 1));
	let stored: Vec<(u32, usize)> = h
		.db
		.stored()
		.await
		.iter()
		.map(|block| (block.header.height, block.transactions.len()))
		.collect();
	assert_eq!(stored, vec![(10, 1), (11, 1), (12, 1), (14, 1), (17, 1)]);
	assert_eq!(h.receive.used_address_count(), 4);
}

#[tokio::test]
async fn test_empty_window_and_empty_keychains_are_vacuous() {
	let h = harness(
		FakeExplorer::new(20, 100),
		numeric_keychain("r", 0, 0),
		no_change(),
		&config(0, 2, 2, 100),
	);

	h.synchronizer
		.synchronize(Some(&block_hash(15)), 15, 10)
		.await
		.unwrap();
	h.synchronizer
		.synchronize(Some(&block_hash(10)), 10, 15)
		.await
		.unwrap();

	assert!(h.explorer.requests().is_empty());
	assert!(h.db.added_heights().is_empty());
}
