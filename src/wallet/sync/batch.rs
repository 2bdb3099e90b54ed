use crate::wallet::keychain::Keychain;

/// Whether a batch covers known-used addresses or looks past them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
	Regular,
	/// Addresses past the last known used one. Activity here pushes the discovery frontier.
	Gap,
}

/// Addresses sent together in one explorer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBatch {
	pub addresses: Vec<String>,
	/// Derivation index of the last address of the batch.
	pub last_address_index: u32,
	pub kind: BatchKind,
}

impl AddressBatch {
	/// Batch of `count` addresses of `keychain` starting at derivation index `start`.
	pub fn derive(keychain: &dyn Keychain, start: u32, count: u32, kind: BatchKind) -> Self {
		Self {
			addresses: keychain.addresses_in_range(start, count),
			last_address_index: (start + count).saturating_sub(1),
			kind,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.addresses.is_empty()
	}

	pub fn is_gap(&self) -> bool {
		self.kind == BatchKind::Gap
	}

	/// Same addresses, scanned as a plain continuation.
	pub fn continuation(&self) -> Self {
		Self {
			kind: BatchKind::Regular,
			..self.clone()
		}
	}

	/// Gap batch of `gap_size` addresses right after this one.
	pub fn next_gap(&self, keychain: &dyn Keychain, gap_size: u32) -> Self {
		Self::derive(
			keychain,
			self.last_address_index + 1,
			gap_size,
			BatchKind::Gap,
		)
	}
}

/// Initial batches of one chain: `[0, used)` in chunks of `batch_size`, then one gap batch of
/// `gap_size` addresses starting at `used`.
pub fn bootstrap(keychain: &dyn Keychain, batch_size: u32, gap_size: u32) -> Vec<AddressBatch> {
	let used = keychain.used_address_count();
	let mut batches = Vec::new();

	let mut start = 0;
	while start < used {
		let count = batch_size.min(used - start);
		batches.push(AddressBatch::derive(keychain, start, count, BatchKind::Regular));
		start += count;
	}
	batches.push(AddressBatch::derive(keychain, used, gap_size, BatchKind::Gap));

	batches
}
