//! Address derivation chains as seen by the synchronizer.

use parking_lot::RwLock;
use std::collections::HashMap;

/// One derivation chain (receive or change) of an HD account.
///
/// Implementations are shared between concurrently running batches, so every method takes
/// `&self` and the implementation owns its locking.
pub trait Keychain: Send + Sync {
	/// Number of addresses known to be used, i.e. highest used index + 1.
	fn used_address_count(&self) -> u32;

	/// `count` consecutive addresses starting at derivation index `start`.
	fn addresses_in_range(&self, start: u32, count: u32) -> Vec<String>;

	/// Record that `address` received funds. Returns `true` if it belongs to this chain.
	fn mark_used(&self, address: &str) -> bool;
}

/// Keychain over a fixed, pre-derived list of addresses.
///
/// Used for watch-only accounts where derivation happens elsewhere. Indices past the end of the
/// list yield no address.
pub struct WatchOnlyKeychain {
	addresses: Vec<String>,
	index_of: HashMap<String, u32>,
	used: RwLock<u32>,
}

impl WatchOnlyKeychain {
	pub fn new(addresses: Vec<String>) -> Self {
		Self::with_used(addresses, 0)
	}

	/// Create a keychain where the first `used` addresses are already known to be used.
	pub fn with_used(addresses: Vec<String>, used: u32) -> Self {
		let index_of = addresses
			.iter()
			.enumerate()
			.map(|(index, address)| (address.clone(), index as u32))
			.collect();
		let used = used.min(addresses.len() as u32);
		Self {
			addresses,
			index_of,
			used: RwLock::new(used),
		}
	}

	pub fn len(&self) -> usize {
		self.addresses.len()
	}

	pub fn is_empty(&self) -> bool {
		self.addresses.is_empty()
	}

	pub fn contains(&self, address: &str) -> bool {
		self.index_of.contains_key(address)
	}
}

impl Keychain for WatchOnlyKeychain {
	fn used_address_count(&self) -> u32 {
		*self.used.read()
	}

	fn addresses_in_range(&self, start: u32, count: u32) -> Vec<String> {
		self.addresses
			.iter()
			.skip(start as usize)
			.take(count as usize)
			.cloned()
			.collect()
	}

	fn mark_used(&self, address: &str) -> bool {
		match self.index_of.get(address) {
			Some(&index) => {
				let mut used = self.used.write();
				*used = (*used).max(index + 1);
				true
			}
			None => false,
		}
	}
}
