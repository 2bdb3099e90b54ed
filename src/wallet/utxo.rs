//! Unspent output bookkeeping for Bitcoin-like accounts.

use crate::network::Amount;
use crate::network::bitcoin::Transaction;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Identifies one transaction output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoKey {
	pub tx_hash: String,
	pub output_index: u32,
}

impl UtxoKey {
	pub fn new(tx_hash: impl Into<String>, output_index: u32) -> Self {
		Self {
			tx_hash: tx_hash.into(),
			output_index,
		}
	}
}

/// Amount received on a given address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoValue {
	pub amount: Amount,
	pub address: String,
}

/// Outputs an account can spend, and spends it observed without knowing the funding output.
///
/// `spent` holds keys consumed by one of the account's transactions whose funding output has not
/// been seen (yet); it may come from another source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoSourceList {
	pub available: BTreeMap<UtxoKey, UtxoValue>,
	pub spent: BTreeSet<UtxoKey>,
}

impl UtxoSourceList {
	pub fn new(available: BTreeMap<UtxoKey, UtxoValue>, spent: BTreeSet<UtxoKey>) -> Self {
		Self { available, spent }
	}

	/// Build the list from an account's transactions, in any order.
	///
	/// `is_own` decides which output addresses belong to the account.
	pub fn from_transactions<'a, I, F>(transactions: I, is_own: F) -> Self
	where
		I: IntoIterator<Item = &'a Transaction>,
		F: Fn(&str) -> bool,
	{
		let mut list = Self::default();
		let mut consumed = BTreeSet::new();

		for tx in transactions {
			for input in &tx.inputs {
				if let (Some(hash), Some(index)) =
					(&input.previous_tx_hash, input.previous_output_index)
				{
					consumed.insert(UtxoKey::new(hash.clone(), index));
				}
			}
			for output in &tx.outputs {
				let Some(address) = output.address.as_deref() else {
					continue;
				};
				if !is_own(address) {
					continue;
				}
				let Ok(index) = u32::try_from(output.index) else {
					continue;
				};
				list.available.insert(
					UtxoKey::new(tx.hash.clone(), index),
					UtxoValue {
						amount: output.value,
						address: address.to_string(),
					},
				);
			}
		}

		for key in consumed {
			if list.available.remove(&key).is_none() {
				list.spent.insert(key);
			}
		}

		list
	}

	/// Sum of every available output.
	pub fn balance(&self) -> Amount {
		self.available
			.values()
			.fold(Amount::ZERO, |total, value| total.saturating_add(value.amount))
	}
}
