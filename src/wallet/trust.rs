use serde::{Deserialize, Serialize};

/// Confirmations past which a transaction is considered final.
pub const TRUSTED_CONFIRMATION_DEPTH: u32 = 5;

/// How much an operation can be relied on, derived from chain position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
	Trusted,
	Untrusted,
	Pending,
	Dropped,
}

impl TrustLevel {
	/// Compute the trust level of a transaction.
	///
	/// `block_height` is `None` for unconfirmed transactions; `in_mempool` tells whether the
	/// explorer still reports such a transaction as pending.
	pub fn compute(current_height: u32, block_height: Option<u32>, in_mempool: bool) -> Self {
		match block_height {
			Some(height) if current_height > height.saturating_add(TRUSTED_CONFIRMATION_DEPTH) => {
				TrustLevel::Trusted
			}
			Some(height) if current_height > height => TrustLevel::Untrusted,
			Some(_) => TrustLevel::Pending,
			None if in_mempool => TrustLevel::Pending,
			None => TrustLevel::Dropped,
		}
	}
}
