//! Wallet account synchronization.
//!
//! Discovers the transaction history of an HD account through a remote explorer, with gap-limit
//! address discovery, and keeps a locally persisted, block-by-block view of it.

pub mod explorer;
pub mod network;
pub mod utils;
pub mod wallet;
