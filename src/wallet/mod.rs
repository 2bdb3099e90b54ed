pub mod config;
pub mod keychain;
pub mod sync;
pub mod trust;
pub mod types;
pub mod utxo;

pub use config::{AppConfig, SynchronizerConfig};
pub use keychain::{Keychain, WatchOnlyKeychain};
pub use sync::{AccountStorage, AccountSynchronizer};
pub use trust::TrustLevel;
pub use types::*;
pub use utxo::{UtxoKey, UtxoSourceList, UtxoValue};
