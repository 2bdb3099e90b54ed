//!
//! Utility module for the account synchronizer.
//!
//! Re-exports formatting helpers used when reporting balances.
/// Amount formatting for display
pub mod format;

pub use format::format_amount;
