//! Explorer integration module
//!
//! This module defines the contract the synchronizer relies on to read account history from a
//! remote blockchain explorer, and ships an HTTP client for Ledger-style v2 explorers.

/// REST client for the blockchain explorer
mod client;
/// Explorer contract, wire types and errors
mod types;

pub use client::HttpExplorer;
pub use types::*;
