//!
//! REST client for a Ledger-style v2 blockchain explorer.
//!
//! The explorer indexes transactions by address. Address history is queried in batches, starting
//! at a block hash, and the explorer may cut a response short (`truncated`) when too many
//! transactions match. All methods are async and designed for use with Tokio.

use super::types::*;
use crate::network::bitcoin::{BitcoinLikeNetwork, Block, Transaction};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP explorer client for Bitcoin-like currencies
#[derive(Clone)]
pub struct HttpExplorer {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the explorer, without trailing slash.
	base_url: String,
	/// Currency path segment (`btc`, `ltc`, ...).
	currency: String,
}

impl HttpExplorer {
	/// Create a new explorer client.
	///
	/// # Arguments
	/// * `base_url` - Root URL of the explorer service.
	/// * `currency` - Currency identifier used in the request paths.
	/// * `timeout` - Per-request timeout.
	pub fn new(base_url: &str, currency: &str, timeout: Duration) -> Result<Self, ExplorerError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
			currency: currency.to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!(
			"{}/blockchain/v2/{}/{}",
			self.base_url, self.currency, path
		)
	}

	/// Perform a GET request and decode the JSON body.
	///
	/// Returns `Ok(None)` on 404 so callers can map it to "not found".
	async fn get_json<T: DeserializeOwned>(
		&self,
		url: &str,
		query: &[(&str, &str)],
	) -> Result<Option<T>, ExplorerError> {
		debug!("GET {}", url);

		let response = self.http_client.get(url).query(query).send().await?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let body = response.text().await.unwrap_or_default();
			return Err(ExplorerError::StatusError { status, body });
		}

		let body = response.bytes().await?;
		Ok(Some(serde_json::from_slice(&body)?))
	}
}

#[async_trait::async_trait]
impl Explorer<BitcoinLikeNetwork> for HttpExplorer {
	async fn get_transactions(
		&self,
		addresses: &[String],
		from_block_hash: Option<&str>,
	) -> Result<TransactionBulk<Transaction>, ExplorerError> {
		if addresses.is_empty() {
			return Ok(TransactionBulk::empty());
		}

		let url = self.url(&format!("addresses/{}/transactions", addresses.join(",")));
		let mut query = vec![("noToken", "true")];
		if let Some(hash) = from_block_hash {
			query.push(("blockHash", hash));
		}

		let response: TransactionsResponse = self
			.get_json(&url, &query)
			.await?
			.ok_or_else(|| match from_block_hash {
				Some(hash) => ExplorerError::BlockNotFound(hash.to_string()),
				None => ExplorerError::NoData,
			})?;

		debug!(
			"Explorer returned {} transactions for {} addresses (truncated: {})",
			response.txs.len(),
			addresses.len(),
			response.truncated
		);

		Ok(TransactionBulk::new(
			response.txs.into_iter().map(Transaction::from).collect(),
			response.truncated,
		))
	}

	async fn get_current_block(&self) -> Result<Block, ExplorerError> {
		let block: ExplorerBlock = self
			.get_json(&self.url("blocks/current"), &[])
			.await?
			.ok_or(ExplorerError::NoData)?;
		Ok(block.into())
	}

	async fn get_block(&self, height: u32) -> Result<Option<Block>, ExplorerError> {
		let block: Option<ExplorerBlock> = self
			.get_json(&self.url(&format!("blocks/{}", height)), &[])
			.await?;
		Ok(block.map(Block::from))
	}

	async fn get_pending_transactions(
		&self,
		addresses: &[String],
	) -> Result<Vec<Transaction>, ExplorerError> {
		if addresses.is_empty() {
			return Ok(Vec::new());
		}

		let url = self.url(&format!(
			"addresses/{}/transactions/pending",
			addresses.join(",")
		));
		let txs: Vec<ExplorerTransaction> =
			self.get_json(&url, &[]).await?.unwrap_or_default();

		Ok(txs.into_iter().map(Transaction::from).collect())
	}
}
