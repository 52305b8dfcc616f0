//! Configuration builder for tests and local development.

use crate::{AccountConfig, ClientConfig, Config, DeliveryConfig};
use std::collections::HashMap;
use txflow_types::{ChainConfig, ChainsConfig};

/// First development account key, funded by the memory chain.
const DEV_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to a single "Ethereum" chain (id 1), the `local` account with the
/// first development key, and the `memory` delivery on chain 1.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	client_id: String,
	chains: ChainsConfig,
	private_key: String,
	delivery_primary: String,
	delivery_table: toml::Table,
	min_confirmations: u64,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut chains = ChainsConfig::new();
		chains.insert(
			1,
			ChainConfig {
				name: "Ethereum".to_string(),
				rpc_url: None,
			},
		);

		let mut delivery_table = toml::Table::new();
		delivery_table.insert("chain_id".to_string(), toml::Value::Integer(1));

		Self {
			client_id: "test-client".to_string(),
			chains,
			private_key: DEV_PRIVATE_KEY.to_string(),
			delivery_primary: "memory".to_string(),
			delivery_table,
			min_confirmations: 1,
		}
	}

	pub fn client_id(mut self, id: impl Into<String>) -> Self {
		self.client_id = id.into();
		self
	}

	/// Adds or replaces a chain.
	pub fn chain(mut self, id: u64, name: impl Into<String>, rpc_url: Option<String>) -> Self {
		self.chains.insert(
			id,
			ChainConfig {
				name: name.into(),
				rpc_url,
			},
		);
		self
	}

	/// Sets the key of the `local` account.
	pub fn private_key(mut self, key: impl Into<String>) -> Self {
		self.private_key = key.into();
		self
	}

	/// Selects the delivery implementation and its table.
	pub fn delivery(mut self, primary: impl Into<String>, table: toml::Table) -> Self {
		self.delivery_primary = primary.into();
		self.delivery_table = table;
		self
	}

	pub fn min_confirmations(mut self, confirmations: u64) -> Self {
		self.min_confirmations = confirmations;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut account_table = toml::Table::new();
		account_table.insert(
			"private_key".to_string(),
			toml::Value::String(self.private_key),
		);

		Config {
			client: ClientConfig { id: self.client_id },
			chains: self.chains,
			account: AccountConfig {
				primary: "local".to_string(),
				implementations: HashMap::from([(
					"local".to_string(),
					toml::Value::Table(account_table),
				)]),
			},
			delivery: DeliveryConfig {
				primary: self.delivery_primary.clone(),
				implementations: HashMap::from([(
					self.delivery_primary,
					toml::Value::Table(self.delivery_table),
				)]),
				min_confirmations: self.min_confirmations,
			},
		}
	}
}
