//! Chain identity and network view types.
//!
//! A client session is configured with a list of known chains and, once an
//! account is connected, reports the chain that account's provider is on.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A network the client may be connected to.
///
/// Chains are supplied by configuration and never change after the client
/// is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chain {
	/// EIP-155 chain id.
	pub id: u64,
	/// Display name used in user-facing messages (e.g. "Ethereum").
	pub name: String,
}

impl Chain {
	pub fn new(id: u64, name: impl Into<String>) -> Self {
		Self {
			id,
			name: name.into(),
		}
	}
}

impl fmt::Display for Chain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name, self.id)
	}
}

/// Snapshot of the connection state of a client session.
///
/// `chain` is `None` while no account is connected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Network {
	/// The chain the connected account is currently on.
	pub chain: Option<Chain>,
	/// Every chain the client was configured with.
	pub chains: Vec<Chain>,
}

impl Network {
	/// Returns the id of the active chain, if connected.
	pub fn active_chain_id(&self) -> Option<u64> {
		self.chain.as_ref().map(|chain| chain.id)
	}

	/// Returns the configured display name for `chain_id`.
	pub fn display_name(&self, chain_id: u64) -> String {
		chain_display_name(&self.chains, chain_id)
	}
}

/// Looks up the display name of a chain, falling back to `Chain <id>` when
/// the id is not among the configured chains.
pub fn chain_display_name(chains: &[Chain], chain_id: u64) -> String {
	chains
		.iter()
		.find(|chain| chain.id == chain_id)
		.map(|chain| chain.name.clone())
		.unwrap_or_else(|| format!("Chain {}", chain_id))
}

/// Configuration of a single chain.
///
/// `rpc_url` is only needed by delivery implementations that talk to a node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
	pub name: String,
	#[serde(default)]
	pub rpc_url: Option<String>,
}

/// Chain ids mapped to their configuration.
pub type ChainsConfig = HashMap<u64, ChainConfig>;

/// Deserializes `[chains.<id>]` tables.
///
/// TOML table keys are strings, so each key is parsed into a chain id.
pub fn deserialize_chains<'de, D>(deserializer: D) -> Result<ChainsConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, ChainConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}

/// Builds the chain list of a client from configuration, ordered by id.
pub fn chains_from_config(chains: &ChainsConfig) -> Vec<Chain> {
	let mut list: Vec<Chain> = chains
		.iter()
		.map(|(id, config)| Chain::new(*id, config.name.clone()))
		.collect();
	list.sort_by_key(|chain| chain.id);
	list
}
