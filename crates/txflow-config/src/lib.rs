//! Configuration module for txflow.
//!
//! Loads the client configuration from TOML: the client identity, the chains
//! the client knows about, and which account and delivery implementations a
//! connector is built from. Configuration is validated after parsing.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["chains.toml", "delivery.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

pub mod builders {
	pub mod config;
}
mod loader;

pub use builders::config::ConfigBuilder;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use txflow_types::{chains_from_config, deserialize_chains, Chain, ChainsConfig};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this client instance.
	pub client: ClientConfig,
	/// Chains the client may be connected to, keyed by chain id.
	#[serde(deserialize_with = "deserialize_chains")]
	pub chains: ChainsConfig,
	/// Account implementation the connector signs with.
	pub account: AccountConfig,
	/// Delivery implementation the connector submits through.
	pub delivery: DeliveryConfig,
}

/// Configuration specific to the client instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for delivery mechanisms.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of delivery implementation names to their configurations.
	/// Each implementation has its own configuration format stored as raw TOML values.
	pub implementations: HashMap<String, toml::Value>,
	/// Confirmations to wait for when the caller names none.
	#[serde(default = "default_confirmations")]
	pub min_confirmations: u64,
}

fn default_confirmations() -> u64 {
	1
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Configured chains ordered by id.
	pub fn chain_list(&self) -> Vec<Chain> {
		chains_from_config(&self.chains)
	}

	/// Raw table of the primary account implementation.
	pub fn primary_account(&self) -> Result<(&str, &toml::Value), ConfigError> {
		primary_entry("account", &self.account.primary, &self.account.implementations)
	}

	/// Raw table of the primary delivery implementation.
	pub fn primary_delivery(&self) -> Result<(&str, &toml::Value), ConfigError> {
		primary_entry(
			"delivery",
			&self.delivery.primary,
			&self.delivery.implementations,
		)
	}

	/// Checks the cross-section rules serde cannot express.
	///
	/// Implementation tables are not inspected here; each implementation
	/// validates its own table against its schema when it is built.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client.id.is_empty() {
			return Err(ConfigError::Validation("Client ID cannot be empty".into()));
		}

		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one chain must be configured".into(),
			));
		}
		for (chain_id, chain) in &self.chains {
			if chain.name.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Chain {} must have a name",
					chain_id
				)));
			}
		}

		if self.account.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one account implementation required".into(),
			));
		}
		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		if self.delivery.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one delivery implementation required".into(),
			));
		}
		if !self
			.delivery
			.implementations
			.contains_key(&self.delivery.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary delivery '{}' not found in implementations",
				self.delivery.primary
			)));
		}
		if self.delivery.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"min_confirmations must be at least 1".into(),
			));
		}
		if self.delivery.min_confirmations > 100 {
			return Err(ConfigError::Validation(
				"min_confirmations cannot exceed 100".into(),
			));
		}

		Ok(())
	}
}

fn primary_entry<'a>(
	section: &str,
	primary: &'a str,
	implementations: &'a HashMap<String, toml::Value>,
) -> Result<(&'a str, &'a toml::Value), ConfigError> {
	implementations
		.get(primary)
		.map(|table| (primary, table))
		.ok_or_else(|| {
			ConfigError::Validation(format!(
				"Primary {} '{}' not found in implementations",
				section, primary
			))
		})
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
