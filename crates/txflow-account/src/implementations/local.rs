//! Local private-key account.
//!
//! Holds a secp256k1 key in memory. Suitable for development chains and for
//! deployments where the key is injected through the environment.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use txflow_types::{
	Address, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString,
	ValidationError,
};

/// Private keys of the standard development accounts (the mnemonic
/// `test test ... junk`), funded by local development nodes.
pub const DEV_PRIVATE_KEYS: [&str; 3] = [
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
	"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
	"0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

/// Account backed by an in-memory private key.
pub struct LocalAccount {
	signer: PrivateKeySigner,
	private_key: SecretString,
}

impl LocalAccount {
	/// Parses a hex private key, with or without 0x prefix.
	pub fn new(private_key: &str) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key
			.parse()
			.map_err(|e| AccountError::InvalidKey(format!("{}", e)))?;
		let normalized = if private_key.starts_with("0x") {
			private_key.to_string()
		} else {
			format!("0x{}", private_key)
		};

		Ok(Self {
			signer,
			private_key: SecretString::new(normalized),
		})
	}

	/// Account `index` of the development key set.
	pub fn dev(index: usize) -> Result<Self, AccountError> {
		let key = DEV_PRIVATE_KEYS.get(index).ok_or_else(|| {
			AccountError::InvalidKey(format!("No development account at index {}", index))
		})?;
		Self::new(key)
	}
}

/// Configuration schema for the local account.
pub struct LocalAccountSchema;

impl ConfigSchema for LocalAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let digits = key.strip_prefix("0x").unwrap_or(key);
					match hex::decode(digits) {
						Ok(bytes) if bytes.len() == 32 => Ok(()),
						_ => Err("private key must be 32 bytes of hex".to_string()),
					}
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex private key (required)
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalAccountSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	let account = LocalAccount::new(private_key)?;
	tracing::debug!(address = %account.signer.address(), "Loaded local account");
	Ok(Box::new(account))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
