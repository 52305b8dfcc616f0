//! Account management for txflow.
//!
//! An account is the signer half of a connector: it owns the key that
//! authorizes transactions and reports the address they are sent from. The
//! delivery layer uses the key to build the wallet its provider signs with.

use async_trait::async_trait;
use txflow_types::{Address, ImplementationRegistry, SecretString};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The configured key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Interface every account implementation provides.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Address transactions from this account are sent from.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Returns the private key with a 0x prefix.
	///
	/// Delivery implementations build their signing wallet from it.
	fn get_private_key(&self) -> SecretString;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Thin wrapper that owns the selected account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
