//! Transaction delivery for txflow.
//!
//! This crate is the boundary with the Ethereum client library. A delivery
//! implementation reports the chain its provider is on, populates transaction
//! requests (gas, fees, nonce), broadcasts them and tracks their receipts.
//! Nothing above this crate signs or talks to a node directly.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use txflow_types::{
	Address, BroadcastOutcome, ChainsConfig, ImplementationRegistry, SecretString,
	TransactionReceipt, TransactionRequest, TxHash, U256,
};

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The node rejected a call; the node's message is kept verbatim.
	#[error("{0}")]
	Rpc(String),
	/// Error that occurs when the implementation configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface every delivery implementation provides.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Chain id the underlying provider is connected to.
	async fn chain_id(&self) -> Result<u64, DeliveryError>;

	/// Fills the fields a request needs before broadcast.
	///
	/// Sets chain id, nonce (when `from` is known), gas price and gas limit,
	/// leaving fields the caller already set untouched. Nothing is sent.
	async fn populate(
		&self,
		request: TransactionRequest,
	) -> Result<TransactionRequest, DeliveryError>;

	/// Signs and submits a request to the network.
	async fn broadcast(
		&self,
		request: TransactionRequest,
	) -> Result<BroadcastOutcome, DeliveryError>;

	/// Waits until the transaction has `confirmations` blocks, counting the
	/// block that includes it.
	async fn wait_for_confirmation(
		&self,
		hash: &TxHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Returns the receipt if the transaction has been mined.
	async fn get_receipt(&self, hash: &TxHash)
		-> Result<Option<TransactionReceipt>, DeliveryError>;

	/// Native balance of an address in wei.
	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError>;

	/// Latest block number.
	async fn get_block_number(&self) -> Result<u64, DeliveryError>;
}

/// Type alias for delivery factory functions.
///
/// Factories receive their own implementation table, the configured chains and
/// the private key of the account they sign for.
pub type DeliveryFactory = fn(
	&toml::Value,
	&ChainsConfig,
	&SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Get all registered delivery implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::{evm::alloy, memory};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service wrapping the delivery implementation of one connector.
///
/// Carries the default confirmation count used when a caller waits on a
/// transaction without naming one.
#[derive(Clone)]
pub struct DeliveryService {
	implementation: Arc<dyn DeliveryInterface>,
	min_confirmations: u64,
}

impl DeliveryService {
	pub fn new(implementation: Box<dyn DeliveryInterface>, min_confirmations: u64) -> Self {
		Self {
			implementation: Arc::from(implementation),
			min_confirmations,
		}
	}

	pub fn min_confirmations(&self) -> u64 {
		self.min_confirmations
	}

	pub async fn chain_id(&self) -> Result<u64, DeliveryError> {
		self.implementation.chain_id().await
	}

	pub async fn populate(
		&self,
		request: TransactionRequest,
	) -> Result<TransactionRequest, DeliveryError> {
		self.implementation.populate(request).await
	}

	/// Submits a request through the implementation.
	pub async fn broadcast(
		&self,
		request: TransactionRequest,
	) -> Result<BroadcastOutcome, DeliveryError> {
		let outcome = self.implementation.broadcast(request).await?;
		tracing::info!(
			tx_hash = %outcome.hash,
			from = %outcome.from,
			gas_limit = outcome.gas_limit,
			"Broadcast transaction"
		);
		Ok(outcome)
	}

	pub async fn confirm(
		&self,
		hash: &TxHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.implementation
			.wait_for_confirmation(hash, confirmations)
			.await
	}

	/// Waits using the configured default confirmation count.
	pub async fn confirm_with_default(
		&self,
		hash: &TxHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.confirm(hash, self.min_confirmations).await
	}

	pub async fn get_receipt(
		&self,
		hash: &TxHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		self.implementation.get_receipt(hash).await
	}

	pub async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.implementation.get_balance(address).await
	}
}
