//! Alloy-based EVM delivery implementation.
//!
//! Talks to a JSON-RPC node over HTTP. The provider is built with alloy's
//! recommended fillers and a wallet holding the connector's key, so signing
//! happens inside the provider at broadcast time.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::time::Duration;
use txflow_types::{
	Address, BroadcastOutcome, ChainsConfig, ConfigSchema, Field, FieldType,
	ImplementationRegistry, Schema, SecretString, TransactionReceipt, TransactionRequest, TxHash,
	ValidationError, U256,
};

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 7;
const DEFAULT_CONFIRMATION_TIMEOUT_SECONDS: u64 = 600;

/// Delivery over an alloy HTTP provider.
pub struct AlloyDelivery {
	provider: DynProvider,
	poll_interval: Duration,
	confirmation_timeout: Duration,
}

impl AlloyDelivery {
	/// Builds the provider for `rpc_url`, signing with `signer`.
	///
	/// No request is made here; an unreachable node surfaces on first use.
	pub fn new(
		rpc_url: &str,
		signer: PrivateKeySigner,
		poll_interval: Duration,
		confirmation_timeout: Duration,
	) -> Result<Self, DeliveryError> {
		let url: url::Url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Configuration(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

		let wallet = EthereumWallet::from(signer);
		let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);
		provider.client().set_poll_interval(poll_interval);

		Ok(Self {
			provider: provider.erased(),
			poll_interval,
			confirmation_timeout,
		})
	}
}

fn convert_receipt(receipt: &alloy::rpc::types::TransactionReceipt) -> TransactionReceipt {
	TransactionReceipt {
		hash: receipt.transaction_hash,
		block_number: receipt.block_number.unwrap_or(0),
		gas_used: receipt.gas_used,
		effective_gas_price: receipt.effective_gas_price,
		success: receipt.status(),
	}
}

/// Configuration schema for the alloy delivery.
pub struct AlloyDeliverySchema;

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"chain_id",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)],
			vec![
				Field::new(
					"poll_interval_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(60),
					},
				),
				Field::new(
					"confirmation_timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(3600),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	async fn chain_id(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain id: {}", e)))
	}

	async fn populate(
		&self,
		mut request: TransactionRequest,
	) -> Result<TransactionRequest, DeliveryError> {
		if request.chain_id.is_none() {
			request.set_chain_id(self.chain_id().await?);
		}

		if let (None, Some(from)) = (request.nonce, request.from) {
			let nonce = self
				.provider
				.get_transaction_count(from)
				.await
				.map_err(|e| DeliveryError::Rpc(e.to_string()))?;
			request.set_nonce(nonce);
		}

		if request.gas_price.is_none() && request.max_fee_per_gas.is_none() {
			let gas_price = self
				.provider
				.get_gas_price()
				.await
				.map_err(|e| DeliveryError::Rpc(e.to_string()))?;
			request.set_gas_price(gas_price);
		}

		if request.gas.is_none() {
			let gas = self
				.provider
				.estimate_gas(request.clone())
				.await
				.map_err(|e| DeliveryError::Rpc(e.to_string()))?;
			request.set_gas_limit(gas);
		}

		tracing::debug!(
			gas_limit = ?request.gas,
			gas_price = ?request.gas_price,
			nonce = ?request.nonce,
			"Populated transaction request"
		);
		Ok(request)
	}

	async fn broadcast(
		&self,
		request: TransactionRequest,
	) -> Result<BroadcastOutcome, DeliveryError> {
		let from = request.from.unwrap_or_default();
		let nonce = request.nonce;
		let gas_limit = request.gas.unwrap_or_default();
		let gas_price = request.gas_price.or(request.max_fee_per_gas);

		// The provider's wallet signs; node errors are passed through untouched.
		let pending_tx = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::Rpc(e.to_string()))?;

		Ok(BroadcastOutcome {
			hash: *pending_tx.tx_hash(),
			from,
			nonce,
			gas_limit,
			gas_price,
			block_number: None,
		})
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TxHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %hash,
			"Waiting for {} confirmations (timeout: {}s)",
			confirmations,
			self.confirmation_timeout.as_secs()
		);

		loop {
			if start_time.elapsed() > self.confirmation_timeout {
				return Err(DeliveryError::Network(format!(
					"Timeout waiting for {} confirmations after {} seconds",
					confirmations,
					self.confirmation_timeout.as_secs()
				)));
			}

			let receipt = match self.provider.get_transaction_receipt(*hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					return Err(DeliveryError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				},
			};

			let current_block = self.provider.get_block_number().await.map_err(|e| {
				DeliveryError::Network(format!("Failed to get block number: {}", e))
			})?;

			let tx_block = receipt.block_number.unwrap_or(current_block);
			let current_confirmations = (current_block + 1).saturating_sub(tx_block);

			if current_confirmations >= confirmations {
				return Ok(convert_receipt(&receipt));
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				confirmations.saturating_sub(current_confirmations)
			);
			tokio::time::sleep(self.poll_interval).await;
		}
	}

	async fn get_receipt(
		&self,
		hash: &TxHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		self.provider
			.get_transaction_receipt(*hash)
			.await
			.map(|receipt| receipt.as_ref().map(convert_receipt))
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))
	}

	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}
}

/// Factory function to create an HTTP delivery from configuration.
///
/// Configuration parameters:
/// - `chain_id` (required): chain whose `rpc_url` the provider connects to
/// - `poll_interval_seconds` (optional): receipt polling interval, default 7
/// - `confirmation_timeout_seconds` (optional): confirmation wait bound, default 600
pub fn create_http_delivery(
	config: &toml::Value,
	chains: &ChainsConfig,
	private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(e.to_string()))?;

	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| DeliveryError::Configuration("chain_id is required".to_string()))?
		as u64;

	let rpc_url = chains
		.get(&chain_id)
		.and_then(|chain| chain.rpc_url.as_deref())
		.ok_or_else(|| {
			DeliveryError::Configuration(format!("Chain {} has no rpc_url configured", chain_id))
		})?;

	let seconds = |key: &str, default: u64| {
		config
			.get(key)
			.and_then(|v| v.as_integer())
			.map(|v| v as u64)
			.unwrap_or(default)
	};
	let poll_interval = Duration::from_secs(seconds(
		"poll_interval_seconds",
		DEFAULT_POLL_INTERVAL_SECONDS,
	));
	let confirmation_timeout = Duration::from_secs(seconds(
		"confirmation_timeout_seconds",
		DEFAULT_CONFIRMATION_TIMEOUT_SECONDS,
	));

	let signer: PrivateKeySigner = private_key.with_exposed(|key| {
		key.parse()
			.map_err(|_| DeliveryError::Configuration("Invalid private key format".to_string()))
	})?;

	tracing::info!(chain_id, rpc_url, "Configured alloy delivery");
	let delivery = AlloyDelivery::new(rpc_url, signer, poll_interval, confirmation_timeout)?;
	Ok(Box::new(delivery))
}

/// Registry for the HTTP/Alloy delivery implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_http_delivery
	}
}

impl DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use txflow_account::implementations::local::DEV_PRIVATE_KEYS;
	use txflow_types::ChainConfig;

	fn chains(rpc_url: Option<&str>) -> ChainsConfig {
		let mut chains = ChainsConfig::new();
		chains.insert(
			1,
			ChainConfig {
				name: "Ethereum".to_string(),
				rpc_url: rpc_url.map(str::to_string),
			},
		);
		chains
	}

	fn key() -> SecretString {
		SecretString::from(DEV_PRIVATE_KEYS[0])
	}

	#[test]
	fn test_schema_requires_chain_id() {
		let config: toml::Value = toml::from_str("poll_interval_seconds = 2").unwrap();
		assert!(AlloyDeliverySchema.validate(&config).is_err());

		let config: toml::Value = toml::from_str("chain_id = 1").unwrap();
		assert!(AlloyDeliverySchema.validate(&config).is_ok());
	}

	#[test]
	fn test_factory_requires_rpc_url() {
		let config: toml::Value = toml::from_str("chain_id = 1").unwrap();
		let err = create_http_delivery(&config, &chains(None), &key())
			.err()
			.unwrap();
		assert!(err.to_string().contains("Chain 1 has no rpc_url configured"));
	}

	#[test]
	fn test_factory_rejects_invalid_url() {
		let config: toml::Value = toml::from_str("chain_id = 1").unwrap();
		let err = create_http_delivery(&config, &chains(Some("not a url")), &key())
			.err()
			.unwrap();
		assert!(err.to_string().contains("Invalid RPC URL"));
	}

	#[test]
	fn test_factory_rejects_invalid_key() {
		let config: toml::Value = toml::from_str("chain_id = 1").unwrap();
		let err = create_http_delivery(
			&config,
			&chains(Some("http://localhost:8545")),
			&SecretString::from("0xnothex"),
		)
		.err()
		.unwrap();
		assert!(err.to_string().contains("Invalid private key format"));
	}

	#[test]
	fn test_factory_builds_provider_without_connecting() {
		let config: toml::Value = toml::from_str("chain_id = 1\npoll_interval_seconds = 1").unwrap();
		assert!(create_http_delivery(&config, &chains(Some("http://localhost:8545")), &key()).is_ok());
	}
}
