//! In-memory development chain.
//!
//! An automining chain kept entirely in process: every accepted transaction is
//! mined into its own block before `broadcast` returns. Only native value
//! transfers are executed; calldata is charged for but not run. Useful for
//! tests and for trying the CLI without a node.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use alloy::consensus::{SignableTransaction, TxLegacy};
use alloy::network::TransactionBuilder;
use alloy::primitives::{keccak256, TxKind};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use txflow_account::implementations::local::DEV_PRIVATE_KEYS;
use txflow_types::{
	Address, BroadcastOutcome, ChainsConfig, ConfigSchema, Field, FieldType,
	ImplementationRegistry, Schema, SecretString, TransactionReceipt, TransactionRequest, TxHash,
	ValidationError, U256,
};

/// Base cost of every transaction.
pub const TX_BASE_GAS: u64 = 21_000;
const TX_CREATE_GAS: u64 = 32_000;
const TX_DATA_ZERO_GAS: u64 = 4;
const TX_DATA_NON_ZERO_GAS: u64 = 16;

const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;
const WEI_PER_GWEI: u128 = 1_000_000_000;
const DEFAULT_CHAIN_ID: u64 = 1;
const DEFAULT_BALANCE_ETH: u64 = 10_000;
const DEFAULT_GAS_PRICE_GWEI: u64 = 1;

/// Gas charged for a request before any execution: the base cost, calldata
/// bytes, and the creation surcharge when there is no recipient.
pub fn intrinsic_gas(request: &TransactionRequest) -> u64 {
	let data_gas: u64 = request
		.input
		.input()
		.map(|data| {
			data.iter()
				.map(|byte| {
					if *byte == 0 {
						TX_DATA_ZERO_GAS
					} else {
						TX_DATA_NON_ZERO_GAS
					}
				})
				.sum()
		})
		.unwrap_or(0);
	let create_gas = if request.to.is_none() { TX_CREATE_GAS } else { 0 };
	TX_BASE_GAS + data_gas + create_gas
}

#[derive(Default)]
struct ChainState {
	balances: HashMap<Address, U256>,
	nonces: HashMap<Address, u64>,
	block_number: u64,
	receipts: HashMap<TxHash, TransactionReceipt>,
}

/// Automining in-process chain.
pub struct MemoryDelivery {
	chain_id: u64,
	gas_price: u128,
	state: RwLock<ChainState>,
}

impl MemoryDelivery {
	/// Creates a chain where every address in `funded` starts with `balance`.
	pub fn new(chain_id: u64, gas_price: u128, funded: &[Address], balance: U256) -> Self {
		let balances = funded.iter().map(|address| (*address, balance)).collect();
		Self {
			chain_id,
			gas_price,
			state: RwLock::new(ChainState {
				balances,
				..Default::default()
			}),
		}
	}

	/// Chain `chain_id` funding the development accounts with 10 000 ETH each
	/// at a 1 gwei gas price.
	pub fn with_dev_accounts(chain_id: u64) -> Self {
		Self::new(
			chain_id,
			DEFAULT_GAS_PRICE_GWEI as u128 * WEI_PER_GWEI,
			&dev_addresses(),
			U256::from(DEFAULT_BALANCE_ETH) * U256::from(WEI_PER_ETHER),
		)
	}

	/// Gas price every populated request is given.
	pub fn gas_price(&self) -> u128 {
		self.gas_price
	}

	fn rejected(message: impl Into<String>) -> DeliveryError {
		DeliveryError::Rpc(message.into())
	}
}

/// Addresses of the development accounts.
pub fn dev_addresses() -> Vec<Address> {
	DEV_PRIVATE_KEYS
		.iter()
		.filter_map(|key| key.parse::<PrivateKeySigner>().ok())
		.map(|signer| signer.address())
		.collect()
}

/// Configuration schema for the memory delivery.
pub struct MemoryDeliverySchema;

impl ConfigSchema for MemoryDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new("funded_accounts", FieldType::Array(Box::new(FieldType::Address))),
				Field::new(
					"balance_eth",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new(
					"gas_price_gwei",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for MemoryDelivery {
	async fn chain_id(&self) -> Result<u64, DeliveryError> {
		Ok(self.chain_id)
	}

	async fn populate(
		&self,
		mut request: TransactionRequest,
	) -> Result<TransactionRequest, DeliveryError> {
		if request.chain_id.is_none() {
			request.set_chain_id(self.chain_id);
		}
		if let (None, Some(from)) = (request.nonce, request.from) {
			let state = self.state.read().await;
			request.set_nonce(state.nonces.get(&from).copied().unwrap_or(0));
		}
		if request.gas_price.is_none() && request.max_fee_per_gas.is_none() {
			request.set_gas_price(self.gas_price);
		}
		if request.gas.is_none() {
			request.set_gas_limit(intrinsic_gas(&request));
		}
		Ok(request)
	}

	async fn broadcast(
		&self,
		request: TransactionRequest,
	) -> Result<BroadcastOutcome, DeliveryError> {
		let from = request
			.from
			.ok_or_else(|| Self::rejected("missing sender address"))?;

		if let Some(chain_id) = request.chain_id.filter(|id| *id != self.chain_id) {
			return Err(Self::rejected(format!(
				"invalid chain id for signer: have {} want {}",
				chain_id, self.chain_id
			)));
		}

		let intrinsic = intrinsic_gas(&request);
		let gas_limit = request.gas.unwrap_or(intrinsic);
		if gas_limit < intrinsic {
			return Err(Self::rejected(format!(
				"intrinsic gas too low: have {}, want {}",
				gas_limit, intrinsic
			)));
		}

		let gas_price = request
			.gas_price
			.or(request.max_fee_per_gas)
			.unwrap_or(self.gas_price);
		let value = request.value.unwrap_or_default();
		let to = request.to.as_ref().and_then(|kind| kind.to().copied());
		let input = request.input.input().cloned().unwrap_or_default();

		let mut state = self.state.write().await;

		let expected_nonce = state.nonces.get(&from).copied().unwrap_or(0);
		let nonce = request.nonce.unwrap_or(expected_nonce);
		if nonce < expected_nonce {
			return Err(Self::rejected(format!(
				"nonce too low: next nonce {}, tx nonce {}",
				expected_nonce, nonce
			)));
		}
		if nonce > expected_nonce {
			return Err(Self::rejected(format!(
				"nonce too high: next nonce {}, tx nonce {}",
				expected_nonce, nonce
			)));
		}

		// An upfront cost past U256::MAX can never be covered.
		let balance = state.balances.get(&from).copied().unwrap_or_default();
		let upfront_cost = U256::from(gas_limit)
			.checked_mul(U256::from(gas_price))
			.and_then(|max_fee| max_fee.checked_add(value));
		let Some(upfront_cost) = upfront_cost.filter(|cost| *cost <= balance) else {
			return Err(Self::rejected(format!(
				"sender doesn't have enough funds to send tx. The max upfront cost is: {} and the sender's account only has: {}",
				upfront_cost.unwrap_or(U256::MAX),
				balance
			)));
		};

		// gas_limit >= intrinsic, so fee + value <= upfront_cost <= balance.
		let fee = U256::from(intrinsic) * U256::from(gas_price);
		let sender_balance = balance - fee - value;
		let credit = match to {
			Some(to) => {
				let current = if to == from {
					sender_balance
				} else {
					state.balances.get(&to).copied().unwrap_or_default()
				};
				let credited = current
					.checked_add(value)
					.ok_or_else(|| Self::rejected("recipient balance overflow"))?;
				Some((to, credited))
			},
			None => None,
		};
		tracing::trace!(%upfront_cost, %fee, "Charging sender");

		state.balances.insert(from, sender_balance);
		if let Some((to, credited)) = credit {
			state.balances.insert(to, credited);
		}
		state.nonces.insert(from, nonce + 1);
		state.block_number += 1;
		let block_number = state.block_number;

		let transaction = TxLegacy {
			chain_id: Some(self.chain_id),
			nonce,
			gas_price,
			gas_limit,
			to: to.map(TxKind::Call).unwrap_or(TxKind::Create),
			value,
			input,
		};
		let mut preimage = transaction.signature_hash().to_vec();
		preimage.extend_from_slice(from.as_slice());
		let hash = keccak256(&preimage);

		state.receipts.insert(
			hash,
			TransactionReceipt {
				hash,
				block_number,
				gas_used: intrinsic,
				effective_gas_price: gas_price,
				success: true,
			},
		);

		tracing::debug!(tx_hash = %hash, block_number, "Mined transaction");

		Ok(BroadcastOutcome {
			hash,
			from,
			nonce: Some(nonce),
			gas_limit,
			gas_price: Some(gas_price),
			block_number: Some(block_number),
		})
	}

	/// Mines empty blocks until the transaction has `confirmations` blocks.
	async fn wait_for_confirmation(
		&self,
		hash: &TxHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let mut state = self.state.write().await;
		let receipt = state
			.receipts
			.get(hash)
			.cloned()
			.ok_or_else(|| DeliveryError::Network(format!("Transaction {} not found", hash)))?;

		let target_block = receipt.block_number + confirmations.saturating_sub(1);
		if state.block_number < target_block {
			state.block_number = target_block;
		}
		Ok(receipt)
	}

	async fn get_receipt(
		&self,
		hash: &TxHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		Ok(self.state.read().await.receipts.get(hash).cloned())
	}

	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		Ok(self
			.state
			.read()
			.await
			.balances
			.get(&address)
			.copied()
			.unwrap_or_default())
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		Ok(self.state.read().await.block_number)
	}
}

/// Factory function to create a memory chain from configuration.
///
/// Configuration parameters:
/// - `chain_id` (optional): reported chain id, default 1
/// - `funded_accounts` (optional): addresses to fund, default the development accounts
/// - `balance_eth` (optional): starting balance per account, default 10000
/// - `gas_price_gwei` (optional): gas price, default 1
pub fn create_memory_delivery(
	config: &toml::Value,
	_chains: &ChainsConfig,
	_private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	MemoryDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(e.to_string()))?;

	let integer = |key: &str, default: u64| {
		config
			.get(key)
			.and_then(|v| v.as_integer())
			.map(|v| v as u64)
			.unwrap_or(default)
	};

	let funded = match config.get("funded_accounts").and_then(|v| v.as_array()) {
		Some(accounts) => accounts
			.iter()
			.filter_map(|v| v.as_str())
			.map(|s| {
				s.parse::<Address>().map_err(|e| {
					DeliveryError::Configuration(format!("Invalid funded account '{}': {}", s, e))
				})
			})
			.collect::<Result<Vec<_>, _>>()?,
		None => dev_addresses(),
	};

	let delivery = MemoryDelivery::new(
		integer("chain_id", DEFAULT_CHAIN_ID),
		integer("gas_price_gwei", DEFAULT_GAS_PRICE_GWEI) as u128 * WEI_PER_GWEI,
		&funded,
		U256::from(integer("balance_eth", DEFAULT_BALANCE_ETH)) * U256::from(WEI_PER_ETHER),
	);
	Ok(Box::new(delivery))
}

/// Registry for the memory delivery implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_memory_delivery
	}
}

impl DeliveryRegistry for Registry {}
