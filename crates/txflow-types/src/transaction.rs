//! Transaction request, broadcast and receipt types.
//!
//! A request starts as an alloy `TransactionRequest`, becomes a
//! `PreparedTransactionRequest` once the preparer has populated it, and yields
//! a `BroadcastOutcome` when the delivery layer submits it. The receipt type
//! describes the transaction after it has been mined.

use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use serde::{Deserialize, Serialize};

/// A transaction request populated by the preparer.
///
/// `to` and the gas limit are expected to be present. They are still checked
/// again before broadcast because a prepared request may have been edited or
/// deserialized since it was populated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreparedTransactionRequest(TransactionRequest);

impl PreparedTransactionRequest {
	pub fn new(request: TransactionRequest) -> Self {
		Self(request)
	}

	/// Recipient address, `None` for contract creation or an unset field.
	pub fn to(&self) -> Option<Address> {
		self.0.to.as_ref().and_then(|kind| kind.to().copied())
	}

	pub fn gas_limit(&self) -> Option<u64> {
		self.0.gas
	}

	pub fn value(&self) -> Option<U256> {
		self.0.value
	}

	pub fn as_request(&self) -> &TransactionRequest {
		&self.0
	}

	pub fn into_inner(self) -> TransactionRequest {
		self.0
	}
}

impl From<TransactionRequest> for PreparedTransactionRequest {
	fn from(request: TransactionRequest) -> Self {
		Self(request)
	}
}

/// Per-call overrides applied to a contract call before population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOverrides {
	/// Native value sent with the call, in wei.
	pub value: Option<U256>,
	/// Gas limit; skips estimation when set.
	pub gas_limit: Option<u64>,
	/// Legacy gas price in wei.
	pub gas_price: Option<u128>,
	pub nonce: Option<u64>,
}

impl CallOverrides {
	/// Writes every set override into `request`.
	pub fn apply(&self, mut request: TransactionRequest) -> TransactionRequest {
		if let Some(value) = self.value {
			request.value = Some(value);
		}
		if let Some(gas_limit) = self.gas_limit {
			request.gas = Some(gas_limit);
		}
		if let Some(gas_price) = self.gas_price {
			request.gas_price = Some(gas_price);
		}
		if let Some(nonce) = self.nonce {
			request.nonce = Some(nonce);
		}
		request
	}
}

/// What the delivery layer reports right after submitting a transaction.
///
/// `block_number` is only known when the node included the transaction
/// before answering, as an automining development chain does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastOutcome {
	pub hash: TxHash,
	pub from: Address,
	/// Nonce, when it was set before submission.
	pub nonce: Option<u64>,
	pub gas_limit: u64,
	/// Gas price the transaction was submitted with (or its max fee).
	pub gas_price: Option<u128>,
	pub block_number: Option<u64>,
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TxHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Gas consumed by the transaction.
	pub gas_used: u64,
	/// Price per unit of gas actually paid.
	pub effective_gas_price: u128,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::network::TransactionBuilder;

	#[test]
	fn test_prepared_request_accessors() {
		let to = Address::repeat_byte(0x11);
		let prepared = PreparedTransactionRequest::new(
			TransactionRequest::default()
				.with_to(to)
				.with_gas_limit(21_000)
				.with_value(U256::from(5)),
		);

		assert_eq!(prepared.to(), Some(to));
		assert_eq!(prepared.gas_limit(), Some(21_000));
		assert_eq!(prepared.value(), Some(U256::from(5)));

		let empty = PreparedTransactionRequest::default();
		assert_eq!(empty.to(), None);
		assert_eq!(empty.gas_limit(), None);
	}

	#[test]
	fn test_overrides_only_touch_set_fields() {
		let request = TransactionRequest::default()
			.with_gas_limit(50_000)
			.with_nonce(3);
		let overrides = CallOverrides {
			value: Some(U256::from(7)),
			gas_price: Some(2_000_000_000),
			..Default::default()
		};

		let request = overrides.apply(request);
		assert_eq!(request.value, Some(U256::from(7)));
		assert_eq!(request.gas_price, Some(2_000_000_000));
		assert_eq!(request.gas, Some(50_000));
		assert_eq!(request.nonce, Some(3));
	}
}
