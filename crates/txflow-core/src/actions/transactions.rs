//! Preparing and sending plain transactions.

use crate::client::{Client, Connection};
use crate::TxError;
use alloy::network::TransactionBuilder;
use std::fmt;
use txflow_delivery::DeliveryService;
use txflow_types::{
	Address, BroadcastOutcome, PreparedTransactionRequest, TransactionReceipt, TransactionRequest,
	TxHash,
};

/// Arguments of [`Client::prepare_send_transaction`].
#[derive(Debug, Clone, Default)]
pub struct PrepareSendTransactionArgs {
	/// Chain the caller expects the connected account to be on.
	pub chain_id: Option<u64>,
	pub request: TransactionRequest,
}

/// A request ready for [`Client::send_transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareSendTransactionResult {
	/// The chain id the caller asked for, passed through.
	pub chain_id: Option<u64>,
	pub request: PreparedTransactionRequest,
}

/// How the request given to [`Client::send_transaction`] was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SendRequest {
	/// Populated by a preparer; sent as is.
	Prepared(PreparedTransactionRequest),
	/// Raw parameters, populated right before broadcast.
	///
	/// Population does network work (gas estimation, nonce lookup) between the
	/// caller's action and the signing prompt.
	DangerouslyPrepared(TransactionRequest),
}

/// Arguments of [`Client::send_transaction`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendTransactionArgs {
	/// Chain the caller expects the connected account to be on.
	pub chain_id: Option<u64>,
	pub request: SendRequest,
}

impl SendTransactionArgs {
	pub fn prepared(request: impl Into<PreparedTransactionRequest>) -> Self {
		Self {
			chain_id: None,
			request: SendRequest::Prepared(request.into()),
		}
	}

	pub fn dangerously_prepared(request: TransactionRequest) -> Self {
		Self {
			chain_id: None,
			request: SendRequest::DangerouslyPrepared(request),
		}
	}

	pub fn with_chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = Some(chain_id);
		self
	}
}

/// A request that passed the field checks.
pub(crate) struct ValidatedRequest {
	pub(crate) to: Address,
	pub(crate) gas_limit: u64,
	pub(crate) request: TransactionRequest,
}

impl TryFrom<TransactionRequest> for ValidatedRequest {
	type Error = TxError;

	fn try_from(request: TransactionRequest) -> Result<Self, Self::Error> {
		let to = request
			.to
			.as_ref()
			.and_then(|kind| kind.to().copied())
			.ok_or(TxError::MissingField("to"))?;
		let gas_limit = request.gas.ok_or(TxError::MissingField("gasLimit"))?;
		Ok(Self {
			to,
			gas_limit,
			request,
		})
	}
}

/// Result of a broadcast transaction.
///
/// `block_number` is set when the node had already included the transaction
/// when it answered; [`SendTransactionResult::wait`] resolves the receipt
/// otherwise.
#[derive(Clone)]
pub struct SendTransactionResult {
	pub hash: TxHash,
	pub from: Address,
	pub nonce: Option<u64>,
	pub gas_limit: u64,
	pub gas_price: Option<u128>,
	pub block_number: Option<u64>,
	delivery: DeliveryService,
}

impl SendTransactionResult {
	fn new(outcome: BroadcastOutcome, delivery: DeliveryService) -> Self {
		Self {
			hash: outcome.hash,
			from: outcome.from,
			nonce: outcome.nonce,
			gas_limit: outcome.gas_limit,
			gas_price: outcome.gas_price,
			block_number: outcome.block_number,
			delivery,
		}
	}

	/// Waits for `confirmations` blocks, or the configured default when `None`.
	pub async fn wait(&self, confirmations: Option<u64>) -> Result<TransactionReceipt, TxError> {
		let receipt = match confirmations {
			Some(confirmations) => self.delivery.confirm(&self.hash, confirmations).await?,
			None => self.delivery.confirm_with_default(&self.hash).await?,
		};
		Ok(receipt)
	}
}

impl fmt::Debug for SendTransactionResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SendTransactionResult")
			.field("hash", &self.hash)
			.field("from", &self.from)
			.field("nonce", &self.nonce)
			.field("gas_limit", &self.gas_limit)
			.field("gas_price", &self.gas_price)
			.field("block_number", &self.block_number)
			.finish()
	}
}

impl Client {
	/// Populates `request` for the connected account without sending it.
	///
	/// The delivery fills the chain id, nonce, gas price and gas limit; fields
	/// already set are kept.
	pub async fn prepare_send_transaction(
		&self,
		args: PrepareSendTransactionArgs,
	) -> Result<PrepareSendTransactionResult, TxError> {
		self.assert_active_chain(args.chain_id)?;
		let connection = self.connection()?;
		let request = populate(&connection, args.request).await?;

		Ok(PrepareSendTransactionResult {
			chain_id: args.chain_id,
			request,
		})
	}

	/// Validates and broadcasts a transaction.
	///
	/// Checks run in order and stop at the first failure: the expected chain,
	/// the connection, then `to` and `gasLimit`. Dangerously prepared requests
	/// are populated after the chain check. Nothing is sent unless every check
	/// passes, and delivery errors are returned unchanged.
	pub async fn send_transaction(
		&self,
		args: SendTransactionArgs,
	) -> Result<SendTransactionResult, TxError> {
		self.assert_active_chain(args.chain_id)?;
		let connection = self.connection()?;

		let request = match args.request {
			SendRequest::Prepared(request) => request,
			SendRequest::DangerouslyPrepared(request) => populate(&connection, request).await?,
		};

		let validated = ValidatedRequest::try_from(request.into_inner()).inspect_err(|e| {
			tracing::warn!(error = %e, "Rejected transaction request");
		})?;

		let delivery = connection.connector.delivery();
		let mut request = validated.request;
		if request.from.is_none() {
			request.set_from(connection.address);
		}

		tracing::debug!(
			to = %validated.to,
			gas_limit = validated.gas_limit,
			"Sending transaction"
		);
		let outcome = delivery.broadcast(request).await?;
		Ok(SendTransactionResult::new(outcome, delivery.clone()))
	}
}

/// Sets the sender and lets the delivery fill in the rest.
pub(crate) async fn populate(
	connection: &Connection,
	mut request: TransactionRequest,
) -> Result<PreparedTransactionRequest, TxError> {
	if request.from.is_none() {
		request.set_from(connection.address);
	}

	let populated = connection.connector.delivery().populate(request).await?;
	tracing::debug!(
		gas_limit = ?populated.gas,
		nonce = ?populated.nonce,
		"Prepared transaction"
	);
	Ok(PreparedTransactionRequest::new(populated))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::Connector;
	use mockall::predicate::always;
	use std::sync::{Arc, Mutex};
	use txflow_account::implementations::local::LocalAccount;
	use txflow_account::AccountService;
	use txflow_delivery::implementations::memory::{dev_addresses, MemoryDelivery};
	use txflow_delivery::{DeliveryError, MockDeliveryInterface};
	use txflow_types::{Bytes, Chain, U256};

	fn ether(amount: u64) -> U256 {
		U256::from(amount) * U256::from(10u64).pow(U256::from(18))
	}

	fn recipient() -> Address {
		dev_addresses()[1]
	}

	async fn connected_client() -> Client {
		let client = Client::new(vec![Chain::new(1, "Ethereum")]);
		client
			.connect(Connector::new(
				"local",
				AccountService::new(Box::new(LocalAccount::dev(0).unwrap())),
				DeliveryService::new(Box::new(MemoryDelivery::with_dev_accounts(1)), 1),
			))
			.await
			.unwrap();
		client
	}

	/// Client over a mock whose broadcast must never run.
	async fn guarded_client(mut mock: MockDeliveryInterface) -> Client {
		mock.expect_chain_id().returning(|| Ok(1));
		mock.expect_broadcast().never();

		let client = Client::new(vec![Chain::new(1, "Ethereum")]);
		client
			.connect(Connector::new(
				"mock",
				AccountService::new(Box::new(LocalAccount::dev(0).unwrap())),
				DeliveryService::new(Box::new(mock), 1),
			))
			.await
			.unwrap();
		client
	}

	/// Mock that fills fixed fees and keeps every request it broadcasts.
	fn recording_delivery(sent: Arc<Mutex<Vec<TransactionRequest>>>) -> MockDeliveryInterface {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_chain_id().returning(|| Ok(1));
		mock.expect_populate().returning(|request| {
			Ok(request
				.with_chain_id(1)
				.with_nonce(0)
				.with_gas_price(1_000_000_000)
				.with_gas_limit(21_000))
		});
		mock.expect_broadcast().returning(move |request| {
			let outcome = BroadcastOutcome {
				hash: TxHash::repeat_byte(0x11),
				from: request.from.unwrap_or_default(),
				nonce: request.nonce,
				gas_limit: request.gas.unwrap_or_default(),
				gas_price: request.gas_price,
				block_number: None,
			};
			sent.lock().unwrap().push(request);
			Ok(outcome)
		});
		mock
	}

	async fn client_over(mock: MockDeliveryInterface) -> Client {
		let client = Client::new(vec![Chain::new(1, "Ethereum")]);
		client
			.connect(Connector::new(
				"mock",
				AccountService::new(Box::new(LocalAccount::dev(0).unwrap())),
				DeliveryService::new(Box::new(mock), 1),
			))
			.await
			.unwrap();
		client
	}

	fn transfer(value: U256) -> TransactionRequest {
		TransactionRequest::default()
			.with_to(recipient())
			.with_value(value)
	}

	#[tokio::test]
	async fn test_prepared_transfer_is_sent() {
		let client = connected_client().await;
		let prepared = client
			.prepare_send_transaction(PrepareSendTransactionArgs {
				chain_id: None,
				request: transfer(ether(10)),
			})
			.await
			.unwrap();
		assert_eq!(prepared.request.gas_limit(), Some(0x5209));
		assert_eq!(prepared.request.to(), Some(recipient()));

		let result = client
			.send_transaction(SendTransactionArgs::prepared(prepared.request))
			.await
			.unwrap();

		assert_eq!(result.gas_limit, 0x5209);
		assert!(result.block_number.is_some());
		assert!(result.gas_price.is_some());
		assert_ne!(result.hash, TxHash::ZERO);
		assert_eq!(result.from, client.address().unwrap());

		let receipt = result.wait(None).await.unwrap();
		assert_eq!(Some(receipt.block_number), result.block_number);
		assert!(receipt.success);
	}

	#[tokio::test]
	async fn test_chain_mismatch_names_both_chains() {
		let client = connected_client().await;
		let err = client
			.send_transaction(
				SendTransactionArgs::dangerously_prepared(transfer(ether(1))).with_chain_id(420),
			)
			.await
			.unwrap_err();

		assert_eq!(
			err.to_string(),
			"Chain mismatch: Expected \"Chain 420\", received \"Ethereum.\""
		);
	}

	#[tokio::test]
	async fn test_matching_chain_id_is_accepted() {
		let client = connected_client().await;
		let result = client
			.send_transaction(
				SendTransactionArgs::dangerously_prepared(transfer(ether(1))).with_chain_id(1),
			)
			.await;
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn test_insufficient_funds_surfaces_delivery_error() {
		let client = connected_client().await;
		let err = client
			.send_transaction(SendTransactionArgs::dangerously_prepared(transfer(ether(
				100_000,
			))))
			.await
			.unwrap_err();

		assert!(matches!(err, TxError::Delivery(DeliveryError::Rpc(_))));
		assert!(err
			.to_string()
			.contains("doesn't have enough funds to send tx"));
	}

	#[tokio::test]
	async fn test_dangerously_prepared_matches_prepare_then_send() {
		let client = connected_client().await;
		let dangerous = client
			.send_transaction(SendTransactionArgs::dangerously_prepared(transfer(ether(1))))
			.await
			.unwrap();

		let other = connected_client().await;
		let prepared = other
			.prepare_send_transaction(PrepareSendTransactionArgs {
				chain_id: None,
				request: transfer(ether(1)),
			})
			.await
			.unwrap();
		let sent = other
			.send_transaction(SendTransactionArgs::prepared(prepared.request))
			.await
			.unwrap();

		assert_eq!(dangerous.hash, sent.hash);
		assert_eq!(dangerous.gas_limit, sent.gas_limit);
		assert_eq!(dangerous.gas_price, sent.gas_price);
		assert_eq!(dangerous.nonce, sent.nonce);
		assert_eq!(
			client.get_balance(recipient()).await.unwrap(),
			other.get_balance(recipient()).await.unwrap()
		);
		assert_eq!(
			client.get_balance(recipient()).await.unwrap(),
			ether(10_001)
		);
	}

	#[tokio::test]
	async fn test_both_send_paths_broadcast_the_same_request() {
		let sent = Arc::new(Mutex::new(Vec::new()));
		let client = client_over(recording_delivery(sent.clone())).await;
		let request = transfer(ether(3)).with_input(Bytes::from(vec![0xde, 0xad]));

		client
			.send_transaction(SendTransactionArgs::dangerously_prepared(request.clone()))
			.await
			.unwrap();
		let prepared = client
			.prepare_send_transaction(PrepareSendTransactionArgs {
				chain_id: None,
				request,
			})
			.await
			.unwrap();
		client
			.send_transaction(SendTransactionArgs::prepared(prepared.request))
			.await
			.unwrap();

		let sent = sent.lock().unwrap();
		assert_eq!(sent.len(), 2);
		assert_eq!(sent[0], sent[1]);
		assert_eq!(TransactionBuilder::to(&sent[0]), Some(recipient()));
		assert_eq!(TransactionBuilder::value(&sent[0]), Some(ether(3)));
		assert_eq!(TransactionBuilder::input(&sent[0]), Some(&Bytes::from(vec![0xde, 0xad])));
		assert_eq!(sent[0].from, client.address());
	}

	#[tokio::test]
	async fn test_missing_to_is_rejected_before_broadcast() {
		let client = guarded_client(MockDeliveryInterface::new()).await;
		let request = TransactionRequest::default().with_gas_limit(21_000);

		let err = client
			.send_transaction(SendTransactionArgs::prepared(request))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "`to` is required");
	}

	#[tokio::test]
	async fn test_dangerously_prepared_without_to_is_rejected() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_populate()
			.times(1)
			.returning(|request| Ok(request.with_gas_limit(21_000)));
		let client = guarded_client(mock).await;

		let err = client
			.send_transaction(SendTransactionArgs::dangerously_prepared(
				TransactionRequest::default().with_value(ether(1)),
			))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "`to` is required");
	}

	#[tokio::test]
	async fn test_missing_gas_limit_is_rejected_before_broadcast() {
		let client = guarded_client(MockDeliveryInterface::new()).await;

		let err = client
			.send_transaction(SendTransactionArgs::prepared(transfer(ether(1))))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "`gasLimit` is required");
	}

	#[tokio::test]
	async fn test_to_is_checked_before_gas_limit() {
		let client = guarded_client(MockDeliveryInterface::new()).await;

		let err = client
			.send_transaction(SendTransactionArgs::prepared(TransactionRequest::default()))
			.await
			.unwrap_err();
		assert!(matches!(err, TxError::MissingField("to")));
	}

	#[tokio::test]
	async fn test_chain_mismatch_skips_population() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_populate().never();
		let client = guarded_client(mock).await;

		let err = client
			.send_transaction(
				SendTransactionArgs::dangerously_prepared(transfer(ether(1))).with_chain_id(10),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, TxError::ChainMismatch { .. }));
	}

	#[tokio::test]
	async fn test_dangerously_prepared_fields_checked_after_population() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_populate()
			.with(always())
			.times(1)
			.returning(|request| Ok(request));
		let client = guarded_client(mock).await;

		let err = client
			.send_transaction(SendTransactionArgs::dangerously_prepared(transfer(ether(1))))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "`gasLimit` is required");
	}

	#[tokio::test]
	async fn test_send_without_connection() {
		let client = Client::new(vec![Chain::new(1, "Ethereum")]);
		let err = client
			.send_transaction(SendTransactionArgs::dangerously_prepared(transfer(ether(1))))
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "Connector not found");
	}
}
