//! Client session state: configured chains and the active connection.

use crate::TxError;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use txflow_account::AccountService;
use txflow_config::Config;
use txflow_delivery::DeliveryService;
use txflow_types::{
	chain_display_name, Address, Chain, Network, TransactionReceipt, TxHash, U256,
};

/// An account paired with the delivery implementation that submits for it.
pub struct Connector {
	name: String,
	account: Arc<AccountService>,
	delivery: DeliveryService,
}

impl Connector {
	pub fn new(name: impl Into<String>, account: AccountService, delivery: DeliveryService) -> Self {
		Self {
			name: name.into(),
			account: Arc::new(account),
			delivery,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn account(&self) -> &AccountService {
		&self.account
	}

	pub fn delivery(&self) -> &DeliveryService {
		&self.delivery
	}
}

/// A connected connector with the address and chain read when it connected.
pub(crate) struct Connection {
	pub(crate) connector: Connector,
	pub(crate) address: Address,
	pub(crate) chain_id: u64,
}

/// A client session.
///
/// Actions only read the connection; [`Client::connect`] and
/// [`Client::disconnect`] replace it as a whole, so concurrent actions each see
/// one consistent snapshot.
pub struct Client {
	chains: Vec<Chain>,
	connection: ArcSwapOption<Connection>,
}

impl Client {
	/// Creates a disconnected client that knows `chains`.
	pub fn new(chains: Vec<Chain>) -> Self {
		Self {
			chains,
			connection: ArcSwapOption::empty(),
		}
	}

	/// Creates a disconnected client with the chains of `config`.
	pub fn from_config(config: &Config) -> Self {
		Self::new(config.chain_list())
	}

	/// Connects `connector`, replacing any previous connection.
	///
	/// Reads the account address and the chain the delivery provider is on.
	pub async fn connect(&self, connector: Connector) -> Result<Network, TxError> {
		let address = connector.account.get_address().await?;
		let chain_id = connector.delivery.chain_id().await?;

		tracing::info!(
			connector = %connector.name,
			address = %address,
			chain_id,
			"Connected"
		);

		self.connection.store(Some(Arc::new(Connection {
			connector,
			address,
			chain_id,
		})));
		Ok(self.get_network())
	}

	pub fn disconnect(&self) {
		if let Some(previous) = self.connection.swap(None) {
			tracing::info!(connector = %previous.connector.name, "Disconnected");
		}
	}

	/// Returns the active chain and the configured chains.
	///
	/// A connection to an unconfigured chain id reports `Chain <id>` as its name.
	pub fn get_network(&self) -> Network {
		let chain = self.connection.load().as_deref().map(|connection| {
			Chain::new(
				connection.chain_id,
				chain_display_name(&self.chains, connection.chain_id),
			)
		});

		Network {
			chain,
			chains: self.chains.clone(),
		}
	}

	/// Address of the connected account.
	pub fn address(&self) -> Option<Address> {
		self.connection
			.load()
			.as_deref()
			.map(|connection| connection.address)
	}

	/// Native balance of `address` on the active chain.
	pub async fn get_balance(&self, address: Address) -> Result<U256, TxError> {
		let connection = self.connection()?;
		Ok(connection.connector.delivery().get_balance(address).await?)
	}

	/// Receipt of a mined transaction, `None` while it is pending.
	pub async fn get_transaction_receipt(
		&self,
		hash: &TxHash,
	) -> Result<Option<TransactionReceipt>, TxError> {
		let connection = self.connection()?;
		Ok(connection.connector.delivery().get_receipt(hash).await?)
	}

	pub(crate) fn connection(&self) -> Result<Arc<Connection>, TxError> {
		self.connection.load_full().ok_or(TxError::ConnectorNotFound)
	}

	/// Fails with `ChainMismatch` when `chain_id` is given and is not the
	/// active chain.
	///
	/// Every `Some` is checked, chain id 0 included. With no connection the
	/// active chain is reported as `Chain unknown`.
	pub(crate) fn assert_active_chain(&self, chain_id: Option<u64>) -> Result<(), TxError> {
		let Some(target) = chain_id else {
			return Ok(());
		};

		let network = self.get_network();
		let active = network.active_chain_id();
		if active == Some(target) {
			tracing::debug!(chain_id = target, "Active chain matches");
			return Ok(());
		}

		let active_chain = match active {
			Some(id) => network.display_name(id),
			None => "Chain unknown".to_string(),
		};
		let target_chain = network.display_name(target);
		tracing::warn!(
			active_chain = %active_chain,
			target_chain = %target_chain,
			"Rejected request for inactive chain"
		);

		Err(TxError::ChainMismatch {
			active_chain,
			target_chain,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use txflow_account::implementations::local::LocalAccount;
	use txflow_delivery::implementations::memory::MemoryDelivery;

	fn chains() -> Vec<Chain> {
		vec![Chain::new(1, "Ethereum"), Chain::new(10, "Optimism")]
	}

	fn connector(chain_id: u64) -> Connector {
		Connector::new(
			"test",
			AccountService::new(Box::new(LocalAccount::dev(0).unwrap())),
			DeliveryService::new(Box::new(MemoryDelivery::with_dev_accounts(chain_id)), 1),
		)
	}

	#[test]
	fn test_disconnected_network() {
		let client = Client::new(chains());
		let network = client.get_network();

		assert_eq!(network.chain, None);
		assert_eq!(network.chains, chains());
		assert!(client.address().is_none());
		assert!(matches!(client.connection(), Err(TxError::ConnectorNotFound)));
	}

	#[tokio::test]
	async fn test_connect_and_disconnect() {
		let client = Client::new(chains());
		let network = client.connect(connector(10)).await.unwrap();

		assert_eq!(network.chain, Some(Chain::new(10, "Optimism")));
		assert_eq!(
			client.address().unwrap().to_string(),
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
		);

		let balance = client.get_balance(client.address().unwrap()).await.unwrap();
		assert!(balance > U256::ZERO);

		client.disconnect();
		assert_eq!(client.get_network().chain, None);
		assert!(matches!(
			client.get_balance(Address::ZERO).await,
			Err(TxError::ConnectorNotFound)
		));
	}

	#[tokio::test]
	async fn test_unconfigured_chain_uses_fallback_name() {
		let client = Client::new(chains());
		client.connect(connector(31337)).await.unwrap();

		assert_eq!(
			client.get_network().chain,
			Some(Chain::new(31337, "Chain 31337"))
		);
	}

	#[tokio::test]
	async fn test_assert_active_chain() {
		let client = Client::new(chains());
		client.connect(connector(1)).await.unwrap();

		assert!(client.assert_active_chain(None).is_ok());
		assert!(client.assert_active_chain(Some(1)).is_ok());

		let err = client.assert_active_chain(Some(10)).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Chain mismatch: Expected \"Optimism\", received \"Ethereum.\""
		);
	}

	#[test]
	fn test_assert_active_chain_while_disconnected() {
		let client = Client::new(chains());
		let err = client.assert_active_chain(Some(1)).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Chain mismatch: Expected \"Ethereum\", received \"Chain unknown.\""
		);
	}

	#[tokio::test]
	async fn test_chain_id_zero_is_checked() {
		let client = Client::new(chains());
		client.connect(connector(1)).await.unwrap();

		let err = client.assert_active_chain(Some(0)).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Chain mismatch: Expected \"Chain 0\", received \"Ethereum.\""
		);
	}
}
