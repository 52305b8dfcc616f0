//! Builds a [`Connector`] from configuration.
//!
//! The account and delivery implementations are looked up by name in factory
//! maps supplied by the caller, so the binary decides which implementations
//! are available.

use crate::client::Connector;
use std::collections::HashMap;
use thiserror::Error;
use txflow_account::{AccountError, AccountInterface, AccountService};
use txflow_config::Config;
use txflow_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use txflow_types::{ChainsConfig, SecretString};

/// Errors that can occur while building a connector.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions keyed by implementation name.
pub struct ConnectorFactories<AF, DF> {
	pub account_factories: HashMap<String, AF>,
	pub delivery_factories: HashMap<String, DF>,
}

/// Builder for the connector described by a configuration.
pub struct ConnectorBuilder {
	config: Config,
}

impl ConnectorBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates the primary account, then the primary delivery signing with
	/// that account's key.
	pub async fn build<AF, DF>(
		self,
		factories: ConnectorFactories<AF, DF>,
	) -> Result<Connector, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
		DF: Fn(
			&toml::Value,
			&ChainsConfig,
			&SecretString,
		) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
	{
		let (account_name, account_config) = self
			.config
			.primary_account()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let account_factory = factories
			.account_factories
			.get(account_name)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("account implementation '{}'", account_name))
			})?;

		let account = match account_factory(account_config) {
			Ok(implementation) => {
				tracing::info!(component = "account", implementation = %account_name, "Loaded");
				AccountService::new(implementation)
			},
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %account_name,
					error = %e,
					"Failed to create account implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					account_name, e
				)));
			},
		};

		let (delivery_name, delivery_config) = self
			.config
			.primary_delivery()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let delivery_factory = factories
			.delivery_factories
			.get(delivery_name)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!(
					"delivery implementation '{}'",
					delivery_name
				))
			})?;

		let private_key = account.get_private_key();
		let delivery = match delivery_factory(delivery_config, &self.config.chains, &private_key) {
			Ok(implementation) => {
				tracing::info!(component = "delivery", implementation = %delivery_name, "Loaded");
				DeliveryService::new(implementation, self.config.delivery.min_confirmations)
			},
			Err(e) => {
				tracing::error!(
					component = "delivery",
					implementation = %delivery_name,
					error = %e,
					"Failed to create delivery implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create delivery implementation '{}': {}",
					delivery_name, e
				)));
			},
		};

		Ok(Connector::new(
			self.config.client.id.clone(),
			account,
			delivery,
		))
	}
}
