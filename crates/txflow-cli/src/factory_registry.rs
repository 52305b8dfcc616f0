//! Registry of the account and delivery implementations this binary ships.

use std::collections::HashMap;
use std::sync::OnceLock;
use txflow_account::AccountFactory;
use txflow_config::Config;
use txflow_core::{Connector, ConnectorBuilder, ConnectorFactories};
use txflow_delivery::DeliveryFactory;

/// Factories keyed by implementation name.
pub struct FactoryRegistry {
	pub account: HashMap<String, AccountFactory>,
	pub delivery: HashMap<String, DeliveryFactory>,
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the registry, filling it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut account = HashMap::new();
		for (name, factory) in txflow_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			account.insert(name.to_string(), factory);
		}

		let mut delivery = HashMap::new();
		for (name, factory) in txflow_delivery::get_all_implementations() {
			tracing::debug!("Registering delivery implementation: {}", name);
			delivery.insert(name.to_string(), factory);
		}

		FactoryRegistry { account, delivery }
	})
}

/// Picks the factories named in a configuration section.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the connector a configuration describes.
pub async fn build_connector_from_config(
	config: &Config,
) -> Result<Connector, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let account_factories =
		build_factories!(registry, config.account.implementations, account, "account");
	let delivery_factories = build_factories!(
		registry,
		config.delivery.implementations,
		delivery,
		"delivery"
	);

	let connector = ConnectorBuilder::new(config.clone())
		.build(ConnectorFactories {
			account_factories,
			delivery_factories,
		})
		.await?;
	Ok(connector)
}
