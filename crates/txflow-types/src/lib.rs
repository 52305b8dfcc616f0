//! Common types module for the txflow workspace.
//!
//! This module defines the data types shared between the account, delivery,
//! configuration and core crates: chains and the network view, transaction
//! requests and their results, and the configuration validation framework.

/// Chain identity and the network view of a client session.
pub mod chain;
/// Self-registration of named implementations.
pub mod registry;
/// Secret string wrapper for private keys.
pub mod secret_string;
/// Transaction request, broadcast and receipt types.
pub mod transaction;
/// Configuration validation types for implementation tables.
pub mod validation;

pub use chain::{
	chain_display_name, chains_from_config, deserialize_chains, Chain, ChainConfig, ChainsConfig,
	Network,
};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use transaction::{
	BroadcastOutcome, CallOverrides, PreparedTransactionRequest, TransactionReceipt,
};
pub use validation::*;

/// Re-export of the alloy primitives used across the workspace.
pub use alloy::primitives::{Address, Bytes, TxHash, U256};
/// Re-export of the alloy transaction request every crate passes around.
pub use alloy::rpc::types::TransactionRequest;
