//! Transaction helpers over a connected account.
//!
//! A [`Client`] holds the chains it was configured with and, once a
//! [`Connector`] is connected, the account and chain transactions are sent
//! from. The actions validate their preconditions against that state (the
//! caller's expected chain, required request fields) and then hand the request
//! to the connector's delivery implementation, which populates, signs and
//! broadcasts it.
//!
//! ```text
//! write_contract ──► prepare_write_contract ──► send_transaction ──► DeliveryService
//!                                                     │
//!                                               get_network (chain check)
//! ```

use thiserror::Error;
use txflow_account::AccountError;
use txflow_delivery::DeliveryError;

pub mod actions;
pub mod builder;
pub mod client;

pub use actions::contracts::{
	ContractArgs, ContractCall, PrepareWriteContractArgs, PrepareWriteContractResult,
	WriteContractArgs, WriteMode,
};
pub use actions::transactions::{
	PrepareSendTransactionArgs, PrepareSendTransactionResult, SendRequest, SendTransactionArgs,
	SendTransactionResult,
};
pub use builder::{BuilderError, ConnectorBuilder, ConnectorFactories};
pub use client::{Client, Connector};

/// Errors returned by the client actions.
#[derive(Debug, Error)]
pub enum TxError {
	/// The caller expected a different chain than the connected account is on.
	#[error("Chain mismatch: Expected \"{target_chain}\", received \"{active_chain}.\"")]
	ChainMismatch {
		active_chain: String,
		target_chain: String,
	},
	/// A request field needed for broadcast is absent.
	#[error("`{0}` is required")]
	MissingField(&'static str),
	/// No connector is connected.
	#[error("Connector not found")]
	ConnectorNotFound,
	/// The ABI has no function with this name taking the given argument count.
	#[error("Function \"{function}\" on contract \"{address}\" does not exist.")]
	FunctionNotFound {
		function: String,
		address: alloy::primitives::Address,
	},
	/// The arguments cannot be encoded for the function.
	#[error("Invalid arguments for function \"{function}\": {message}")]
	InvalidArguments { function: String, message: String },
	#[error(transparent)]
	Delivery(#[from] DeliveryError),
	#[error(transparent)]
	Account(#[from] AccountError),
}
