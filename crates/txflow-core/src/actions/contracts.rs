//! Preparing and sending contract calls.

use crate::actions::transactions::{populate, SendRequest, SendTransactionArgs, SendTransactionResult};
use crate::client::Client;
use crate::TxError;
use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy::json_abi::{Function, JsonAbi};
use alloy::network::TransactionBuilder;
use txflow_types::{Address, Bytes, CallOverrides, PreparedTransactionRequest, TransactionRequest};

/// Arguments of a contract function.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractArgs {
	/// Already typed values.
	Values(Vec<DynSolValue>),
	/// Strings parsed against the parameter types of the function.
	Strings(Vec<String>),
}

impl Default for ContractArgs {
	fn default() -> Self {
		ContractArgs::Values(Vec::new())
	}
}

impl ContractArgs {
	fn len(&self) -> usize {
		match self {
			ContractArgs::Values(values) => values.len(),
			ContractArgs::Strings(strings) => strings.len(),
		}
	}
}

/// A call of `function_name` on the contract at `address`.
#[derive(Debug, Clone)]
pub struct ContractCall {
	pub address: Address,
	pub abi: JsonAbi,
	pub function_name: String,
	pub args: ContractArgs,
	pub overrides: CallOverrides,
}

impl ContractCall {
	pub fn new(address: Address, abi: JsonAbi, function_name: impl Into<String>) -> Self {
		Self {
			address,
			abi,
			function_name: function_name.into(),
			args: ContractArgs::default(),
			overrides: CallOverrides::default(),
		}
	}

	pub fn with_args(mut self, args: ContractArgs) -> Self {
		self.args = args;
		self
	}

	pub fn with_overrides(mut self, overrides: CallOverrides) -> Self {
		self.overrides = overrides;
		self
	}

	/// ABI-encodes the call.
	///
	/// Overloads are narrowed to those taking as many inputs as there are
	/// arguments; the first one the arguments encode for is used.
	pub fn encode(&self) -> Result<Bytes, TxError> {
		let candidates: Vec<&Function> = self
			.abi
			.function(&self.function_name)
			.map(|overloads| {
				overloads
					.iter()
					.filter(|function| function.inputs.len() == self.args.len())
					.collect()
			})
			.unwrap_or_default();

		if candidates.is_empty() {
			return Err(TxError::FunctionNotFound {
				function: self.function_name.clone(),
				address: self.address,
			});
		}

		let mut last_error = String::new();
		for function in candidates {
			match self.encode_for(function) {
				Ok(data) => return Ok(data),
				Err(message) => last_error = message,
			}
		}

		Err(TxError::InvalidArguments {
			function: self.function_name.clone(),
			message: last_error,
		})
	}

	fn encode_for(&self, function: &Function) -> Result<Bytes, String> {
		let values = match &self.args {
			ContractArgs::Values(values) => values.clone(),
			ContractArgs::Strings(strings) => {
				let types = function
					.inputs
					.iter()
					.map(Specifier::<DynSolType>::resolve)
					.collect::<Result<Vec<_>, _>>()
					.map_err(|e| e.to_string())?;
				strings
					.iter()
					.zip(types.iter())
					.map(|(raw, ty)| ty.coerce_str(raw).map_err(|e| e.to_string()))
					.collect::<Result<Vec<_>, _>>()?
			},
		};

		function
			.abi_encode_input(&values)
			.map(Bytes::from)
			.map_err(|e| e.to_string())
	}
}

/// Arguments of [`Client::prepare_write_contract`].
#[derive(Debug, Clone)]
pub struct PrepareWriteContractArgs {
	pub chain_id: Option<u64>,
	pub call: ContractCall,
}

/// A prepared contract call, ready for [`Client::write_contract`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareWriteContractResult {
	pub chain_id: Option<u64>,
	pub request: PreparedTransactionRequest,
}

/// Whether [`Client::write_contract`] receives a prepared request.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteMode {
	/// The request from [`Client::prepare_write_contract`].
	///
	/// `None` is rejected; it shows up when arguments are assembled from
	/// external input.
	Prepared(Option<PreparedTransactionRequest>),
	/// Prepare the call right before sending it.
	DangerouslyPrepared,
}

/// Arguments of [`Client::write_contract`].
#[derive(Debug, Clone)]
pub struct WriteContractArgs {
	pub chain_id: Option<u64>,
	pub call: ContractCall,
	pub mode: WriteMode,
}

impl Client {
	/// Encodes a contract call and populates it without sending it.
	///
	/// Overrides are applied before population, so an overridden gas limit
	/// is kept and no estimate is made for it.
	pub async fn prepare_write_contract(
		&self,
		args: PrepareWriteContractArgs,
	) -> Result<PrepareWriteContractResult, TxError> {
		self.assert_active_chain(args.chain_id)?;
		let connection = self.connection()?;

		let call = &args.call;
		let data = call.encode()?;
		let request = call.overrides.apply(
			TransactionRequest::default()
				.with_to(call.address)
				.with_input(data),
		);

		tracing::debug!(
			contract = %call.address,
			function = %call.function_name,
			"Preparing contract call"
		);
		let request = populate(&connection, request).await?;

		Ok(PrepareWriteContractResult {
			chain_id: args.chain_id,
			request,
		})
	}

	/// Sends a contract call.
	///
	/// The expected chain is checked first. A prepared mode must carry its
	/// request; a dangerously prepared call is prepared here. The request is
	/// then sent through [`Client::send_transaction`].
	pub async fn write_contract(
		&self,
		args: WriteContractArgs,
	) -> Result<SendTransactionResult, TxError> {
		self.assert_active_chain(args.chain_id)?;

		let request = match args.mode {
			WriteMode::Prepared(Some(request)) => request,
			WriteMode::Prepared(None) => return Err(TxError::MissingField("request")),
			WriteMode::DangerouslyPrepared => {
				self.prepare_write_contract(PrepareWriteContractArgs {
					chain_id: None,
					call: args.call,
				})
				.await?
				.request
			},
		};

		self.send_transaction(SendTransactionArgs {
			chain_id: None,
			request: SendRequest::Prepared(request),
		})
		.await
	}
}
