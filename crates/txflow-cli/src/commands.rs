//! Subcommands and their execution.

use alloy::json_abi::JsonAbi;
use alloy::network::TransactionBuilder;
use alloy::primitives::utils::parse_ether;
use clap::Subcommand;
use serde_json::{json, Value};
use std::path::PathBuf;
use txflow_core::{
	Client, ContractArgs, ContractCall, PrepareSendTransactionArgs, PrepareWriteContractArgs,
	SendRequest, SendTransactionArgs, SendTransactionResult, WriteContractArgs, WriteMode,
};
use txflow_types::{
	Address, Bytes, CallOverrides, PreparedTransactionRequest, TransactionRequest, TxHash, U256,
};

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Show the active chain and the configured chains
	Network,
	/// Show the native balance of an address (the connected account by default)
	Balance { address: Option<Address> },
	/// Show the receipt of a transaction, null while it is pending
	Receipt { hash: TxHash },
	/// Send a transaction
	Send(SendArgs),
	/// Call a state-changing contract function
	Write(WriteArgs),
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
	/// Recipient address
	#[arg(long)]
	to: Address,
	/// Value in ether
	#[arg(long, value_parser = parse_ether_value, default_value = "0")]
	value: U256,
	/// Hex-encoded calldata
	#[arg(long, value_parser = parse_hex_data)]
	data: Option<Bytes>,
	#[arg(long)]
	gas_limit: Option<u64>,
	/// Chain the account is expected to be on
	#[arg(long)]
	chain_id: Option<u64>,
	/// Populate the request right before sending instead of preparing it first
	#[arg(long, conflicts_with = "prepare_only")]
	dangerously_prepared: bool,
	/// Print the prepared request without sending it
	#[arg(long)]
	prepare_only: bool,
	/// Wait for this many confirmations and print the receipt
	#[arg(long)]
	wait: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
	/// Contract address
	#[arg(long)]
	address: Address,
	/// Path to the contract's JSON ABI
	#[arg(long)]
	abi: PathBuf,
	/// Function name
	#[arg(long)]
	function: String,
	/// Function argument, repeated in order
	#[arg(long = "arg")]
	args: Vec<String>,
	/// Value in ether
	#[arg(long, value_parser = parse_ether_value)]
	value: Option<U256>,
	#[arg(long)]
	gas_limit: Option<u64>,
	/// Gas price in wei
	#[arg(long)]
	gas_price: Option<u128>,
	#[arg(long)]
	nonce: Option<u64>,
	/// Chain the account is expected to be on
	#[arg(long)]
	chain_id: Option<u64>,
	/// JSON file with a request printed by `--prepare-only`
	#[arg(long, conflicts_with_all = ["dangerously_prepared", "prepare_only"])]
	request: Option<PathBuf>,
	/// Prepare the call right before sending it
	#[arg(long, conflicts_with = "prepare_only")]
	dangerously_prepared: bool,
	/// Print the prepared request without sending it
	#[arg(long)]
	prepare_only: bool,
	/// Wait for this many confirmations and print the receipt
	#[arg(long)]
	wait: Option<u64>,
}

fn parse_ether_value(value: &str) -> Result<U256, String> {
	parse_ether(value).map_err(|e| format!("invalid ether amount '{}': {}", value, e))
}

fn parse_hex_data(value: &str) -> Result<Bytes, String> {
	hex::decode(value.trim_start_matches("0x"))
		.map(Bytes::from)
		.map_err(|e| format!("invalid hex data: {}", e))
}

/// Runs `command` against a connected client and returns what to print.
pub async fn run(client: &Client, command: Command) -> Result<Value, Box<dyn std::error::Error>> {
	match command {
		Command::Network => Ok(serde_json::to_value(client.get_network())?),
		Command::Balance { address } => balance(client, address).await,
		Command::Receipt { hash } => {
			Ok(serde_json::to_value(client.get_transaction_receipt(&hash).await?)?)
		},
		Command::Send(args) => send(client, args).await,
		Command::Write(args) => write(client, args).await,
	}
}

async fn balance(
	client: &Client,
	address: Option<Address>,
) -> Result<Value, Box<dyn std::error::Error>> {
	let address = address
		.or_else(|| client.address())
		.ok_or("No address given and no account connected")?;
	let balance = client.get_balance(address).await?;
	Ok(json!({ "address": address, "balance": balance.to_string() }))
}

async fn send(client: &Client, args: SendArgs) -> Result<Value, Box<dyn std::error::Error>> {
	let mut request = TransactionRequest::default()
		.with_to(args.to)
		.with_value(args.value);
	if let Some(data) = args.data {
		request.set_input(data);
	}
	if let Some(gas_limit) = args.gas_limit {
		request.set_gas_limit(gas_limit);
	}

	let request = if args.dangerously_prepared {
		SendRequest::DangerouslyPrepared(request)
	} else {
		let prepared = client
			.prepare_send_transaction(PrepareSendTransactionArgs {
				chain_id: args.chain_id,
				request,
			})
			.await?;
		if args.prepare_only {
			return Ok(serde_json::to_value(&prepared.request)?);
		}
		SendRequest::Prepared(prepared.request)
	};

	let result = client
		.send_transaction(SendTransactionArgs {
			chain_id: args.chain_id,
			request,
		})
		.await?;
	report(result, args.wait).await
}

async fn write(client: &Client, args: WriteArgs) -> Result<Value, Box<dyn std::error::Error>> {
	let abi: JsonAbi = serde_json::from_str(&tokio::fs::read_to_string(&args.abi).await?)?;
	let call = ContractCall::new(args.address, abi, args.function)
		.with_args(ContractArgs::Strings(args.args))
		.with_overrides(CallOverrides {
			value: args.value,
			gas_limit: args.gas_limit,
			gas_price: args.gas_price,
			nonce: args.nonce,
		});

	let mode = if args.dangerously_prepared {
		WriteMode::DangerouslyPrepared
	} else if let Some(path) = &args.request {
		let request: PreparedTransactionRequest =
			serde_json::from_str(&tokio::fs::read_to_string(path).await?)?;
		WriteMode::Prepared(Some(request))
	} else {
		let prepared = client
			.prepare_write_contract(PrepareWriteContractArgs {
				chain_id: args.chain_id,
				call: call.clone(),
			})
			.await?;
		if args.prepare_only {
			return Ok(serde_json::to_value(&prepared.request)?);
		}
		WriteMode::Prepared(Some(prepared.request))
	};

	let result = client
		.write_contract(WriteContractArgs {
			chain_id: args.chain_id,
			call,
			mode,
		})
		.await?;
	report(result, args.wait).await
}

async fn report(
	result: SendTransactionResult,
	wait: Option<u64>,
) -> Result<Value, Box<dyn std::error::Error>> {
	let mut output = json!({
		"hash": result.hash,
		"from": result.from,
		"nonce": result.nonce,
		"gasLimit": result.gas_limit,
		"gasPrice": result.gas_price.map(|price| price.to_string()),
		"blockNumber": result.block_number,
	});

	if let Some(confirmations) = wait {
		let receipt = result.wait(Some(confirmations)).await?;
		output["receipt"] = serde_json::to_value(&receipt)?;
	}
	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::build_connector_from_config;
	use clap::Parser;
	use txflow_config::ConfigBuilder;

	#[derive(Parser)]
	struct Cli {
		#[command(subcommand)]
		command: Command,
	}

	fn parse(args: &[&str]) -> Command {
		Cli::try_parse_from(std::iter::once("txflow").chain(args.iter().copied()))
			.unwrap()
			.command
	}

	async fn connected_client() -> Client {
		let config = ConfigBuilder::new().build();
		let client = Client::from_config(&config);
		client
			.connect(build_connector_from_config(&config).await.unwrap())
			.await
			.unwrap();
		client
	}

	const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

	#[test]
	fn test_value_parsers() {
		assert_eq!(
			parse_ether_value("1.5").unwrap(),
			U256::from(1_500_000_000_000_000_000u128)
		);
		assert!(parse_ether_value("ten").is_err());
		assert_eq!(parse_hex_data("0x0102").unwrap(), Bytes::from(vec![1u8, 2]));
		assert!(parse_hex_data("0xzz").is_err());
	}

	#[test]
	fn test_request_conflicts_with_dangerously_prepared() {
		let result = Cli::try_parse_from([
			"txflow",
			"write",
			"--address",
			RECIPIENT,
			"--abi",
			"abi.json",
			"--function",
			"mint",
			"--request",
			"req.json",
			"--dangerously-prepared",
		]);
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn test_network_command() {
		let client = connected_client().await;
		let output = run(&client, parse(&["network"])).await.unwrap();

		assert_eq!(output["chain"]["id"], 1);
		assert_eq!(output["chain"]["name"], "Ethereum");
		assert_eq!(output["chains"].as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_send_command() {
		let client = connected_client().await;
		let output = run(
			&client,
			parse(&["send", "--to", RECIPIENT, "--value", "10", "--wait", "1"]),
		)
		.await
		.unwrap();

		assert_eq!(output["gasLimit"], 21_000);
		assert_eq!(output["blockNumber"], 1);
		assert_eq!(output["receipt"]["success"], true);

		let balance = run(&client, parse(&["balance", RECIPIENT])).await.unwrap();
		assert_eq!(balance["balance"], "10010000000000000000000");

		let hash = output["hash"].as_str().unwrap().to_string();
		let receipt = run(&client, parse(&["receipt", &hash])).await.unwrap();
		assert_eq!(receipt["block_number"], 1);
		assert_eq!(receipt["success"], true);
	}

	#[tokio::test]
	async fn test_send_chain_mismatch() {
		let client = connected_client().await;
		let err = run(
			&client,
			parse(&["send", "--to", RECIPIENT, "--chain-id", "420"]),
		)
		.await
		.err()
		.unwrap();
		assert_eq!(
			err.to_string(),
			"Chain mismatch: Expected \"Chain 420\", received \"Ethereum.\""
		);
	}

	#[tokio::test]
	async fn test_write_command_with_prepared_request_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let abi_path = dir.path().join("token.json");
		std::fs::write(
			&abi_path,
			r#"[{"type":"function","name":"mint","stateMutability":"payable",
			     "inputs":[{"name":"amount","type":"uint256"}],"outputs":[]}]"#,
		)
		.unwrap();
		let abi = abi_path.to_str().unwrap();
		let contract = "0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa";

		let client = connected_client().await;
		let prepared = run(
			&client,
			parse(&[
				"write",
				"--address",
				contract,
				"--abi",
				abi,
				"--function",
				"mint",
				"--arg",
				"5",
				"--prepare-only",
			]),
		)
		.await
		.unwrap();

		let request_path = dir.path().join("request.json");
		std::fs::write(&request_path, prepared.to_string()).unwrap();

		let output = run(
			&client,
			parse(&[
				"write",
				"--address",
				contract,
				"--abi",
				abi,
				"--function",
				"mint",
				"--arg",
				"5",
				"--request",
				request_path.to_str().unwrap(),
			]),
		)
		.await
		.unwrap();
		assert_eq!(output["blockNumber"], 1);
	}

	#[tokio::test]
	async fn test_write_unknown_function() {
		let dir = tempfile::TempDir::new().unwrap();
		let abi_path = dir.path().join("empty.json");
		std::fs::write(&abi_path, "[]").unwrap();

		let client = connected_client().await;
		let err = run(
			&client,
			parse(&[
				"write",
				"--address",
				RECIPIENT,
				"--abi",
				abi_path.to_str().unwrap(),
				"--function",
				"mint",
				"--dangerously-prepared",
			]),
		)
		.await
		.err()
		.unwrap();
		assert!(err.to_string().starts_with("Function \"mint\" on contract"));
	}
}
