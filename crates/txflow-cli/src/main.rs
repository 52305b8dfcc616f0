//! Command-line entry point for txflow.
//!
//! Loads a configuration, connects the configured account through its
//! delivery implementation and runs one action: report the network, send a
//! value transfer or write to a contract.

use clap::Parser;
use std::path::PathBuf;
use txflow_config::Config;
use txflow_core::Client;

mod commands;
mod factory_registry;

use commands::Command;

/// Command-line arguments for the txflow binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "TXFLOW_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.client.id);

	let client = Client::from_config(&config);
	let connector = factory_registry::build_connector_from_config(&config).await?;
	client.connect(connector).await?;

	let output = commands::run(&client, args.command).await?;
	println!("{}", serde_json::to_string_pretty(&output)?);

	client.disconnect();
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_global_flags() {
		let args = Args::try_parse_from(["txflow", "-c", "dev.toml", "-l", "debug", "network"])
			.unwrap();
		assert_eq!(args.config, PathBuf::from("dev.toml"));
		assert_eq!(args.log_level, "debug");
		assert!(matches!(args.command, Command::Network));
	}

	#[test]
	fn test_subcommand_required() {
		assert!(Args::try_parse_from(["txflow"]).is_err());
	}
}
