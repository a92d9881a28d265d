//! Main entry point for the marketplace order service.
//!
//! This binary wires the storage backend named by the configuration into
//! the order engine and serves the HTTP API until interrupted.

use clap::Parser;
use market_config::Config;
use market_core::OrderEngine;
use market_storage::{StorageFactory, StorageService};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Builds the storage service from the configured backend.
///
/// The backend's own configuration block is validated against the
/// schema it exposes before the service starts taking requests.
fn build_storage(config: &Config) -> Result<StorageService, Box<dyn std::error::Error>> {
	let factories: HashMap<&'static str, StorageFactory> =
		market_storage::get_all_implementations().into_iter().collect();

	let factory = factories
		.get(config.storage.primary.as_str())
		.ok_or_else(|| format!("Unknown storage backend '{}'", config.storage.primary))?;

	let backend_config = config
		.storage
		.implementations
		.get(&config.storage.primary)
		.cloned()
		.unwrap_or_else(|| toml::Value::Table(toml::Table::new()));

	let backend = factory(&backend_config)?;
	backend.config_schema().validate(&backend_config)?;

	Ok(StorageService::new(backend))
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the order engine over the configured storage backend
/// 5. Serves the HTTP API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order service");

	// Load configuration
	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let storage = Arc::new(build_storage(&config)?);
	let engine = Arc::new(OrderEngine::new(storage, &config.orders));

	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);
	if !api_enabled {
		tracing::warn!("API server disabled by configuration, nothing to serve");
		return Ok(());
	}

	let api_config = config.api.clone().ok_or("API configuration missing")?;

	tokio::select! {
		result = server::start_server(api_config, Arc::clone(&engine), config) => {
			tracing::info!("API server finished");
			result?;
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Stopped order service");
	Ok(())
}
