//! Main entry point for the planning server.
//!
//! This binary publishes a motion planner as remote objects. Depending on the
//! pump mode it either hands its thread to the broker's run loop, or polls the
//! broker from its own event loop once per tick.

use clap::Parser;
use planner_config::{Config, PumpMode};
use planner_core::{Planner, PlannerHandle};
use planner_service::gateway::{self, GatewayState};
use planner_service::Server;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Command-line arguments for the planning server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file; built-in defaults apply when omitted
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Request pumping mode (blocking, cooperative), overrides the configuration
	#[arg(short, long)]
	mode: Option<PumpMode>,

	/// Arguments forwarded to the object broker, e.g. `-- -ORBid planner`
	#[arg(last = true)]
	broker_args: Vec<String>,
}

/// Main entry point for the planning server.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the server and publishes its objects
/// 5. Pumps requests until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started planner server");

	let config = load_config(args.config.as_deref()).await?;
	tracing::info!("Loaded configuration [{}]", config.server.id);
	let mode = args.mode.unwrap_or(config.pump.mode);

	let planner: PlannerHandle = Arc::new(Mutex::new(Planner::new()));
	let mut server = Server::new(planner, &args.broker_args, &config)?;
	server.start_serving()?;

	if let Some(gateway_config) = config.gateway.clone().filter(|gateway| gateway.enabled) {
		let naming = server.naming().ok_or("naming directory unavailable")?;
		let state = GatewayState::new(naming, server.naming_context());
		tokio::spawn(async move {
			if let Err(e) = gateway::start_gateway(gateway_config, state).await {
				tracing::error!("Gateway stopped: {}", e);
			}
		});
	}

	match mode {
		PumpMode::Blocking => {
			let handle = server.shutdown_handle().ok_or("broker unavailable")?;
			tokio::spawn(async move {
				if tokio::signal::ctrl_c().await.is_ok() {
					tracing::info!("Received interrupt, shutting down");
					handle.shutdown();
				}
			});
			tracing::info!("Entering blocking request loop");
			tokio::task::block_in_place(|| server.run())?;
		},
		PumpMode::Cooperative => {
			tracing::info!(
				interval_ms = config.pump.poll_interval_ms,
				"Entering cooperative request loop"
			);
			let mut interval =
				tokio::time::interval(Duration::from_millis(config.pump.poll_interval_ms));
			let interrupted = tokio::signal::ctrl_c();
			tokio::pin!(interrupted);
			loop {
				tokio::select! {
					_ = interval.tick() => {
						while server.poll()? {}
					}
					_ = &mut interrupted => {
						tracing::info!("Received interrupt, shutting down");
						break;
					}
				}
			}
		},
	}

	drop(server);
	tracing::info!("Stopped planner server");
	Ok(())
}

/// Loads the configuration file, or the defaults when no path is given.
async fn load_config(path: Option<&std::path::Path>) -> Result<Config, Box<dyn std::error::Error>> {
	let Some(path) = path else {
		return Ok(Config::default());
	};
	let path = path
		.to_str()
		.ok_or_else(|| format!("Configuration path is not valid UTF-8: {}", path.display()))?;
	Ok(Config::from_file(path).await?)
}
