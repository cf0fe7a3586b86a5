//! Configuration module for the motion-planning server.
//!
//! This module provides structures and utilities for managing server
//! configuration. It supports loading configuration from TOML files, resolves
//! `${VAR}` and `${VAR:-default}` environment references and validates the
//! result before handing it out.
//!
//! Every section has a default, so an empty file (or no file at all) yields a
//! working server exposing `hpp/plannerContext` with the three built-in
//! algorithms of each family.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the planning server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of the server and the names it publishes.
	#[serde(default)]
	pub server: ServerConfig,
	/// Extra arguments for the object broker.
	#[serde(default)]
	pub broker: BrokerConfig,
	/// How the host process pumps requests.
	#[serde(default)]
	pub pump: PumpConfig,
	/// Steering method factories registered at construction.
	#[serde(default = "default_steering")]
	pub steering: AlgorithmConfig,
	/// Distance function factories registered at construction.
	#[serde(default = "default_distance")]
	pub distance: AlgorithmConfig,
	/// Optional HTTP gateway in front of the broker.
	pub gateway: Option<GatewayConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			server: ServerConfig::default(),
			broker: BrokerConfig::default(),
			pump: PumpConfig::default(),
			steering: default_steering(),
			distance: default_distance(),
			gateway: None,
		}
	}
}

/// A two-part name in the naming directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct NameConfig {
	pub id: String,
	pub kind: String,
}

impl NameConfig {
	pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			kind: kind.into(),
		}
	}
}

/// Configuration specific to the server instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
	/// Identifier used in logs.
	#[serde(default = "default_server_id")]
	pub id: String,
	/// Name of the single-threaded child adapter hosting the servants.
	#[serde(default = "default_adapter_name")]
	pub adapter_name: String,
	/// Naming context the three objects are bound under.
	#[serde(default = "default_context")]
	pub context: NameConfig,
	#[serde(default = "default_robot_name")]
	pub robot: NameConfig,
	#[serde(default = "default_obstacle_name")]
	pub obstacle: NameConfig,
	#[serde(default = "default_problem_name")]
	pub problem: NameConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			id: default_server_id(),
			adapter_name: default_adapter_name(),
			context: default_context(),
			robot: default_robot_name(),
			obstacle: default_obstacle_name(),
			problem: default_problem_name(),
		}
	}
}

fn default_server_id() -> String {
	"planner".to_string()
}

fn default_adapter_name() -> String {
	"child".to_string()
}

fn default_context() -> NameConfig {
	NameConfig::new("hpp", "plannerContext")
}

fn default_robot_name() -> NameConfig {
	NameConfig::new("Robot", "Object")
}

fn default_obstacle_name() -> NameConfig {
	NameConfig::new("Obstacle", "Object")
}

fn default_problem_name() -> NameConfig {
	NameConfig::new("Problem", "Object")
}

/// Configuration for the object broker.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrokerConfig {
	/// Arguments appended to the process arguments at broker initialization,
	/// for example `["-ORBid", "planner"]`.
	#[serde(default)]
	pub args: Vec<String>,
}

/// Request pumping mode of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpMode {
	/// The broker's run loop owns the thread until shutdown.
	#[default]
	Blocking,
	/// The host polls for at most one unit of work per tick.
	Cooperative,
}

impl std::fmt::Display for PumpMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PumpMode::Blocking => write!(f, "blocking"),
			PumpMode::Cooperative => write!(f, "cooperative"),
		}
	}
}

impl FromStr for PumpMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"blocking" => Ok(PumpMode::Blocking),
			"cooperative" => Ok(PumpMode::Cooperative),
			other => Err(ConfigError::Parse(format!(
				"Unknown pump mode '{}'. Available: [blocking, cooperative]",
				other
			))),
		}
	}
}

/// Configuration for request pumping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PumpConfig {
	#[serde(default)]
	pub mode: PumpMode,
	/// Tick interval of the cooperative loop in milliseconds.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

impl Default for PumpConfig {
	fn default() -> Self {
		Self {
			mode: PumpMode::default(),
			poll_interval_ms: default_poll_interval_ms(),
		}
	}
}

fn default_poll_interval_ms() -> u64 {
	10
}

/// Configuration for one algorithm family.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlgorithmConfig {
	/// Map of implementation names to their configurations.
	/// Each implementation has its own configuration format stored as raw TOML values.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

fn builtin_implementations() -> AlgorithmConfig {
	let empty = || toml::Value::Table(toml::map::Map::new());
	let mut rs = toml::map::Map::new();
	rs.insert("radius".to_string(), toml::Value::Float(1.0));

	let mut implementations = HashMap::new();
	implementations.insert("linear".to_string(), empty());
	implementations.insert("rs".to_string(), toml::Value::Table(rs));
	implementations.insert("flic".to_string(), empty());
	AlgorithmConfig { implementations }
}

fn default_steering() -> AlgorithmConfig {
	builtin_implementations()
}

fn default_distance() -> AlgorithmConfig {
	builtin_implementations()
}

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Whether the gateway is started.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the gateway to.
	#[serde(default = "default_gateway_host")]
	pub host: String,
	/// Port to bind the gateway to.
	#[serde(default = "default_gateway_port")]
	pub port: u16,
}

fn default_gateway_host() -> String {
	"127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// Supports `include = [...]` directives; see the module documentation.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// - Ensures identifiers and names are not empty
	/// - Checks that the three published object names are distinct
	/// - Requires at least one implementation per algorithm family
	/// - Checks pump and gateway settings
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.server.id.is_empty() {
			return Err(ConfigError::Validation("Server ID cannot be empty".into()));
		}
		if self.server.adapter_name.is_empty() {
			return Err(ConfigError::Validation(
				"Child adapter name cannot be empty".into(),
			));
		}

		let names = [
			("context", &self.server.context),
			("robot", &self.server.robot),
			("obstacle", &self.server.obstacle),
			("problem", &self.server.problem),
		];
		for (section, name) in names {
			if name.id.is_empty() {
				return Err(ConfigError::Validation(format!(
					"server.{}.id cannot be empty",
					section
				)));
			}
		}

		let mut seen = HashSet::new();
		for (section, name) in &names[1..] {
			if !seen.insert(*name) {
				return Err(ConfigError::Validation(format!(
					"Duplicate object name '{}.{}' for server.{}",
					name.id, name.kind, section
				)));
			}
		}

		if self.steering.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one steering implementation required".into(),
			));
		}
		if self.distance.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one distance implementation required".into(),
			));
		}
		for (family, section) in [("steering", &self.steering), ("distance", &self.distance)] {
			for (name, value) in &section.implementations {
				if !value.is_table() {
					return Err(ConfigError::Validation(format!(
						"{}.implementations.{} must be a table",
						family, name
					)));
				}
			}
		}

		if self.pump.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"pump.poll_interval_ms must be greater than 0".into(),
			));
		}

		if let Some(ref gateway) = self.gateway {
			if gateway.enabled && gateway.port == 0 {
				return Err(ConfigError::Validation(
					"gateway.port must be non-zero when the gateway is enabled".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string. Environment variables are
/// resolved and the configuration is validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
