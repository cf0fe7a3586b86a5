//! Steering method module for the motion-planning server.
//!
//! A steering method computes a path segment between two robot
//! configurations. Implementations are selected by name at runtime: each one
//! declares a registry entry whose builder turns a TOML table into an
//! [`AlgorithmFactory`] producing oriented or non-oriented instances.

use planner_types::{AlgorithmFactory, Configuration, ImplementationRegistry, Path, PathError};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod flic;
	pub mod linear;
	pub mod reeds_shepp;
}

/// Errors that can occur while steering or building steering factories.
#[derive(Debug, Error)]
pub enum SteeringError {
	/// The configurations have different dimensions.
	#[error("Dimension mismatch: {expected} dofs expected, got {actual}")]
	DimensionMismatch { expected: usize, actual: usize },
	/// The algorithm cannot handle this kind of configuration.
	#[error("Unsupported configuration: {0}")]
	UnsupportedConfiguration(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The produced path was rejected.
	#[error("Path error: {0}")]
	Path(#[from] PathError),
}

/// Trait defining the interface for steering methods.
pub trait SteeringMethod: Send + Sync {
	/// Registry name of the algorithm.
	fn name(&self) -> &'static str;

	/// Whether this instance is the direction-sensitive variant.
	fn is_oriented(&self) -> bool;

	/// Computes a path from `from` to `to`.
	fn steer(&self, from: &Configuration, to: &Configuration) -> Result<Path, SteeringError>;
}

/// Factory producing steering method instances.
pub type SteeringMethodFactory = dyn AlgorithmFactory<dyn SteeringMethod>;

/// Type alias for steering factory builders.
///
/// Every implementation provides one: it validates the implementation's TOML
/// table and captures its parameters in the returned factory.
pub type SteeringFactoryBuilder =
	fn(&toml::Value) -> Result<Box<SteeringMethodFactory>, SteeringError>;

/// Registry trait for steering method implementations.
pub trait SteeringRegistry: ImplementationRegistry<Factory = SteeringFactoryBuilder> {}

/// Get all registered steering method implementations.
///
/// Returns a vector of (name, builder) tuples for all available steering
/// methods. This is used by the server's implementation catalog.
pub fn get_all_implementations() -> Vec<(&'static str, SteeringFactoryBuilder)> {
	use implementations::{flic, linear, reeds_shepp};

	vec![
		(linear::Registry::NAME, linear::Registry::factory()),
		(reeds_shepp::Registry::NAME, reeds_shepp::Registry::factory()),
		(flic::Registry::NAME, flic::Registry::factory()),
	]
}

/// Checks that both configurations have the same number of dofs.
pub(crate) fn check_dimensions(
	from: &Configuration,
	to: &Configuration,
) -> Result<(), SteeringError> {
	if from.len() != to.len() {
		return Err(SteeringError::DimensionMismatch {
			expected: from.len(),
			actual: to.len(),
		});
	}
	Ok(())
}

/// Checks that the configurations carry a planar pose.
pub(crate) fn check_planar(
	algorithm: &str,
	from: &Configuration,
	to: &Configuration,
) -> Result<(), SteeringError> {
	check_dimensions(from, to)?;
	if from.planar_pose().is_none() {
		return Err(SteeringError::UnsupportedConfiguration(format!(
			"{} steering needs at least 3 dofs (x, y, theta), got {}",
			algorithm,
			from.len()
		)));
	}
	Ok(())
}
