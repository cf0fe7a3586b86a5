//! Distance function module for the motion-planning server.
//!
//! A distance function estimates how far apart two configurations are. The
//! planner uses it to pick the goal to connect to; the car-like metrics
//! mirror the cost of the matching steering methods.

use planner_types::{AlgorithmFactory, Configuration, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod flic;
	pub mod linear;
	pub mod reeds_shepp;
}

/// Errors that can occur while measuring or building distance factories.
#[derive(Debug, Error)]
pub enum DistanceError {
	#[error("Dimension mismatch: {expected} dofs expected, got {actual}")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Unsupported configuration: {0}")]
	UnsupportedConfiguration(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for distance functions.
pub trait DistanceFunction: Send + Sync {
	fn name(&self) -> &'static str;

	/// Whether this instance is the direction-sensitive variant.
	fn is_oriented(&self) -> bool;

	/// Distance from `a` to `b`.
	fn distance(&self, a: &Configuration, b: &Configuration) -> Result<f64, DistanceError>;
}

/// Factory producing distance function instances.
pub type DistanceFunctionFactory = dyn AlgorithmFactory<dyn DistanceFunction>;

/// Type alias for distance factory builders.
pub type DistanceFactoryBuilder =
	fn(&toml::Value) -> Result<Box<DistanceFunctionFactory>, DistanceError>;

/// Registry trait for distance function implementations.
pub trait DistanceRegistry: ImplementationRegistry<Factory = DistanceFactoryBuilder> {}

/// Get all registered distance function implementations.
///
/// Returns a vector of (name, builder) tuples for all available distance
/// functions. This is used by the server's implementation catalog.
pub fn get_all_implementations() -> Vec<(&'static str, DistanceFactoryBuilder)> {
	use implementations::{flic, linear, reeds_shepp};

	vec![
		(linear::Registry::NAME, linear::Registry::factory()),
		(reeds_shepp::Registry::NAME, reeds_shepp::Registry::factory()),
		(flic::Registry::NAME, flic::Registry::factory()),
	]
}

pub(crate) fn check_dimensions(a: &Configuration, b: &Configuration) -> Result<(), DistanceError> {
	if a.len() != b.len() {
		return Err(DistanceError::DimensionMismatch {
			expected: a.len(),
			actual: b.len(),
		});
	}
	Ok(())
}

/// Planar poses of both configurations, or an error naming `algorithm`.
pub(crate) fn planar_poses(
	algorithm: &str,
	a: &Configuration,
	b: &Configuration,
) -> Result<(planner_types::PlanarPose, planner_types::PlanarPose), DistanceError> {
	check_dimensions(a, b)?;
	match (a.planar_pose(), b.planar_pose()) {
		(Some(pa), Some(pb)) => Ok((pa, pb)),
		_ => Err(DistanceError::UnsupportedConfiguration(format!(
			"{} distance needs at least 3 dofs (x, y, theta), got {}",
			algorithm,
			a.len()
		))),
	}
}
