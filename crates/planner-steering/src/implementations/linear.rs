//! Linear steering method.
//!
//! Connects two configurations by straight interpolation of every dof. The
//! path is symmetric, so both variants produce the same geometry; the
//! orientation flag is carried for callers that inspect it.

use crate::{
	check_dimensions, SteeringError, SteeringFactoryBuilder, SteeringMethod,
	SteeringMethodFactory, SteeringRegistry,
};
use planner_types::{
	AlgorithmFactory, ConfigSchema, Configuration, ImplementationRegistry, Path, Schema,
	ValidationError,
};

/// Straight-line steering method.
pub struct LinearSteeringMethod {
	oriented: bool,
}

impl LinearSteeringMethod {
	pub fn new(oriented: bool) -> Self {
		Self { oriented }
	}
}

impl SteeringMethod for LinearSteeringMethod {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn is_oriented(&self) -> bool {
		self.oriented
	}

	fn steer(&self, from: &Configuration, to: &Configuration) -> Result<Path, SteeringError> {
		check_dimensions(from, to)?;
		let length = from.euclidean_distance(to).unwrap_or(0.0);
		Ok(Path::new(vec![from.clone(), to.clone()], length)?)
	}
}

/// Factory for [`LinearSteeringMethod`].
pub struct LinearSteeringFactory;

impl AlgorithmFactory<dyn SteeringMethod> for LinearSteeringFactory {
	fn create(&self, oriented: bool) -> Box<dyn SteeringMethod> {
		Box::new(LinearSteeringMethod::new(oriented))
	}
}

/// Configuration schema for the linear steering method.
pub struct LinearSteeringSchema;

impl ConfigSchema for LinearSteeringSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No parameters
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Builds the linear steering factory from configuration.
pub fn create_factory(config: &toml::Value) -> Result<Box<SteeringMethodFactory>, SteeringError> {
	LinearSteeringSchema
		.validate(config)
		.map_err(|e| SteeringError::Configuration(format!("Invalid linear config: {}", e)))?;
	Ok(Box::new(LinearSteeringFactory))
}

/// Registry for the linear steering method.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "linear";
	type Factory = SteeringFactoryBuilder;

	fn factory() -> Self::Factory {
		create_factory
	}
}

impl SteeringRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_straight_path() {
		let method = LinearSteeringMethod::new(false);
		let from = Configuration::new(vec![0.0, 0.0]);
		let to = Configuration::new(vec![3.0, 4.0]);

		let path = method.steer(&from, &to).unwrap();
		assert_eq!(path.length(), 5.0);
		assert_eq!(path.start(), &from);
		assert_eq!(path.end(), &to);
	}

	#[test]
	fn test_dimension_mismatch() {
		let method = LinearSteeringMethod::new(true);
		let result = method.steer(
			&Configuration::new(vec![0.0]),
			&Configuration::new(vec![0.0, 1.0]),
		);
		assert!(matches!(result, Err(SteeringError::DimensionMismatch { .. })));
	}

	#[test]
	fn test_rejects_parameters() {
		let config: toml::Value = toml::from_str("radius = 1.0").unwrap();
		assert!(matches!(
			create_factory(&config),
			Err(SteeringError::Configuration(_))
		));
	}
}
