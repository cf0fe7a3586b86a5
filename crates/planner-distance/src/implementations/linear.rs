//! Euclidean distance over every dof.

use crate::{
	check_dimensions, DistanceError, DistanceFactoryBuilder, DistanceFunction,
	DistanceFunctionFactory, DistanceRegistry,
};
use planner_types::{
	AlgorithmFactory, ConfigSchema, Configuration, ImplementationRegistry, Schema,
	ValidationError,
};

pub struct LinearDistance {
	oriented: bool,
}

impl DistanceFunction for LinearDistance {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn is_oriented(&self) -> bool {
		self.oriented
	}

	fn distance(&self, a: &Configuration, b: &Configuration) -> Result<f64, DistanceError> {
		check_dimensions(a, b)?;
		Ok(a.euclidean_distance(b).unwrap_or(0.0))
	}
}

pub struct LinearDistanceFactory;

impl AlgorithmFactory<dyn DistanceFunction> for LinearDistanceFactory {
	fn create(&self, oriented: bool) -> Box<dyn DistanceFunction> {
		Box::new(LinearDistance { oriented })
	}
}

pub struct LinearDistanceSchema;

impl ConfigSchema for LinearDistanceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Builds the Euclidean distance factory; the table takes no parameters.
pub fn create_factory(
	config: &toml::Value,
) -> Result<Box<DistanceFunctionFactory>, DistanceError> {
	LinearDistanceSchema
		.validate(config)
		.map_err(|e| DistanceError::Configuration(format!("Invalid linear config: {}", e)))?;
	Ok(Box::new(LinearDistanceFactory))
}

/// Registry for the Euclidean distance.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "linear";
	type Factory = DistanceFactoryBuilder;

	fn factory() -> Self::Factory {
		create_factory
	}
}

impl DistanceRegistry for Registry {}
