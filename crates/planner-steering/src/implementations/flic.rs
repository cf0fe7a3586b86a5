//! Smooth steering method following a cubic Hermite curve.
//!
//! The planar part follows a cubic curve whose end tangents are aligned with
//! the start and goal headings, scaled by the distance between the two
//! positions. When the goal lies behind the start and the method is not
//! oriented, the curve is driven backwards. The curve is sampled into a
//! polyline whose planar length is the path length.

use crate::{
	check_planar, SteeringError, SteeringFactoryBuilder, SteeringMethod, SteeringMethodFactory,
	SteeringRegistry,
};
use planner_types::{
	normalize_angle, AlgorithmFactory, ConfigSchema, Configuration, Field, FieldType,
	ImplementationRegistry, Path, PlanarPose, Schema, ValidationError,
};
use std::f64::consts::PI;

/// Number of curve samples used when the configuration table omits one.
pub const DEFAULT_SAMPLES: usize = 16;

const POSITION_EPSILON: f64 = 1e-9;

/// Hermite-curve steering method.
pub struct FlicSteeringMethod {
	samples: usize,
	oriented: bool,
}

impl FlicSteeringMethod {
	pub fn new(samples: usize, oriented: bool) -> Self {
		Self {
			samples: samples.max(2),
			oriented,
		}
	}

	fn curve(start: &PlanarPose, goal: &PlanarPose, reverse: bool, t: f64) -> PlanarPose {
		let scale = start.planar_distance(goal) * if reverse { -1.0 } else { 1.0 };
		let (t0x, t0y) = (scale * start.theta.cos(), scale * start.theta.sin());
		let (t1x, t1y) = (scale * goal.theta.cos(), scale * goal.theta.sin());

		let t2 = t * t;
		let t3 = t2 * t;
		let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
		let h10 = t3 - 2.0 * t2 + t;
		let h01 = -2.0 * t3 + 3.0 * t2;
		let h11 = t3 - t2;

		let x = h00 * start.x + h10 * t0x + h01 * goal.x + h11 * t1x;
		let y = h00 * start.y + h10 * t0y + h01 * goal.y + h11 * t1y;

		let d00 = 6.0 * t2 - 6.0 * t;
		let d10 = 3.0 * t2 - 4.0 * t + 1.0;
		let d01 = -6.0 * t2 + 6.0 * t;
		let d11 = 3.0 * t2 - 2.0 * t;
		let dx = d00 * start.x + d10 * t0x + d01 * goal.x + d11 * t1x;
		let dy = d00 * start.y + d10 * t0y + d01 * goal.y + d11 * t1y;

		let theta = if dx.hypot(dy) < POSITION_EPSILON {
			start.theta + normalize_angle(goal.theta - start.theta) * t
		} else if reverse {
			normalize_angle(dy.atan2(dx) + PI)
		} else {
			dy.atan2(dx)
		};

		PlanarPose::new(x, y, theta)
	}
}

impl SteeringMethod for FlicSteeringMethod {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn is_oriented(&self) -> bool {
		self.oriented
	}

	fn steer(&self, from: &Configuration, to: &Configuration) -> Result<Path, SteeringError> {
		check_planar(Registry::NAME, from, to)?;
		let (Some(start), Some(goal)) = (from.planar_pose(), to.planar_pose()) else {
			return Err(SteeringError::UnsupportedConfiguration(
				"missing planar pose".to_string(),
			));
		};

		// Rotation on the spot.
		if start.planar_distance(&goal) < POSITION_EPSILON {
			let length = normalize_angle(goal.theta - start.theta).abs();
			return Ok(Path::new(vec![from.clone(), to.clone()], length)?);
		}

		let ahead = start.theta.cos() * (goal.x - start.x) + start.theta.sin() * (goal.y - start.y);
		let reverse = !self.oriented && ahead < 0.0;

		let last = self.samples - 1;
		let mut waypoints = Vec::with_capacity(self.samples);
		let mut length = 0.0;
		let mut previous = start;
		for i in 0..self.samples {
			let t = i as f64 / last as f64;
			let pose = if i == 0 {
				start
			} else if i == last {
				goal
			} else {
				Self::curve(&start, &goal, reverse, t)
			};
			length += previous.planar_distance(&pose);
			previous = pose;
			waypoints.push(from.interpolate(to, t).with_planar_pose(pose));
		}

		Ok(Path::new(waypoints, length)?)
	}
}

/// Factory capturing the sampling resolution.
pub struct FlicSteeringFactory {
	samples: usize,
}

impl AlgorithmFactory<dyn SteeringMethod> for FlicSteeringFactory {
	fn create(&self, oriented: bool) -> Box<dyn SteeringMethod> {
		Box::new(FlicSteeringMethod::new(self.samples, oriented))
	}
}

/// Configuration schema for the Hermite-curve steering method.
pub struct FlicSchema;

impl ConfigSchema for FlicSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"samples",
				FieldType::Integer {
					min: Some(2),
					max: Some(1024),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Builds the Hermite-curve steering factory from configuration.
pub fn create_factory(config: &toml::Value) -> Result<Box<SteeringMethodFactory>, SteeringError> {
	FlicSchema
		.validate(config)
		.map_err(|e| SteeringError::Configuration(format!("Invalid flic config: {}", e)))?;

	let samples = config
		.get("samples")
		.and_then(|v| v.as_integer())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_SAMPLES);

	Ok(Box::new(FlicSteeringFactory { samples }))
}

/// Registry for the Hermite-curve steering method.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "flic";
	type Factory = SteeringFactoryBuilder;

	fn factory() -> Self::Factory {
		create_factory
	}
}

impl SteeringRegistry for Registry {}
