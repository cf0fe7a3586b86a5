//! Obstacle servant.

use super::{failed, lock, parse, reply, unknown};
use planner_broker::{Servant, ServantError};
use planner_core::{Obstacle, PlannerHandle, Shape};
use serde::Deserialize;
use serde_json::Value;

const INTERFACE: &str = "Obstacle";

#[derive(Debug, Deserialize)]
struct AddObstacle {
	name: String,
	shape: Shape,
	#[serde(default)]
	position: [f64; 3],
}

#[derive(Debug, Deserialize)]
struct Named {
	name: String,
}

/// Manages the obstacles of the problem.
pub struct ObstacleServant {
	planner: PlannerHandle,
}

impl ObstacleServant {
	pub fn new(planner: PlannerHandle) -> Self {
		Self { planner }
	}
}

impl Servant for ObstacleServant {
	fn interface(&self) -> &'static str {
		INTERFACE
	}

	fn dispatch(&mut self, operation: &str, args: Value) -> Result<Value, ServantError> {
		let mut planner = lock(&self.planner);
		match operation {
			"addObstacle" => {
				let args: AddObstacle = parse(args)?;
				planner
					.add_obstacle(&args.name, Obstacle::new(args.shape, args.position))
					.map_err(failed)?;
				Ok(Value::Null)
			},
			"removeObstacle" => {
				let args: Named = parse(args)?;
				planner.remove_obstacle(&args.name).map_err(failed)?;
				Ok(Value::Null)
			},
			"getObstacleNames" => reply(planner.obstacle_names()),
			"getObstaclePosition" => {
				let args: Named = parse(args)?;
				reply(planner.obstacle(&args.name).map_err(failed)?.position)
			},
			other => Err(unknown(INTERFACE, other)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::servants::testing::call;
	use planner_core::Planner;
	use serde_json::json;
	use std::sync::{Arc, Mutex};

	#[test]
	fn test_obstacle_operations() {
		let mut obstacles = ObstacleServant::new(Arc::new(Mutex::new(Planner::new())));

		call(
			&mut obstacles,
			"addObstacle",
			json!({"name": "wall", "shape": {"type": "box", "x": 1.0, "y": 0.1, "z": 2.0}, "position": [2.0, 0.0, 1.0]}),
		)
		.unwrap();
		call(
			&mut obstacles,
			"addObstacle",
			json!({"name": "post", "shape": {"type": "cylinder", "radius": 0.1, "height": 1.0}}),
		)
		.unwrap();

		assert_eq!(
			call(&mut obstacles, "getObstacleNames", Value::Null).unwrap(),
			json!(["post", "wall"])
		);
		assert_eq!(
			call(&mut obstacles, "getObstaclePosition", json!({"name": "wall"})).unwrap(),
			json!([2.0, 0.0, 1.0])
		);
		assert_eq!(
			call(&mut obstacles, "getObstaclePosition", json!({"name": "post"})).unwrap(),
			json!([0.0, 0.0, 0.0])
		);

		call(&mut obstacles, "removeObstacle", json!({"name": "post"})).unwrap();
		assert!(matches!(
			call(&mut obstacles, "removeObstacle", json!({"name": "post"})),
			Err(ServantError::Failed(_))
		));
	}

	#[test]
	fn test_invalid_obstacles_rejected() {
		let mut obstacles = ObstacleServant::new(Arc::new(Mutex::new(Planner::new())));
		assert!(matches!(
			call(
				&mut obstacles,
				"addObstacle",
				json!({"name": "ball", "shape": {"type": "sphere", "radius": -1.0}}),
			),
			Err(ServantError::Failed(_))
		));
		assert!(matches!(
			call(
				&mut obstacles,
				"addObstacle",
				json!({"name": "blob", "shape": {"type": "mesh"}}),
			),
			Err(ServantError::InvalidArguments(_))
		));
	}
}
