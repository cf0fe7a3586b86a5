//! Robot servant.

use super::{failed, lock, parse, reply, unknown};
use planner_broker::{Servant, ServantError};
use planner_core::PlannerHandle;
use planner_types::Configuration;
use serde::Deserialize;
use serde_json::Value;

const INTERFACE: &str = "Robot";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRobot {
	name: String,
	config_size: usize,
}

#[derive(Debug, Deserialize)]
struct Dofs {
	dofs: Configuration,
}

/// Creates the robot and manages its current configuration.
pub struct RobotServant {
	planner: PlannerHandle,
}

impl RobotServant {
	pub fn new(planner: PlannerHandle) -> Self {
		Self { planner }
	}
}

impl Servant for RobotServant {
	fn interface(&self) -> &'static str {
		INTERFACE
	}

	fn dispatch(&mut self, operation: &str, args: Value) -> Result<Value, ServantError> {
		let mut planner = lock(&self.planner);
		match operation {
			"createRobot" => {
				let args: CreateRobot = parse(args)?;
				planner
					.create_robot(&args.name, args.config_size)
					.map_err(failed)?;
				Ok(Value::Null)
			},
			"getRobotName" => reply(&planner.robot().map_err(failed)?.name),
			"getConfigSize" => reply(planner.robot().map_err(failed)?.config_size),
			"setCurrentConfig" => {
				let args: Dofs = parse(args)?;
				planner.set_current_config(args.dofs).map_err(failed)?;
				Ok(Value::Null)
			},
			"getCurrentConfig" => reply(planner.current_config().map_err(failed)?),
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
	fn test_robot_operations() {
		let planner = Arc::new(Mutex::new(Planner::new()));
		let mut robot = RobotServant::new(planner.clone());

		assert!(matches!(
			call(&mut robot, "getRobotName", Value::Null),
			Err(ServantError::Failed(_))
		));

		call(&mut robot, "createRobot", json!({"name": "car", "configSize": 3})).unwrap();
		assert_eq!(call(&mut robot, "getRobotName", Value::Null).unwrap(), json!("car"));
		assert_eq!(call(&mut robot, "getConfigSize", Value::Null).unwrap(), json!(3));
		assert_eq!(
			call(&mut robot, "getCurrentConfig", Value::Null).unwrap(),
			json!([0.0, 0.0, 0.0])
		);

		call(&mut robot, "setCurrentConfig", json!({"dofs": [1.0, 2.0, 0.5]})).unwrap();
		assert_eq!(
			planner.lock().unwrap().current_config().unwrap().as_slice(),
			&[1.0, 2.0, 0.5]
		);
		assert!(matches!(
			call(&mut robot, "setCurrentConfig", json!({"dofs": [1.0]})),
			Err(ServantError::Failed(_))
		));
	}

	#[test]
	fn test_bad_arguments_and_operations() {
		let mut robot = RobotServant::new(Arc::new(Mutex::new(Planner::new())));
		assert!(matches!(
			call(&mut robot, "createRobot", json!({"name": "car"})),
			Err(ServantError::InvalidArguments(_))
		));
		assert!(matches!(
			call(&mut robot, "fly", Value::Null),
			Err(ServantError::UnknownOperation { interface: "Robot", .. })
		));
	}
}
