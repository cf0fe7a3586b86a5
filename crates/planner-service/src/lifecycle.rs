//! Startup and teardown of the remote object runtime.
//!
//! [`ServerLifecycle`] walks the broker through a fixed sequence of stages:
//!
//! 1. initialize the broker from the process arguments
//! 2. resolve the root adapter
//! 3. create a main-thread policy
//! 4. create the child adapter with that policy
//! 5. destroy the policy
//! 6. activate the servants in the child adapter
//! 7. bind every servant under its name in the naming directory
//! 8. activate the child adapter's manager
//!
//! Stages 1 to 6 run in [`initialize`](ServerLifecycle::initialize), 7 and 8
//! in [`start`](ServerLifecycle::start). A failing stage is logged with its
//! name, everything reached so far is torn down, and the caller only sees
//! [`LifecycleError::InitializationFailed`].

use planner_broker::{
	BrokerError, NameComponent, NamingDirectory, NamingError, ObjectAdapter, ObjectBroker,
	ObjectId, ObjectRef, Servant, ThreadModel, ROOT_ADAPTER,
};
use planner_config::{NameConfig, ServerConfig};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Stages of the server lifecycle, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleStage {
	Uninit,
	OrbReady,
	RootRegistryResolved,
	ThreadPolicyCreated,
	ChildRegistryCreated,
	ThreadPolicyDestroyed,
	ServantsActivated,
	NamesBound,
	ManagerActive,
	/// Torn down; terminal.
	ShutDown,
}

impl fmt::Display for LifecycleStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			LifecycleStage::Uninit => "UNINIT",
			LifecycleStage::OrbReady => "ORB_READY",
			LifecycleStage::RootRegistryResolved => "ROOT_REGISTRY_RESOLVED",
			LifecycleStage::ThreadPolicyCreated => "THREAD_POLICY_CREATED",
			LifecycleStage::ChildRegistryCreated => "CHILD_REGISTRY_CREATED",
			LifecycleStage::ThreadPolicyDestroyed => "THREAD_POLICY_DESTROYED",
			LifecycleStage::ServantsActivated => "SERVANTS_CREATED_AND_ACTIVATED",
			LifecycleStage::NamesBound => "NAMES_BOUND",
			LifecycleStage::ManagerActive => "MANAGER_ACTIVE",
			LifecycleStage::ShutDown => "SHUT_DOWN",
		};
		write!(f, "{}", name)
	}
}

/// Errors reported by the lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
	/// A stage failed; details are in the log.
	#[error("Server initialization failed")]
	InitializationFailed,
	#[error("Invalid lifecycle stage: expected {expected}, currently {actual}")]
	InvalidStage {
		expected: LifecycleStage,
		actual: LifecycleStage,
	},
}

/// A servant and the name it is published under, relative to the naming
/// context.
pub struct ServantBinding {
	pub name: NameComponent,
	pub servant: Box<dyn Servant>,
}

impl ServantBinding {
	pub fn new(name: NameComponent, servant: Box<dyn Servant>) -> Self {
		Self { name, servant }
	}
}

/// Converts a configured name into a naming component.
pub fn component(name: &NameConfig) -> NameComponent {
	NameComponent::new(name.id.clone(), name.kind.clone())
}

struct ActiveServant {
	name: NameComponent,
	id: ObjectId,
	reference: ObjectRef,
}

struct StageFailure {
	stage: LifecycleStage,
	error: String,
}

fn at<E: fmt::Display>(stage: LifecycleStage) -> impl FnOnce(E) -> StageFailure {
	move |error| StageFailure {
		stage,
		error: error.to_string(),
	}
}

/// Owns the broker, its adapters and the published servants.
pub struct ServerLifecycle {
	settings: ServerConfig,
	stage: LifecycleStage,
	broker: Option<Box<dyn ObjectBroker>>,
	root: Option<Box<dyn ObjectAdapter>>,
	child: Option<Box<dyn ObjectAdapter>>,
	servants: Vec<ActiveServant>,
	naming: Option<Arc<dyn NamingDirectory>>,
	/// Names bound by this lifecycle and the reference each was bound to.
	bound: Vec<(Vec<NameComponent>, ObjectRef)>,
	context_bound: bool,
}

impl ServerLifecycle {
	pub fn new(settings: ServerConfig) -> Self {
		Self {
			settings,
			stage: LifecycleStage::Uninit,
			broker: None,
			root: None,
			child: None,
			servants: Vec::new(),
			naming: None,
			bound: Vec::new(),
			context_bound: false,
		}
	}

	pub fn stage(&self) -> LifecycleStage {
		self.stage
	}

	/// The broker, between successful initialization and teardown.
	pub fn broker(&self) -> Option<&dyn ObjectBroker> {
		self.broker.as_deref()
	}

	/// The naming directory the servants are bound in, once started.
	pub fn naming(&self) -> Option<Arc<dyn NamingDirectory>> {
		self.naming.clone()
	}

	/// The naming context the servants are bound under.
	pub fn context(&self) -> NameComponent {
		component(&self.settings.context)
	}

	/// Reference to the active servant published under `name`.
	pub fn reference(&self, name: &NameComponent) -> Option<ObjectRef> {
		self.servants
			.iter()
			.find(|servant| &servant.name == name)
			.map(|servant| servant.reference.clone())
	}

	fn expect_stage(&self, expected: LifecycleStage) -> Result<(), LifecycleError> {
		if self.stage != expected {
			return Err(LifecycleError::InvalidStage {
				expected,
				actual: self.stage,
			});
		}
		Ok(())
	}

	fn advance(&mut self, stage: LifecycleStage) {
		tracing::debug!(stage = %stage, "Reached lifecycle stage");
		self.stage = stage;
	}

	fn abort(&mut self, failure: StageFailure) -> LifecycleError {
		tracing::error!(
			stage = %failure.stage,
			error = %failure.error,
			"Server lifecycle stage failed"
		);
		self.teardown();
		LifecycleError::InitializationFailed
	}

	/// Brings the broker up to activated servants.
	///
	/// `init` creates the broker from `args`; `servants` is only called once
	/// the child adapter exists.
	pub fn initialize<I, S>(&mut self, args: &[String], init: I, servants: S) -> Result<(), LifecycleError>
	where
		I: FnOnce(&[String]) -> Result<Box<dyn ObjectBroker>, BrokerError>,
		S: FnOnce() -> Vec<ServantBinding>,
	{
		self.expect_stage(LifecycleStage::Uninit)?;
		self.run_initialize(args, init, servants)
			.map_err(|failure| self.abort(failure))?;
		tracing::info!(
			servants = self.servants.len(),
			adapter = %self.settings.adapter_name,
			"Initialized object broker and servants"
		);
		Ok(())
	}

	fn run_initialize<I, S>(&mut self, args: &[String], init: I, servants: S) -> Result<(), StageFailure>
	where
		I: FnOnce(&[String]) -> Result<Box<dyn ObjectBroker>, BrokerError>,
		S: FnOnce() -> Vec<ServantBinding>,
	{
		let broker = init(args).map_err(at(LifecycleStage::OrbReady))?;
		self.broker = Some(broker);
		self.advance(LifecycleStage::OrbReady);

		let stage = LifecycleStage::RootRegistryResolved;
		let root = self
			.broker_at(stage)?
			.resolve_initial_references(ROOT_ADAPTER)
			.map_err(at(stage))?;
		self.root = Some(root);
		self.advance(stage);

		let stage = LifecycleStage::ThreadPolicyCreated;
		let policy = self
			.root_at(stage)?
			.create_thread_policy(ThreadModel::MainThread)
			.map_err(at(stage))?;
		self.advance(stage);

		let stage = LifecycleStage::ChildRegistryCreated;
		let child = self
			.root_at(stage)?
			.create_child(&self.settings.adapter_name, std::slice::from_ref(&policy))
			.map_err(at(stage))?;
		self.child = Some(child);
		self.advance(stage);

		let stage = LifecycleStage::ThreadPolicyDestroyed;
		self.root_at(stage)?
			.destroy_thread_policy(policy)
			.map_err(at(stage))?;
		self.advance(stage);

		let stage = LifecycleStage::ServantsActivated;
		for binding in servants() {
			let child = self.child_at(stage)?;
			let id = child.activate_object(binding.servant).map_err(at(stage))?;
			let reference = match child.reference(&id) {
				Ok(reference) => reference,
				Err(e) => {
					if let Err(rollback) = child.deactivate_object(&id) {
						tracing::warn!(name = %binding.name, error = %rollback, "Failed to deactivate servant");
					}
					return Err(at(stage)(e));
				},
			};
			tracing::debug!(name = %binding.name, object = %id, "Activated servant");
			self.servants.push(ActiveServant {
				name: binding.name,
				id,
				reference,
			});
		}
		self.advance(stage);
		Ok(())
	}

	/// Publishes the servants and releases the requests held for them.
	pub fn start(&mut self) -> Result<(), LifecycleError> {
		self.expect_stage(LifecycleStage::ServantsActivated)?;
		self.run_start().map_err(|failure| self.abort(failure))?;
		tracing::info!(
			context = %self.context(),
			objects = self.bound.len(),
			"Server ready for requests"
		);
		Ok(())
	}

	fn run_start(&mut self) -> Result<(), StageFailure> {
		let stage = LifecycleStage::NamesBound;
		let naming = self
			.broker_at(stage)?
			.naming_service()
			.map_err(at(stage))?;
		self.naming = Some(naming.clone());

		let context = vec![self.context()];
		match naming.bind_context(&context) {
			Ok(()) => self.context_bound = true,
			Err(NamingError::AlreadyBound(_)) => {
				tracing::debug!(context = %context[0], "Naming context already bound");
			},
			Err(e) => return Err(at(stage)(e)),
		}

		let entries: Vec<_> = self
			.servants
			.iter()
			.map(|servant| {
				let name = vec![context[0].clone(), servant.name.clone()];
				(name, servant.reference.clone())
			})
			.collect();
		for (name, reference) in entries {
			match naming.bind(&name, reference.clone()) {
				Ok(()) => {},
				Err(NamingError::AlreadyBound(_)) => {
					naming.rebind(&name, reference.clone()).map_err(at(stage))?;
				},
				Err(e) => return Err(at(stage)(e)),
			}
			tracing::debug!(name = %planner_broker::name_to_string(&name), "Bound object");
			self.bound.push((name, reference));
		}
		self.advance(stage);

		let stage = LifecycleStage::ManagerActive;
		self.child_at(stage)?
			.activate_manager()
			.map_err(at(stage))?;
		self.advance(stage);
		Ok(())
	}

	/// Unpublishes and deactivates the servants, destroys the child adapter
	/// and shuts the broker down, from whatever stage was reached.
	///
	/// Failures of already torn-down resources are logged and skipped.
	/// Repeated calls are no-ops.
	pub fn teardown(&mut self) {
		if self.stage == LifecycleStage::ShutDown {
			return;
		}
		let reached = self.stage;

		if let Some(child) = self.child.take() {
			for servant in self.servants.drain(..) {
				if let Err(e) = child.deactivate_object(&servant.id) {
					tracing::warn!(name = %servant.name, error = %e, "Failed to deactivate servant");
				}
			}
			if let Err(e) = child.destroy() {
				tracing::warn!(adapter = %child.name(), error = %e, "Failed to destroy child adapter");
			}
		}
		self.servants.clear();

		if let Some(naming) = self.naming.take() {
			for (name, reference) in self.bound.drain(..).rev() {
				// A name rebound by another server since belongs to that server.
				match naming.resolve(&name) {
					Ok(current) if current == reference => {},
					Ok(_) => {
						tracing::debug!(
							name = %planner_broker::name_to_string(&name),
							"Name rebound elsewhere, leaving it bound"
						);
						continue;
					},
					Err(e) => {
						tracing::warn!(
							name = %planner_broker::name_to_string(&name),
							error = %e,
							"Failed to resolve bound object"
						);
						continue;
					},
				}
				if let Err(e) = naming.unbind(&name) {
					tracing::warn!(
						name = %planner_broker::name_to_string(&name),
						error = %e,
						"Failed to unbind object"
					);
				}
			}
			if self.context_bound {
				match naming.unbind(&[self.context()]) {
					Ok(()) => {},
					Err(NamingError::AlreadyBound(_)) => {
						tracing::debug!(context = %self.context(), "Naming context still populated, leaving it bound");
					},
					Err(e) => {
						tracing::warn!(context = %self.context(), error = %e, "Failed to unbind naming context");
					},
				}
			}
		}
		self.bound.clear();
		self.context_bound = false;
		self.root = None;

		if let Some(broker) = self.broker.take() {
			broker.shutdown();
		}
		self.stage = LifecycleStage::ShutDown;
		tracing::info!(reached = %reached, "Server lifecycle torn down");
	}

	fn broker_at(&self, stage: LifecycleStage) -> Result<&dyn ObjectBroker, StageFailure> {
		self.broker.as_deref().ok_or_else(|| at(stage)("broker not initialized"))
	}

	fn root_at(&self, stage: LifecycleStage) -> Result<&dyn ObjectAdapter, StageFailure> {
		self.root.as_deref().ok_or_else(|| at(stage)("root adapter not resolved"))
	}

	fn child_at(&self, stage: LifecycleStage) -> Result<&dyn ObjectAdapter, StageFailure> {
		self.child.as_deref().ok_or_else(|| at(stage)("child adapter not created"))
	}
}

impl Drop for ServerLifecycle {
	fn drop(&mut self) {
		self.teardown();
	}
}
