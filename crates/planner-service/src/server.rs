//! The planning server.
//!
//! A [`Server`] composes the planner, the two factory registries and the
//! broker lifecycle. At most one server exists per process; while it is
//! alive, [`Server::instance`] hands out its [`ServerContext`].

use crate::factory_registry::{build_distance_registry, build_steering_registry, DuplicateFactory};
use crate::lifecycle::{component, LifecycleStage, ServantBinding, ServerLifecycle};
use crate::servants::{ObstacleServant, ProblemServant, RobotServant};
use crate::{FactoryRegistry, ServerError};
use once_cell::sync::Lazy;
use planner_broker::{
	BrokerError, LocalBroker, NameComponent, NamingDirectory, ObjectBroker, ShutdownHandle,
};
use planner_config::{Config, PumpMode};
use planner_core::PlannerHandle;
use planner_distance::DistanceFunction;
use planner_steering::SteeringMethod;
use planner_types::AlgorithmFactory;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Process-wide server slot, claimed by `Server` construction.
static INSTANCE: Lazy<RwLock<Option<Arc<ServerContext>>>> = Lazy::new(|| RwLock::new(None));

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
	lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
	lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by the server and its servants: the planner and the
/// algorithm registries.
pub struct ServerContext {
	planner: PlannerHandle,
	steering: RwLock<FactoryRegistry<dyn SteeringMethod>>,
	distance: RwLock<FactoryRegistry<dyn DistanceFunction>>,
}

impl ServerContext {
	pub fn new(
		planner: PlannerHandle,
		steering: FactoryRegistry<dyn SteeringMethod>,
		distance: FactoryRegistry<dyn DistanceFunction>,
	) -> Self {
		Self {
			planner,
			steering: RwLock::new(steering),
			distance: RwLock::new(distance),
		}
	}

	/// Builds both registries from the configured implementations.
	pub fn from_config(planner: PlannerHandle, config: &Config) -> Result<Self, ServerError> {
		let steering = build_steering_registry(&config.steering)?;
		let distance = build_distance_registry(&config.distance)?;
		Ok(Self::new(planner, steering, distance))
	}

	pub fn planner(&self) -> &PlannerHandle {
		&self.planner
	}

	pub fn has_steering_method(&self, name: &str) -> bool {
		read(&self.steering).has(name)
	}

	/// Registers an additional steering method.
	pub fn add_steering_method(
		&self,
		name: impl Into<String>,
		factory: Box<dyn AlgorithmFactory<dyn SteeringMethod>>,
	) -> Result<(), DuplicateFactory<dyn SteeringMethod>> {
		write(&self.steering).add(name, factory)
	}

	pub fn create_steering_method(&self, name: &str, oriented: bool) -> Option<Box<dyn SteeringMethod>> {
		read(&self.steering).create(name, oriented)
	}

	pub fn steering_method_names(&self) -> Vec<String> {
		read(&self.steering).names()
	}

	pub fn has_distance_function(&self, name: &str) -> bool {
		read(&self.distance).has(name)
	}

	/// Registers an additional distance function.
	pub fn add_distance_function(
		&self,
		name: impl Into<String>,
		factory: Box<dyn AlgorithmFactory<dyn DistanceFunction>>,
	) -> Result<(), DuplicateFactory<dyn DistanceFunction>> {
		write(&self.distance).add(name, factory)
	}

	pub fn create_distance_function(
		&self,
		name: &str,
		oriented: bool,
	) -> Option<Box<dyn DistanceFunction>> {
		read(&self.distance).create(name, oriented)
	}

	pub fn distance_function_names(&self) -> Vec<String> {
		read(&self.distance).names()
	}

	/// Destroys the factories of both registries.
	pub fn destroy_factories(&self) {
		write(&self.steering).destroy_all();
		write(&self.distance).destroy_all();
	}
}

/// Holds the process-wide slot; releasing it clears [`Server::instance`].
struct InstanceGuard;

impl InstanceGuard {
	fn claim(context: &Arc<ServerContext>) -> Result<Self, ServerError> {
		let mut slot = write(&INSTANCE);
		if slot.is_some() {
			return Err(ServerError::AlreadyRunning);
		}
		*slot = Some(context.clone());
		Ok(Self)
	}
}

impl Drop for InstanceGuard {
	fn drop(&mut self) {
		write(&INSTANCE).take();
	}
}

/// Initializes the default in-process broker.
pub fn local_broker(args: &[String]) -> Result<Box<dyn ObjectBroker>, BrokerError> {
	Ok(Box::new(LocalBroker::init(args)?))
}

/// The remote planning server.
///
/// Construction initializes the broker and activates the servants;
/// [`start_serving`](Self::start_serving) publishes them. Requests are then
/// dispatched by [`run`](Self::run) or [`poll`](Self::poll), whichever the
/// host calls first; the other one is refused for the rest of the server's
/// lifetime.
///
/// Dropping the server tears the lifecycle down, destroys the factories and
/// releases the process-wide slot, in that order.
pub struct Server {
	context: Arc<ServerContext>,
	lifecycle: ServerLifecycle,
	pump_mode: OnceLock<PumpMode>,
	_guard: InstanceGuard,
}

impl Server {
	/// Builds a server on the in-process broker.
	///
	/// `args` are the process arguments; `config.broker.args` are appended to
	/// them before broker initialization.
	pub fn new(planner: PlannerHandle, args: &[String], config: &Config) -> Result<Self, ServerError> {
		Self::with_broker(planner, args, config, local_broker)
	}

	/// Builds a server on the broker created by `init`.
	pub fn with_broker<I>(
		planner: PlannerHandle,
		args: &[String],
		config: &Config,
		init: I,
	) -> Result<Self, ServerError>
	where
		I: FnOnce(&[String]) -> Result<Box<dyn ObjectBroker>, BrokerError>,
	{
		let context = Arc::new(ServerContext::from_config(planner, config)?);
		let guard = InstanceGuard::claim(&context)?;

		let mut broker_args = args.to_vec();
		broker_args.extend(config.broker.args.iter().cloned());

		let settings = config.server.clone();
		let mut lifecycle = ServerLifecycle::new(settings.clone());
		let servant_context = context.clone();
		lifecycle.initialize(&broker_args, init, move || {
			let planner = servant_context.planner().clone();
			vec![
				ServantBinding::new(
					component(&settings.robot),
					Box::new(RobotServant::new(planner.clone())),
				),
				ServantBinding::new(
					component(&settings.obstacle),
					Box::new(ObstacleServant::new(planner)),
				),
				ServantBinding::new(
					component(&settings.problem),
					Box::new(ProblemServant::new(servant_context)),
				),
			]
		})?;

		tracing::info!(
			server = %config.server.id,
			steering = ?context.steering_method_names(),
			distance = ?context.distance_function_names(),
			"Created planning server"
		);
		Ok(Self {
			context,
			lifecycle,
			pump_mode: OnceLock::new(),
			_guard: guard,
		})
	}

	/// The context of the live server, if any.
	pub fn instance() -> Option<Arc<ServerContext>> {
		read(&INSTANCE).clone()
	}

	pub fn context(&self) -> &Arc<ServerContext> {
		&self.context
	}

	pub fn stage(&self) -> LifecycleStage {
		self.lifecycle.stage()
	}

	/// Binds the servants in the naming directory and activates their
	/// adapter.
	pub fn start_serving(&mut self) -> Result<(), ServerError> {
		Ok(self.lifecycle.start()?)
	}

	/// The naming directory the servants are published in, once serving.
	pub fn naming(&self) -> Option<Arc<dyn NamingDirectory>> {
		self.lifecycle.naming()
	}

	/// The naming context the servants are published under.
	pub fn naming_context(&self) -> NameComponent {
		self.lifecycle.context()
	}

	/// Handle stopping [`run`](Self::run) from another thread.
	pub fn shutdown_handle(&self) -> Option<ShutdownHandle> {
		self.lifecycle.broker().map(|broker| broker.shutdown_handle())
	}

	fn claim_pump_mode(&self, requested: PumpMode) -> Result<(), ServerError> {
		let active = *self.pump_mode.get_or_init(|| {
			tracing::debug!(mode = %requested, "Fixed pump mode");
			requested
		});
		if active != requested {
			return Err(ServerError::PumpModeConflict { active, requested });
		}
		Ok(())
	}

	fn broker(&self) -> Result<&dyn ObjectBroker, ServerError> {
		self.lifecycle
			.broker()
			.ok_or(ServerError::Broker(BrokerError::ShutDown))
	}

	/// Dispatches requests until the broker is shut down.
	pub fn run(&self) -> Result<(), ServerError> {
		self.claim_pump_mode(PumpMode::Blocking)?;
		self.broker()?.run()?;
		Ok(())
	}

	/// Dispatches at most one pending request without blocking. Returns
	/// whether a request was dispatched.
	pub fn poll(&self) -> Result<bool, ServerError> {
		self.claim_pump_mode(PumpMode::Cooperative)?;
		let broker = self.broker()?;
		if !broker.work_pending()? {
			return Ok(false);
		}
		broker.perform_work()?;
		Ok(true)
	}

	/// [`run`](Self::run) when `blocking`, [`poll`](Self::poll) otherwise.
	pub fn pump_requests(&self, blocking: bool) -> Result<(), ServerError> {
		if blocking {
			self.run()
		} else {
			self.poll().map(|_| ())
		}
	}
}

impl Drop for Server {
	fn drop(&mut self) {
		self.lifecycle.teardown();
		self.context.destroy_factories();
		tracing::info!("Destroyed planning server");
	}
}
