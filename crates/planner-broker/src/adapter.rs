//! Object adapters and thread policies.

use crate::object::{ObjectId, ObjectRef};
use crate::runtime::{BrokerCore, ManagerState};
use crate::{BrokerError, Servant};
use std::sync::Arc;
use uuid::Uuid;

/// How requests to an adapter's objects are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadModel {
	/// The broker decides; the default for adapters without a thread policy.
	#[default]
	OrbControlled,
	/// Requests are dispatched one at a time on the thread pumping the broker.
	MainThread,
}

impl std::fmt::Display for ThreadModel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ThreadModel::OrbControlled => write!(f, "ORB_CTRL_MODEL"),
			ThreadModel::MainThread => write!(f, "MAIN_THREAD_MODEL"),
		}
	}
}

/// A thread policy object. It only configures adapter creation and should be
/// destroyed once consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPolicy {
	id: Uuid,
	model: ThreadModel,
}

impl ThreadPolicy {
	pub fn model(&self) -> ThreadModel {
		self.model
	}
}

/// Trait defining the interface of an object adapter.
pub trait ObjectAdapter: Send + Sync {
	/// Full path of the adapter, e.g. `RootPOA/child`.
	fn name(&self) -> &str;

	fn thread_model(&self) -> Result<ThreadModel, BrokerError>;

	fn create_thread_policy(&self, model: ThreadModel) -> Result<ThreadPolicy, BrokerError>;

	fn destroy_thread_policy(&self, policy: ThreadPolicy) -> Result<(), BrokerError>;

	/// Creates a child adapter configured by `policies`. The child starts with
	/// its manager holding.
	fn create_child(
		&self,
		name: &str,
		policies: &[ThreadPolicy],
	) -> Result<Box<dyn ObjectAdapter>, BrokerError>;

	fn activate_object(&self, servant: Box<dyn Servant>) -> Result<ObjectId, BrokerError>;

	fn reference(&self, id: &ObjectId) -> Result<ObjectRef, BrokerError>;

	fn deactivate_object(&self, id: &ObjectId) -> Result<(), BrokerError>;

	/// Releases requests held for this adapter.
	fn activate_manager(&self) -> Result<(), BrokerError>;

	/// Destroys the adapter and its descendants, dropping their servants.
	fn destroy(&self) -> Result<(), BrokerError>;
}

/// Adapter of a [`LocalBroker`](crate::LocalBroker).
pub struct LocalAdapter {
	core: Arc<BrokerCore>,
	path: String,
}

impl LocalAdapter {
	pub(crate) fn new(core: Arc<BrokerCore>, path: impl Into<String>) -> Self {
		Self {
			core,
			path: path.into(),
		}
	}

	/// Whether requests to this adapter are currently held.
	pub fn is_holding(&self) -> Result<bool, BrokerError> {
		Ok(self.core.manager_state(&self.path)? == ManagerState::Holding)
	}

	/// Number of objects currently active in this adapter.
	pub fn active_objects(&self) -> Result<usize, BrokerError> {
		self.core.active_objects(&self.path)
	}
}

impl ObjectAdapter for LocalAdapter {
	fn name(&self) -> &str {
		&self.path
	}

	fn thread_model(&self) -> Result<ThreadModel, BrokerError> {
		self.core.thread_model(&self.path)
	}

	fn create_thread_policy(&self, model: ThreadModel) -> Result<ThreadPolicy, BrokerError> {
		let id = self.core.register_policy(model)?;
		Ok(ThreadPolicy { id, model })
	}

	fn destroy_thread_policy(&self, policy: ThreadPolicy) -> Result<(), BrokerError> {
		self.core.unregister_policy(&policy.id)
	}

	fn create_child(
		&self,
		name: &str,
		policies: &[ThreadPolicy],
	) -> Result<Box<dyn ObjectAdapter>, BrokerError> {
		if name.is_empty() || name.contains('/') {
			return Err(BrokerError::BadParam(format!(
				"invalid adapter name '{}'",
				name
			)));
		}
		if !self.core.has_adapter(&self.path) {
			return Err(BrokerError::AdapterNonExistent(self.path.clone()));
		}
		if let Some(dead) = policies.iter().find(|p| !self.core.policy_is_live(&p.id)) {
			return Err(BrokerError::InvalidPolicy(format!(
				"policy {} has been destroyed",
				dead.id
			)));
		}

		let thread_model = policies.last().map(|p| p.model).unwrap_or_default();
		let path = format!("{}/{}", self.path, name);
		self.core.create_adapter(&path, thread_model)?;
		tracing::debug!(adapter = %path, thread_model = %thread_model, "Created child adapter");

		Ok(Box::new(LocalAdapter::new(self.core.clone(), path)))
	}

	fn activate_object(&self, servant: Box<dyn Servant>) -> Result<ObjectId, BrokerError> {
		let interface = servant.interface();
		let id = self.core.activate_object(&self.path, servant)?;
		tracing::debug!(adapter = %self.path, object = %id, interface, "Activated object");
		Ok(id)
	}

	fn reference(&self, id: &ObjectId) -> Result<ObjectRef, BrokerError> {
		self.core.reference(&self.path, id)
	}

	fn deactivate_object(&self, id: &ObjectId) -> Result<(), BrokerError> {
		self.core.deactivate_object(&self.path, id)
	}

	fn activate_manager(&self) -> Result<(), BrokerError> {
		self.core.activate_manager(&self.path)
	}

	fn destroy(&self) -> Result<(), BrokerError> {
		self.core.destroy_adapter(&self.path)?;
		tracing::debug!(adapter = %self.path, "Destroyed adapter");
		Ok(())
	}
}
