//! Shared broker state: the request queue, the adapters and their objects.

use crate::adapter::ThreadModel;
use crate::object::{Envelope, ObjectId, ObjectRef, Request};
use crate::{BrokerError, InvocationError, Servant};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ManagerState {
	/// Requests are queued but not dispatched.
	Holding,
	Active,
}

struct ActiveObject {
	interface: &'static str,
	/// `None` while the servant is being dispatched.
	servant: Option<Box<dyn Servant>>,
}

pub(crate) struct AdapterState {
	pub thread_model: ThreadModel,
	pub manager: ManagerState,
	objects: HashMap<ObjectId, ActiveObject>,
}

#[derive(Default)]
struct CoreState {
	backlog: VecDeque<Request>,
	adapters: HashMap<String, AdapterState>,
	policies: HashMap<Uuid, ThreadModel>,
}

impl CoreState {
	/// Whether pumping `request` would make progress. Requests addressed to
	/// a holding adapter, or to an object whose servant is being dispatched,
	/// stay queued.
	fn is_dispatchable(&self, request: &Request) -> bool {
		match self.adapters.get(request.target.adapter()) {
			Some(adapter) => {
				adapter.manager != ManagerState::Holding
					&& adapter
						.objects
						.get(&request.target)
						.map_or(true, |object| object.servant.is_some())
			},
			None => true,
		}
	}
}

/// Broker internals shared by the broker handle and its adapters.
pub(crate) struct BrokerCore {
	state: Mutex<CoreState>,
	/// Held across the dispatch of a request to a main-thread adapter.
	/// Always acquired before `state`.
	dispatch: Mutex<()>,
	queue: Mutex<mpsc::Receiver<Envelope>>,
	sender: mpsc::Sender<Envelope>,
	shut_down: Arc<AtomicBool>,
	/// Set by a [`ShutdownHandle`](crate::ShutdownHandle); only stops `run`.
	stopped: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BrokerCore {
	pub fn new() -> Self {
		let (sender, receiver) = mpsc::channel();
		Self {
			state: Mutex::new(CoreState::default()),
			dispatch: Mutex::new(()),
			queue: Mutex::new(receiver),
			sender,
			shut_down: Arc::new(AtomicBool::new(false)),
			stopped: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}

	fn ensure_running(&self) -> Result<(), BrokerError> {
		if self.is_shut_down() {
			return Err(BrokerError::ShutDown);
		}
		Ok(())
	}

	pub fn sender(&self) -> mpsc::Sender<Envelope> {
		self.sender.clone()
	}

	pub fn shut_down_flag(&self) -> Arc<AtomicBool> {
		self.shut_down.clone()
	}

	pub fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::SeqCst)
	}

	/// Moves every queued envelope into the backlog without blocking.
	fn drain_queue(&self, state: &mut CoreState) {
		let queue = lock(&self.queue);
		while let Ok(envelope) = queue.try_recv() {
			self.accept(state, envelope);
		}
	}

	fn accept(&self, state: &mut CoreState, envelope: Envelope) {
		match envelope {
			Envelope::Request(request) => state.backlog.push_back(request),
			Envelope::Wake => {},
			Envelope::Stop => self.stopped.store(true, Ordering::SeqCst),
			Envelope::Shutdown => self.shut_down.store(true, Ordering::SeqCst),
		}
	}

	pub fn work_pending(&self) -> Result<bool, BrokerError> {
		self.ensure_running()?;
		let mut state = lock(&self.state);
		self.drain_queue(&mut state);
		self.ensure_running()?;
		Ok(state.backlog.iter().any(|r| state.is_dispatchable(r)))
	}

	/// Dispatches the oldest dispatchable request, if any.
	///
	/// Requests to main-thread adapters are dispatched one at a time even when
	/// several threads pump concurrently.
	pub fn perform_work(&self) -> Result<(), BrokerError> {
		self.ensure_running()?;
		let serial = lock(&self.dispatch);
		let mut state = lock(&self.state);
		self.drain_queue(&mut state);
		self.ensure_running()?;

		let Some(position) = state.backlog.iter().position(|r| state.is_dispatchable(r)) else {
			return Ok(());
		};
		let Some(request) = state.backlog.remove(position) else {
			return Ok(());
		};

		let Request {
			target,
			operation,
			args,
			reply,
		} = request;

		let Some(adapter) = state.adapters.get_mut(target.adapter()) else {
			tracing::debug!(target_object = %target, operation = %operation, "Request for unknown adapter");
			let _ = reply.send(Err(InvocationError::ObjectNotExist(target.to_string())));
			return Ok(());
		};
		let thread_model = adapter.thread_model;
		let servant = adapter
			.objects
			.get_mut(&target)
			.and_then(|object| object.servant.take());
		let Some(mut servant) = servant else {
			tracing::debug!(target_object = %target, operation = %operation, "Request for unknown object");
			let _ = reply.send(Err(InvocationError::ObjectNotExist(target.to_string())));
			return Ok(());
		};
		drop(state);

		let serial = match thread_model {
			ThreadModel::MainThread => Some(serial),
			ThreadModel::OrbControlled => {
				drop(serial);
				None
			},
		};

		tracing::trace!(object = %target, interface = servant.interface(), operation = %operation, "Dispatching request");
		let result = servant
			.dispatch(&operation, args)
			.map_err(InvocationError::from);

		// The object may have been deactivated meanwhile; the servant is then dropped.
		let mut state = lock(&self.state);
		if let Some(object) = state
			.adapters
			.get_mut(target.adapter())
			.and_then(|adapter| adapter.objects.get_mut(&target))
		{
			object.servant = Some(servant);
		}
		let deferred = state.backlog.iter().any(|r| r.target == target);
		drop(state);
		drop(serial);

		if deferred {
			let _ = self.sender.send(Envelope::Wake);
		}
		let _ = reply.send(result);
		Ok(())
	}

	/// Blocks until the broker is shut down or stopped, dispatching requests
	/// as they become dispatchable. A stop stays in effect, so later calls
	/// return immediately.
	pub fn run(&self) -> Result<(), BrokerError> {
		loop {
			if self.is_stopped() {
				return Ok(());
			}
			let pending = match self.work_pending() {
				Ok(pending) => pending,
				Err(BrokerError::ShutDown) => return Ok(()),
				Err(e) => return Err(e),
			};
			if pending {
				match self.perform_work() {
					Ok(()) => continue,
					Err(BrokerError::ShutDown) => return Ok(()),
					Err(e) => return Err(e),
				}
			}

			let envelope = lock(&self.queue).recv();
			match envelope {
				Ok(envelope) => {
					let mut state = lock(&self.state);
					self.accept(&mut state, envelope);
				},
				Err(_) => return Ok(()),
			}
		}
	}

	/// Makes `run` return without tearing anything down.
	pub fn request_stop(&self) {
		self.stopped.store(true, Ordering::SeqCst);
		let _ = self.sender.send(Envelope::Stop);
	}

	/// Flags the broker as shut down and wakes a blocked run loop.
	pub fn request_shutdown(&self) {
		self.shut_down.store(true, Ordering::SeqCst);
		let _ = self.sender.send(Envelope::Shutdown);
	}

	/// Shuts the broker down: queued requests are answered with a shutdown
	/// error and every adapter is destroyed. Safe to call repeatedly.
	pub fn shutdown(&self) {
		self.request_shutdown();
		let mut state = lock(&self.state);
		self.drain_queue(&mut state);
		for request in state.backlog.drain(..) {
			let _ = request.reply.send(Err(InvocationError::ShutDown));
		}
		let adapters = state.adapters.len();
		state.adapters.clear();
		state.policies.clear();
		if adapters > 0 {
			tracing::debug!(adapters, "Destroyed remaining object adapters");
		}
	}

	pub fn create_adapter(&self, path: &str, thread_model: ThreadModel) -> Result<(), BrokerError> {
		self.ensure_running()?;
		let mut state = lock(&self.state);
		if state.adapters.contains_key(path) {
			return Err(BrokerError::AdapterAlreadyExists(path.to_string()));
		}
		state.adapters.insert(
			path.to_string(),
			AdapterState {
				thread_model,
				manager: ManagerState::Holding,
				objects: HashMap::new(),
			},
		);
		Ok(())
	}

	pub fn has_adapter(&self, path: &str) -> bool {
		lock(&self.state).adapters.contains_key(path)
	}

	fn with_adapter<R>(
		&self,
		path: &str,
		f: impl FnOnce(&mut AdapterState) -> Result<R, BrokerError>,
	) -> Result<R, BrokerError> {
		self.ensure_running()?;
		let mut state = lock(&self.state);
		let adapter = state
			.adapters
			.get_mut(path)
			.ok_or_else(|| BrokerError::AdapterNonExistent(path.to_string()))?;
		f(adapter)
	}

	pub fn thread_model(&self, path: &str) -> Result<ThreadModel, BrokerError> {
		self.with_adapter(path, |adapter| Ok(adapter.thread_model))
	}

	pub fn manager_state(&self, path: &str) -> Result<ManagerState, BrokerError> {
		self.with_adapter(path, |adapter| Ok(adapter.manager))
	}

	/// Removes the adapter at `path` and its descendants.
	pub fn destroy_adapter(&self, path: &str) -> Result<(), BrokerError> {
		self.ensure_running()?;
		let mut state = lock(&self.state);
		if state.adapters.remove(path).is_none() {
			return Err(BrokerError::AdapterNonExistent(path.to_string()));
		}
		let prefix = format!("{}/", path);
		state.adapters.retain(|child, _| !child.starts_with(&prefix));
		Ok(())
	}

	pub fn activate_manager(&self, path: &str) -> Result<(), BrokerError> {
		self.with_adapter(path, |adapter| {
			adapter.manager = ManagerState::Active;
			Ok(())
		})?;
		let _ = self.sender.send(Envelope::Wake);
		Ok(())
	}

	pub fn register_policy(&self, model: ThreadModel) -> Result<Uuid, BrokerError> {
		self.ensure_running()?;
		let id = Uuid::new_v4();
		lock(&self.state).policies.insert(id, model);
		Ok(id)
	}

	pub fn policy_is_live(&self, id: &Uuid) -> bool {
		lock(&self.state).policies.contains_key(id)
	}

	pub fn unregister_policy(&self, id: &Uuid) -> Result<(), BrokerError> {
		self.ensure_running()?;
		lock(&self.state)
			.policies
			.remove(id)
			.map(|_| ())
			.ok_or_else(|| BrokerError::InvalidPolicy(format!("policy {} is not live", id)))
	}

	pub fn activate_object(
		&self,
		path: &str,
		servant: Box<dyn Servant>,
	) -> Result<ObjectId, BrokerError> {
		self.with_adapter(path, |adapter| {
			let id = ObjectId::new(path);
			adapter.objects.insert(
				id.clone(),
				ActiveObject {
					interface: servant.interface(),
					servant: Some(servant),
				},
			);
			Ok(id)
		})
	}

	pub fn deactivate_object(&self, path: &str, id: &ObjectId) -> Result<(), BrokerError> {
		self.with_adapter(path, |adapter| {
			adapter
				.objects
				.remove(id)
				.map(|_| ())
				.ok_or_else(|| BrokerError::ObjectNotActive(id.to_string()))
		})
	}

	pub fn reference(&self, path: &str, id: &ObjectId) -> Result<ObjectRef, BrokerError> {
		let interface = self.with_adapter(path, |adapter| {
			adapter
				.objects
				.get(id)
				.map(|object| object.interface)
				.ok_or_else(|| BrokerError::ObjectNotActive(id.to_string()))
		})?;
		Ok(ObjectRef::new(
			id.clone(),
			interface,
			self.sender(),
			self.shut_down_flag(),
		))
	}

	pub fn active_objects(&self, path: &str) -> Result<usize, BrokerError> {
		self.with_adapter(path, |adapter| Ok(adapter.objects.len()))
	}
}
