//! The object request broker.

use crate::adapter::{LocalAdapter, ObjectAdapter, ThreadModel};
use crate::naming::{InMemoryNaming, NamingDirectory};
use crate::runtime::BrokerCore;
use crate::BrokerError;
use std::collections::HashMap;
use std::sync::Arc;

/// Initial reference of the root object adapter.
pub const ROOT_ADAPTER: &str = "RootPOA";

/// Trait defining the interface of an object request broker.
pub trait ObjectBroker: Send + Sync {
	/// Identifier of this broker instance (`-ORBid`).
	fn id(&self) -> &str;

	/// Resolves an initial reference; only [`ROOT_ADAPTER`] is known.
	fn resolve_initial_references(&self, name: &str)
		-> Result<Box<dyn ObjectAdapter>, BrokerError>;

	fn naming_service(&self) -> Result<Arc<dyn NamingDirectory>, BrokerError>;

	/// Whether `perform_work` would dispatch a request.
	fn work_pending(&self) -> Result<bool, BrokerError>;

	/// Performs at most one unit of work.
	fn perform_work(&self) -> Result<(), BrokerError>;

	/// Dispatches requests until the broker is shut down.
	fn run(&self) -> Result<(), BrokerError>;

	/// Shuts the broker down. Queued requests are answered with a shutdown
	/// error and every adapter is destroyed. Repeated calls are no-ops.
	fn shutdown(&self);

	/// A handle that can stop [`run`](Self::run) from another thread.
	fn shutdown_handle(&self) -> ShutdownHandle;
}

/// Cloneable handle stopping a broker's run loop.
#[derive(Clone)]
pub struct ShutdownHandle {
	core: Arc<BrokerCore>,
}

impl ShutdownHandle {
	/// Makes the run loop return. Adapters and their objects stay usable
	/// until the broker itself is shut down.
	pub fn shutdown(&self) {
		self.core.request_stop();
	}

	/// Whether the run loop has been asked to return.
	pub fn is_stopped(&self) -> bool {
		self.core.is_stopped()
	}
}

impl std::fmt::Debug for ShutdownHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ShutdownHandle")
			.field("stopped", &self.is_stopped())
			.finish()
	}
}

/// In-process broker.
pub struct LocalBroker {
	id: String,
	options: HashMap<String, String>,
	core: Arc<BrokerCore>,
	naming: Arc<dyn NamingDirectory>,
}

impl LocalBroker {
	/// Initializes a broker from process arguments.
	///
	/// Arguments of the form `-ORB<option> <value>` configure the broker;
	/// everything else is left to the application. An option without a value
	/// is rejected.
	pub fn init(args: &[String]) -> Result<Self, BrokerError> {
		Self::with_naming(args, Arc::new(InMemoryNaming::new()))
	}

	/// Like [`init`](Self::init) with an externally provided naming directory.
	pub fn with_naming(
		args: &[String],
		naming: Arc<dyn NamingDirectory>,
	) -> Result<Self, BrokerError> {
		let options = parse_orb_args(args)?;
		let id = options
			.get("id")
			.cloned()
			.unwrap_or_else(|| "planner".to_string());
		tracing::debug!(broker = %id, options = options.len(), "Initialized object broker");

		Ok(Self {
			id,
			options,
			core: Arc::new(BrokerCore::new()),
			naming,
		})
	}

	/// The `-ORB` options the broker was initialized with, keyed without the
	/// prefix.
	pub fn options(&self) -> &HashMap<String, String> {
		&self.options
	}
}

fn parse_orb_args(args: &[String]) -> Result<HashMap<String, String>, BrokerError> {
	let mut options = HashMap::new();
	let mut iter = args.iter();
	while let Some(arg) = iter.next() {
		let Some(option) = arg.strip_prefix("-ORB") else {
			continue;
		};
		if option.is_empty() {
			return Err(BrokerError::BadParam("empty -ORB option".to_string()));
		}
		match iter.next() {
			Some(value) if !value.starts_with("-ORB") => {
				options.insert(option.to_string(), value.clone());
			},
			_ => {
				return Err(BrokerError::BadParam(format!(
					"missing value for -ORB{}",
					option
				)))
			},
		}
	}
	Ok(options)
}

impl ObjectBroker for LocalBroker {
	fn id(&self) -> &str {
		&self.id
	}

	fn resolve_initial_references(
		&self,
		name: &str,
	) -> Result<Box<dyn ObjectAdapter>, BrokerError> {
		if name != ROOT_ADAPTER {
			return Err(BrokerError::InvalidName(name.to_string()));
		}
		if self.core.is_shut_down() {
			return Err(BrokerError::ShutDown);
		}
		if !self.core.has_adapter(ROOT_ADAPTER) {
			self.core
				.create_adapter(ROOT_ADAPTER, ThreadModel::OrbControlled)?;
		}
		Ok(Box::new(LocalAdapter::new(self.core.clone(), ROOT_ADAPTER)))
	}

	fn naming_service(&self) -> Result<Arc<dyn NamingDirectory>, BrokerError> {
		if self.core.is_shut_down() {
			return Err(BrokerError::ShutDown);
		}
		Ok(self.naming.clone())
	}

	fn work_pending(&self) -> Result<bool, BrokerError> {
		self.core.work_pending()
	}

	fn perform_work(&self) -> Result<(), BrokerError> {
		self.core.perform_work()
	}

	fn run(&self) -> Result<(), BrokerError> {
		tracing::debug!(broker = %self.id, "Entering broker run loop");
		let result = self.core.run();
		tracing::debug!(broker = %self.id, "Broker run loop returned");
		result
	}

	fn shutdown(&self) {
		if !self.core.is_shut_down() {
			tracing::info!(broker = %self.id, "Shutting down object broker");
		}
		self.core.shutdown();
	}

	fn shutdown_handle(&self) -> ShutdownHandle {
		ShutdownHandle {
			core: self.core.clone(),
		}
	}
}

impl Drop for LocalBroker {
	fn drop(&mut self) {
		self.core.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{InvocationError, Servant, ServantError};
	use serde_json::{json, Value};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::mpsc;
	use std::thread;
	use std::time::Duration;

	/// Echoes its arguments and counts dispatches.
	struct Echo {
		calls: Arc<AtomicUsize>,
	}

	impl Servant for Echo {
		fn interface(&self) -> &'static str {
			"Echo"
		}

		fn dispatch(&mut self, operation: &str, args: Value) -> Result<Value, ServantError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			match operation {
				"echo" => Ok(args),
				other => Err(ServantError::UnknownOperation {
					interface: "Echo",
					operation: other.to_string(),
				}),
			}
		}
	}

	fn args(values: &[&str]) -> Vec<String> {
		values.iter().map(|s| s.to_string()).collect()
	}

	/// Records how many dispatches are in flight at once.
	struct Slow {
		live: Arc<AtomicUsize>,
		peak: Arc<AtomicUsize>,
	}

	impl Servant for Slow {
		fn interface(&self) -> &'static str {
			"Slow"
		}

		fn dispatch(&mut self, operation: &str, _args: Value) -> Result<Value, ServantError> {
			let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
			self.peak.fetch_max(live, Ordering::SeqCst);
			thread::sleep(Duration::from_millis(20));
			self.live.fetch_sub(1, Ordering::SeqCst);
			Ok(json!(operation))
		}
	}

	/// Signals when a dispatch starts and finishes it once released.
	struct Gated {
		started: mpsc::Sender<()>,
		release: mpsc::Receiver<()>,
	}

	impl Servant for Gated {
		fn interface(&self) -> &'static str {
			"Gated"
		}

		fn dispatch(&mut self, operation: &str, _args: Value) -> Result<Value, ServantError> {
			let _ = self.started.send(());
			let _ = self.release.recv();
			Ok(json!(operation))
		}
	}

	fn main_thread_child(broker: &LocalBroker) -> Box<dyn ObjectAdapter> {
		let root = broker.resolve_initial_references(ROOT_ADAPTER).unwrap();
		let policy = root.create_thread_policy(ThreadModel::MainThread).unwrap();
		let child = root.create_child("child", &[policy.clone()]).unwrap();
		root.destroy_thread_policy(policy).unwrap();
		child
	}

	fn child_with_echo(broker: &LocalBroker) -> (Box<dyn ObjectAdapter>, Arc<AtomicUsize>, crate::ObjectRef) {
		let child = main_thread_child(broker);

		let calls = Arc::new(AtomicUsize::new(0));
		let id = child
			.activate_object(Box::new(Echo {
				calls: calls.clone(),
			}))
			.unwrap();
		let object = child.reference(&id).unwrap();
		(child, calls, object)
	}

	#[test]
	fn test_orb_arguments() {
		let broker = LocalBroker::init(&args(&["server", "-ORBid", "test", "-ORBtraceLevel", "5"])).unwrap();
		assert_eq!(broker.id(), "test");
		assert_eq!(broker.options().get("traceLevel").map(String::as_str), Some("5"));

		assert!(matches!(
			LocalBroker::init(&args(&["-ORBid"])),
			Err(BrokerError::BadParam(_))
		));
		assert!(matches!(
			LocalBroker::init(&args(&["-ORBid", "-ORBtraceLevel", "1"])),
			Err(BrokerError::BadParam(_))
		));
		assert_eq!(LocalBroker::init(&[]).unwrap().id(), "planner");
	}

	#[test]
	fn test_unknown_initial_reference() {
		let broker = LocalBroker::init(&[]).unwrap();
		assert!(matches!(
			broker.resolve_initial_references("NameService"),
			Err(BrokerError::InvalidName(_))
		));
	}

	#[test]
	fn test_holding_adapter_defers_requests() {
		let broker = LocalBroker::init(&[]).unwrap();
		let (child, calls, object) = child_with_echo(&broker);
		assert_eq!(child.thread_model().unwrap(), ThreadModel::MainThread);

		let mut reply = object.request("echo", json!({"x": 1})).unwrap();
		assert!(!broker.work_pending().unwrap());
		broker.perform_work().unwrap();
		assert!(reply.try_take().is_none());
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		child.activate_manager().unwrap();
		assert!(broker.work_pending().unwrap());
		broker.perform_work().unwrap();
		assert_eq!(reply.try_take().unwrap().unwrap(), json!({"x": 1}));
		assert!(!broker.work_pending().unwrap());
	}

	#[test]
	fn test_perform_work_dispatches_one_request() {
		let broker = LocalBroker::init(&[]).unwrap();
		let (child, calls, object) = child_with_echo(&broker);
		child.activate_manager().unwrap();

		let mut first = object.request("echo", json!(1)).unwrap();
		let mut second = object.request("bogus", Value::Null).unwrap();

		broker.perform_work().unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(first.try_take().unwrap().unwrap(), json!(1));
		assert!(second.try_take().is_none());

		broker.perform_work().unwrap();
		assert!(matches!(
			second.try_take(),
			Some(Err(InvocationError::Servant(ServantError::UnknownOperation { .. })))
		));
	}

	#[test]
	fn test_deactivated_object_does_not_exist() {
		let broker = LocalBroker::init(&[]).unwrap();
		let (child, _calls, object) = child_with_echo(&broker);
		child.activate_manager().unwrap();
		child.deactivate_object(object.id()).unwrap();

		let mut reply = object.request("echo", Value::Null).unwrap();
		broker.perform_work().unwrap();
		assert!(matches!(
			reply.try_take(),
			Some(Err(InvocationError::ObjectNotExist(_)))
		));
		assert!(matches!(
			child.deactivate_object(object.id()),
			Err(BrokerError::ObjectNotActive(_))
		));
	}

	#[test]
	fn test_destroyed_policy_rejected() {
		let broker = LocalBroker::init(&[]).unwrap();
		let root = broker.resolve_initial_references(ROOT_ADAPTER).unwrap();
		let policy = root.create_thread_policy(ThreadModel::MainThread).unwrap();
		root.destroy_thread_policy(policy.clone()).unwrap();

		assert!(matches!(
			root.create_child("child", &[policy.clone()]),
			Err(BrokerError::InvalidPolicy(_))
		));
		assert!(root.destroy_thread_policy(policy).is_err());
	}

	#[test]
	fn test_destroy_adapter_twice() {
		let broker = LocalBroker::init(&[]).unwrap();
		let (child, _calls, _object) = child_with_echo(&broker);
		child.destroy().unwrap();
		assert!(matches!(
			child.destroy(),
			Err(BrokerError::AdapterNonExistent(_))
		));
	}

	#[test]
	fn test_shutdown_answers_queued_requests() {
		let broker = LocalBroker::init(&[]).unwrap();
		let (_child, _calls, object) = child_with_echo(&broker);
		let mut held = object.request("echo", Value::Null).unwrap();

		broker.shutdown();
		broker.shutdown();

		assert!(matches!(held.try_take(), Some(Err(InvocationError::ShutDown))));
		assert!(matches!(
			object.request("echo", Value::Null),
			Err(InvocationError::ShutDown)
		));
		assert!(matches!(broker.work_pending(), Err(BrokerError::ShutDown)));
	}

	#[test]
	fn test_run_until_shutdown_handle() {
		let broker = Arc::new(LocalBroker::init(&[]).unwrap());
		let (child, calls, object) = child_with_echo(&broker);
		child.activate_manager().unwrap();
		let handle = broker.shutdown_handle();

		let runner = {
			let broker = broker.clone();
			std::thread::spawn(move || broker.run())
		};

		let reply = object.request("echo", json!("ping")).unwrap().wait().unwrap();
		assert_eq!(reply, json!("ping"));
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		handle.shutdown();
		runner.join().unwrap().unwrap();
		assert!(handle.is_stopped());

		// Stopping the loop leaves the objects in place for an orderly teardown.
		assert!(!broker.work_pending().unwrap());
		child.deactivate_object(object.id()).unwrap();
		child.destroy().unwrap();
		broker.run().unwrap();
	}

	#[test]
	fn test_main_thread_dispatch_is_serialized() {
		let broker = Arc::new(LocalBroker::init(&[]).unwrap());
		let child = main_thread_child(&broker);
		let live = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let mut objects = Vec::new();
		for _ in 0..2 {
			let id = child
				.activate_object(Box::new(Slow {
					live: live.clone(),
					peak: peak.clone(),
				}))
				.unwrap();
			objects.push(child.reference(&id).unwrap());
		}
		child.activate_manager().unwrap();

		let replies = vec![
			objects[0].request("a1", Value::Null).unwrap(),
			objects[0].request("a2", Value::Null).unwrap(),
			objects[1].request("b1", Value::Null).unwrap(),
		];
		let pumpers: Vec<_> = (0..3)
			.map(|_| {
				let broker = broker.clone();
				thread::spawn(move || broker.perform_work())
			})
			.collect();
		for pumper in pumpers {
			pumper.join().unwrap().unwrap();
		}

		assert_eq!(peak.load(Ordering::SeqCst), 1);
		for (reply, operation) in replies.into_iter().zip(["a1", "a2", "b1"]) {
			assert_eq!(reply.wait().unwrap(), json!(operation));
		}
	}

	#[test]
	fn test_busy_servant_defers_request() {
		let broker = Arc::new(LocalBroker::init(&[]).unwrap());
		let root = broker.resolve_initial_references(ROOT_ADAPTER).unwrap();
		assert_eq!(root.thread_model().unwrap(), ThreadModel::OrbControlled);

		let (started_tx, started) = mpsc::channel();
		let (release, release_rx) = mpsc::channel();
		let id = root
			.activate_object(Box::new(Gated {
				started: started_tx,
				release: release_rx,
			}))
			.unwrap();
		root.activate_manager().unwrap();
		let object = root.reference(&id).unwrap();

		let first = object.request("first", Value::Null).unwrap();
		let mut second = object.request("second", Value::Null).unwrap();
		let pumper = {
			let broker = broker.clone();
			thread::spawn(move || broker.perform_work())
		};
		started.recv().unwrap();

		// The servant is busy: the second request waits instead of failing.
		assert!(!broker.work_pending().unwrap());
		broker.perform_work().unwrap();
		assert!(second.try_take().is_none());

		release.send(()).unwrap();
		pumper.join().unwrap().unwrap();
		assert_eq!(first.wait().unwrap(), json!("first"));

		assert!(broker.work_pending().unwrap());
		release.send(()).unwrap();
		broker.perform_work().unwrap();
		assert_eq!(second.try_take().unwrap().unwrap(), json!("second"));
	}

	#[tokio::test]
	async fn test_invoke_while_pumping() {
		let broker = LocalBroker::init(&[]).unwrap();
		let (child, _calls, object) = child_with_echo(&broker);
		child.activate_manager().unwrap();

		let invocation = tokio::spawn(async move { object.invoke("echo", json!([1, 2])).await });
		loop {
			if broker.work_pending().unwrap() {
				broker.perform_work().unwrap();
			}
			if invocation.is_finished() {
				break;
			}
			tokio::task::yield_now().await;
		}
		assert_eq!(invocation.await.unwrap().unwrap(), json!([1, 2]));
	}
}
