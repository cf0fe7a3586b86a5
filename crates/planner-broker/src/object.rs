//! Object identities, references and replies.

use crate::InvocationError;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Identity of an activated object: the path of its adapter plus a key
/// unique within the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
	adapter: String,
	key: Uuid,
}

impl ObjectId {
	pub(crate) fn new(adapter: impl Into<String>) -> Self {
		Self {
			adapter: adapter.into(),
			key: Uuid::new_v4(),
		}
	}

	/// Path of the adapter the object lives in, e.g. `RootPOA/child`.
	pub fn adapter(&self) -> &str {
		&self.adapter
	}
}

impl std::fmt::Display for ObjectId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.adapter, self.key)
	}
}

pub(crate) type ReplySender = oneshot::Sender<Result<Value, InvocationError>>;

/// A queued invocation.
pub(crate) struct Request {
	pub target: ObjectId,
	pub operation: String,
	pub args: Value,
	pub reply: ReplySender,
}

/// Messages carried by the broker queue.
pub(crate) enum Envelope {
	Request(Request),
	/// Re-evaluate held requests, sent when a manager is activated.
	Wake,
	/// Stop the run loop; the broker stays usable.
	Stop,
	Shutdown,
}

/// Reference to a remote object.
///
/// References are cheap to clone and can be shared across threads; invoking
/// one only enqueues the request. The reply is produced once the host pumps
/// the broker.
#[derive(Clone)]
pub struct ObjectRef {
	id: ObjectId,
	interface: &'static str,
	queue: mpsc::Sender<Envelope>,
	shut_down: Arc<AtomicBool>,
}

impl std::fmt::Debug for ObjectRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ObjectRef")
			.field("id", &self.id)
			.field("interface", &self.interface)
			.finish()
	}
}

impl PartialEq for ObjectRef {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl ObjectRef {
	pub(crate) fn new(
		id: ObjectId,
		interface: &'static str,
		queue: mpsc::Sender<Envelope>,
		shut_down: Arc<AtomicBool>,
	) -> Self {
		Self {
			id,
			interface,
			queue,
			shut_down,
		}
	}

	pub fn id(&self) -> &ObjectId {
		&self.id
	}

	pub fn interface(&self) -> &'static str {
		self.interface
	}

	/// Enqueues `operation` and returns a handle on the future reply.
	pub fn request(
		&self,
		operation: impl Into<String>,
		args: Value,
	) -> Result<PendingReply, InvocationError> {
		if self.shut_down.load(Ordering::SeqCst) {
			return Err(InvocationError::ShutDown);
		}
		let (reply, receiver) = oneshot::channel();
		let request = Request {
			target: self.id.clone(),
			operation: operation.into(),
			args,
			reply,
		};
		self.queue
			.send(Envelope::Request(request))
			.map_err(|_| InvocationError::ShutDown)?;
		Ok(PendingReply { receiver })
	}

	/// Invokes `operation` and waits for the reply.
	///
	/// Another task or thread has to pump the broker meanwhile.
	pub async fn invoke(
		&self,
		operation: impl Into<String>,
		args: Value,
	) -> Result<Value, InvocationError> {
		self.request(operation, args)?.recv().await
	}
}

/// Reply of an invocation that may not have been dispatched yet.
pub struct PendingReply {
	receiver: oneshot::Receiver<Result<Value, InvocationError>>,
}

impl PendingReply {
	/// Blocks the current thread until the reply arrives.
	///
	/// Must not be called from within an async runtime; use [`recv`](Self::recv)
	/// there.
	pub fn wait(self) -> Result<Value, InvocationError> {
		self.receiver
			.blocking_recv()
			.map_err(|_| InvocationError::NoReply)?
	}

	/// Returns the reply if it has been produced.
	pub fn try_take(&mut self) -> Option<Result<Value, InvocationError>> {
		match self.receiver.try_recv() {
			Ok(reply) => Some(reply),
			Err(oneshot::error::TryRecvError::Empty) => None,
			Err(oneshot::error::TryRecvError::Closed) => Some(Err(InvocationError::NoReply)),
		}
	}

	/// Waits asynchronously for the reply.
	pub async fn recv(self) -> Result<Value, InvocationError> {
		self.receiver.await.map_err(|_| InvocationError::NoReply)?
	}
}
