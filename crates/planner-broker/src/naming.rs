//! Naming directory mapping hierarchical names to object references.
//!
//! A name is a sequence of `(id, kind)` components, written `id.kind` and
//! joined with `/`, e.g. `hpp.plannerContext/Problem.Object`. Every prefix of
//! a bound name must be bound as a naming context.

use crate::ObjectRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors raised by naming directory operations.
#[derive(Debug, Error, PartialEq)]
pub enum NamingError {
	#[error("Name already bound: {0}")]
	AlreadyBound(String),
	#[error("Name not found: {0}")]
	NotFound(String),
	#[error("Invalid name: {0}")]
	InvalidName(String),
}

/// One component of a hierarchical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameComponent {
	pub id: String,
	pub kind: String,
}

impl NameComponent {
	pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			kind: kind.into(),
		}
	}
}

impl std::fmt::Display for NameComponent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.kind.is_empty() {
			write!(f, "{}", self.id)
		} else {
			write!(f, "{}.{}", self.id, self.kind)
		}
	}
}

/// Renders a name as `a.kind/b.kind`.
pub fn name_to_string(name: &[NameComponent]) -> String {
	name.iter()
		.map(|c| c.to_string())
		.collect::<Vec<_>>()
		.join("/")
}

/// Trait defining the interface for naming directories.
pub trait NamingDirectory: Send + Sync {
	/// Binds a new naming context.
	fn bind_context(&self, name: &[NameComponent]) -> Result<(), NamingError>;

	/// Binds `object` under `name`; fails if the name is already bound.
	fn bind(&self, name: &[NameComponent], object: ObjectRef) -> Result<(), NamingError>;

	/// Binds `object` under `name`, replacing a previous object binding.
	fn rebind(&self, name: &[NameComponent], object: ObjectRef) -> Result<(), NamingError>;

	fn resolve(&self, name: &[NameComponent]) -> Result<ObjectRef, NamingError>;

	fn unbind(&self, name: &[NameComponent]) -> Result<(), NamingError>;

	/// Names bound directly under `context` (the root when empty).
	fn list(&self, context: &[NameComponent]) -> Result<Vec<NameComponent>, NamingError>;
}

enum Binding {
	Context,
	Object(ObjectRef),
}

/// Naming directory kept in process memory.
#[derive(Default)]
pub struct InMemoryNaming {
	bindings: RwLock<BTreeMap<Vec<NameComponent>, Binding>>,
}

impl InMemoryNaming {
	pub fn new() -> Self {
		Self::default()
	}

	fn check_name(
		bindings: &BTreeMap<Vec<NameComponent>, Binding>,
		name: &[NameComponent],
	) -> Result<(), NamingError> {
		let Some((_, parent)) = name.split_last() else {
			return Err(NamingError::InvalidName("empty name".to_string()));
		};
		if name.iter().any(|c| c.id.is_empty()) {
			return Err(NamingError::InvalidName(name_to_string(name)));
		}
		if !parent.is_empty() && !matches!(bindings.get(parent), Some(Binding::Context)) {
			return Err(NamingError::NotFound(name_to_string(parent)));
		}
		Ok(())
	}

	fn insert(&self, name: &[NameComponent], binding: Binding, replace: bool) -> Result<(), NamingError> {
		let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
		Self::check_name(&bindings, name)?;

		match bindings.get(name) {
			Some(Binding::Object(_)) if replace => {},
			Some(_) => return Err(NamingError::AlreadyBound(name_to_string(name))),
			None => {},
		}
		bindings.insert(name.to_vec(), binding);
		Ok(())
	}
}

impl NamingDirectory for InMemoryNaming {
	fn bind_context(&self, name: &[NameComponent]) -> Result<(), NamingError> {
		self.insert(name, Binding::Context, false)
	}

	fn bind(&self, name: &[NameComponent], object: ObjectRef) -> Result<(), NamingError> {
		self.insert(name, Binding::Object(object), false)
	}

	fn rebind(&self, name: &[NameComponent], object: ObjectRef) -> Result<(), NamingError> {
		self.insert(name, Binding::Object(object), true)
	}

	fn resolve(&self, name: &[NameComponent]) -> Result<ObjectRef, NamingError> {
		let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
		match bindings.get(name) {
			Some(Binding::Object(object)) => Ok(object.clone()),
			Some(Binding::Context) => Err(NamingError::InvalidName(format!(
				"{} is a naming context",
				name_to_string(name)
			))),
			None => Err(NamingError::NotFound(name_to_string(name))),
		}
	}

	fn unbind(&self, name: &[NameComponent]) -> Result<(), NamingError> {
		let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
		if !bindings.contains_key(name) {
			return Err(NamingError::NotFound(name_to_string(name)));
		}
		let has_children = bindings
			.keys()
			.any(|key| key.len() > name.len() && key.starts_with(name));
		if has_children {
			return Err(NamingError::InvalidName(format!(
				"context {} is not empty",
				name_to_string(name)
			)));
		}
		bindings.remove(name);
		Ok(())
	}

	fn list(&self, context: &[NameComponent]) -> Result<Vec<NameComponent>, NamingError> {
		let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
		if !context.is_empty() && !matches!(bindings.get(context), Some(Binding::Context)) {
			return Err(NamingError::NotFound(name_to_string(context)));
		}
		Ok(bindings
			.keys()
			.filter(|key| key.len() == context.len() + 1 && key.starts_with(context))
			.filter_map(|key| key.last().cloned())
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{LocalBroker, ObjectAdapter, ObjectBroker, Servant, ServantError};
	use serde_json::Value;

	struct Nothing;

	impl Servant for Nothing {
		fn interface(&self) -> &'static str {
			"Nothing"
		}

		fn dispatch(&mut self, _operation: &str, args: Value) -> Result<Value, ServantError> {
			Ok(args)
		}
	}

	fn object_ref(broker: &LocalBroker) -> ObjectRef {
		let root = broker.resolve_initial_references("RootPOA").unwrap();
		let id = root.activate_object(Box::new(Nothing)).unwrap();
		root.reference(&id).unwrap()
	}

	fn name(parts: &[(&str, &str)]) -> Vec<NameComponent> {
		parts
			.iter()
			.map(|(id, kind)| NameComponent::new(*id, *kind))
			.collect()
	}

	#[test]
	fn test_bind_resolve_unbind() {
		let broker = LocalBroker::init(&[]).unwrap();
		let naming = InMemoryNaming::new();
		let context = name(&[("hpp", "plannerContext")]);
		let problem = name(&[("hpp", "plannerContext"), ("Problem", "Object")]);
		let object = object_ref(&broker);

		naming.bind_context(&context).unwrap();
		naming.bind(&problem, object.clone()).unwrap();

		assert_eq!(naming.resolve(&problem).unwrap(), object);
		assert_eq!(
			naming.list(&context).unwrap(),
			vec![NameComponent::new("Problem", "Object")]
		);

		naming.unbind(&problem).unwrap();
		assert!(matches!(
			naming.resolve(&problem),
			Err(NamingError::NotFound(_))
		));
	}

	#[test]
	fn test_bind_twice_then_rebind() {
		let broker = LocalBroker::init(&[]).unwrap();
		let naming = InMemoryNaming::new();
		let robot = name(&[("Robot", "Object")]);
		let first = object_ref(&broker);
		let second = object_ref(&broker);

		naming.bind(&robot, first).unwrap();
		assert_eq!(
			naming.bind(&robot, second.clone()),
			Err(NamingError::AlreadyBound("Robot.Object".to_string()))
		);
		naming.rebind(&robot, second.clone()).unwrap();
		assert_eq!(naming.resolve(&robot).unwrap(), second);
	}

	#[test]
	fn test_parent_context_required() {
		let broker = LocalBroker::init(&[]).unwrap();
		let naming = InMemoryNaming::new();
		let orphan = name(&[("missing", "ctx"), ("Robot", "Object")]);
		assert_eq!(
			naming.bind(&orphan, object_ref(&broker)),
			Err(NamingError::NotFound("missing.ctx".to_string()))
		);
		assert!(matches!(
			naming.bind_context(&[]),
			Err(NamingError::InvalidName(_))
		));
	}

	#[test]
	fn test_context_cannot_be_unbound_while_populated() {
		let broker = LocalBroker::init(&[]).unwrap();
		let naming = InMemoryNaming::new();
		let context = name(&[("hpp", "plannerContext")]);
		naming.bind_context(&context).unwrap();
		assert!(matches!(
			naming.bind_context(&context),
			Err(NamingError::AlreadyBound(_))
		));
		naming
			.bind(
				&name(&[("hpp", "plannerContext"), ("Robot", "Object")]),
				object_ref(&broker),
			)
			.unwrap();

		assert!(matches!(
			naming.unbind(&context),
			Err(NamingError::InvalidName(_))
		));
		assert!(matches!(
			naming.resolve(&context),
			Err(NamingError::InvalidName(_))
		));
	}
}
