//! Suspendable computations.
//!
//! A [`Task`] is a pure description. It does nothing until a [`Scheduler`](crate::scheduler::Scheduler)
//! spawns it as a process.

use crate::{opaque::Opaque, scheduler::Resolver};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;

/// Cleanup for a pending [`Task::Binding`], run iff the owning process is killed first.
pub type Cancel = Box<dyn FnOnce()>;

/// A continuation from a task's outcome to the next task.
pub type Callback = Rc<dyn Fn(Opaque) -> Task>;

#[derive(Clone)]
pub enum Task {
	Succeed(Opaque),
	Fail(Opaque),
	/// An externally-driven operation. The function is called once each time the task is
	/// reached and must eventually (or immediately) call [`Resolver::resolve`].
	Binding(Rc<dyn Fn(Resolver) -> Option<Cancel>>),
	AndThen(Callback, Box<Task>),
	OnError(Callback, Box<Task>),
	/// Waits for the next message in the process's mailbox.
	Receive(Callback),
}

impl Task {
	pub fn succeed<T: Any>(value: T) -> Self {
		Self::Succeed(Opaque::new(value))
	}

	pub fn fail<T: Any>(error: T) -> Self {
		Self::Fail(Opaque::new(error))
	}

	pub fn binding(start: impl Fn(Resolver) -> Option<Cancel> + 'static) -> Self {
		Self::Binding(Rc::new(start))
	}

	pub fn receive(handler: impl Fn(Opaque) -> Task + 'static) -> Self {
		Self::Receive(Rc::new(handler))
	}

	#[must_use]
	pub fn and_then(self, next: impl Fn(Opaque) -> Task + 'static) -> Self {
		Self::AndThen(Rc::new(next), Box::new(self))
	}

	#[must_use]
	pub fn on_error(self, recover: impl Fn(Opaque) -> Task + 'static) -> Self {
		Self::OnError(Rc::new(recover), Box::new(self))
	}

	#[must_use]
	pub fn map(self, f: impl Fn(Opaque) -> Opaque + 'static) -> Self {
		self.and_then(move |value| Self::Succeed(f(value)))
	}

	#[must_use]
	pub fn map_error(self, f: impl Fn(Opaque) -> Opaque + 'static) -> Self {
		self.on_error(move |error| Self::Fail(f(error)))
	}

	/// Runs `tasks` one after another and succeeds with a `Vec<Opaque>` of their results.
	/// Fails with the first failure.
	#[must_use]
	pub fn sequence(tasks: Vec<Task>) -> Self {
		tasks.into_iter().rev().fold(Self::succeed(Vec::<Opaque>::new()), |rest, task| {
			let rest = Rc::new(rest);
			task.and_then(move |head| {
				Task::clone(&rest).map(move |tail| {
					let mut results = vec![head.clone()];
					results.extend(tail.get::<Vec<Opaque>>());
					Opaque::new(results)
				})
			})
		})
	}
}

impl Debug for Task {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Task::Succeed(value) => f.debug_tuple("Succeed").field(value).finish(),
			Task::Fail(error) => f.debug_tuple("Fail").field(error).finish(),
			Task::Binding(_) => f.write_str("Binding(..)"),
			Task::AndThen(_, inner) => f.debug_tuple("AndThen").field(&"..").field(inner).finish(),
			Task::OnError(_, inner) => f.debug_tuple("OnError").field(&"..").field(inner).finish(),
			Task::Receive(_) => f.write_str("Receive(..)"),
		}
	}
}
