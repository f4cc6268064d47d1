//! A single-threaded cooperative scheduler.
//!
//! Processes are stepped until they block, one at a time, in strict FIFO order. A process that
//! becomes runnable while the queue is draining (because a binding resolved synchronously, or a
//! message arrived) is appended to the same queue instead of running immediately.

use crate::{
	collections::List,
	opaque::Opaque,
	task::{Callback, Cancel, Task},
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Display, Formatter},
};
use hashbrown::HashMap;
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{instrument, trace, trace_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl Display for ProcessId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "<{}>", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
	/// Queued or able to make progress when next stepped.
	Runnable,
	BlockedOnBinding,
	BlockedOnMailbox,
	/// Finished with an outcome nothing on its stack handles, or killed. Never makes progress
	/// again.
	Halted,
	/// Not spawned by this scheduler.
	Dead,
}

#[derive(Clone)]
enum Frame {
	Succeed(Callback),
	Fail(Callback),
}

struct Process {
	id: ProcessId,
	root: Option<Task>,
	stack: List<Frame>,
	mailbox: VecDeque<Opaque>,
	binding_epoch: u64,
	/// `Some(epoch)` while blocked on the binding started at that epoch.
	awaiting: Option<u64>,
	cancel: Option<Cancel>,
	/// Set once the process halted or was killed.
	released: bool,
}

impl Process {
	/// Unwinds the stack to the nearest frame handling this kind of outcome.
	fn pop_handler(&mut self, success: bool) -> Option<Callback> {
		loop {
			let (frame, rest) = match self.stack.uncons() {
				Some((frame, rest)) => (frame.clone(), rest.clone()),
				None => return None,
			};
			self.stack = rest;
			match (frame, success) {
				(Frame::Succeed(handler), true) | (Frame::Fail(handler), false) => return Some(handler),
				_ => (),
			}
		}
	}

	fn clear(&mut self) {
		self.released = true;
		self.root = None;
		self.awaiting = None;
		self.stack = List::new();
		self.mailbox.clear();
	}
}

struct Inner {
	queue: RefCell<VecDeque<Rc<RefCell<Process>>>>,
	working: Cell<bool>,
	next_id: Cell<u64>,
	processes: RefCell<HashMap<ProcessId, Rc<RefCell<Process>>>>,
}

/// Handle to a scheduler instance. Clones refer to the same instance.
#[derive(Clone)]
pub struct Scheduler {
	inner: Rc<Inner>,
}

impl Default for Scheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl Debug for Scheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scheduler")
			.field("queued", &self.inner.queue.borrow().len())
			.field("working", &self.inner.working.get())
			.field("processes", &self.inner.processes.borrow().len())
			.finish()
	}
}

impl Scheduler {
	#[must_use]
	pub fn new() -> Self {
		Self {
			inner: Rc::new(Inner {
				queue: RefCell::new(VecDeque::new()),
				working: Cell::new(false),
				next_id: Cell::new(0),
				processes: RefCell::new(HashMap::new()),
			}),
		}
	}

	/// A handle that does not keep this scheduler alive.
	#[must_use]
	pub fn downgrade(&self) -> WeakScheduler {
		WeakScheduler(Rc::downgrade(&self.inner))
	}

	fn process(&self, id: ProcessId) -> Option<Rc<RefCell<Process>>> {
		self.inner.processes.borrow().get(&id).cloned()
	}

	/// Starts `task` as a new process and returns its id once the queue has drained (or
	/// immediately, if called while draining).
	#[instrument(skip(self, task))]
	pub fn raw_spawn(&self, task: Task) -> ProcessId {
		let id = ProcessId(self.inner.next_id.get());
		self.inner.next_id.set(id.0 + 1);
		let process = Rc::new(RefCell::new(Process {
			id,
			root: Some(task),
			stack: List::new(),
			mailbox: VecDeque::new(),
			binding_epoch: 0,
			awaiting: None,
			cancel: None,
			released: false,
		}));
		self.inner.processes.borrow_mut().insert(id, process.clone());
		trace!(%id, "Spawned");
		self.enqueue(process);
		id
	}

	/// A task that spawns `task` and succeeds with its [`ProcessId`].
	#[must_use]
	pub fn spawn(&self, task: Task) -> Task {
		let scheduler = Rc::downgrade(&self.inner);
		Task::binding(move |resolver| {
			if let Some(inner) = scheduler.upgrade() {
				let id = Scheduler { inner }.raw_spawn(task.clone());
				resolver.resolve(Task::succeed(id));
			}
			None
		})
	}

	/// Appends `message` to the mailbox of process `id` and wakes it.
	#[instrument(skip(self, message))]
	pub fn raw_send(&self, id: ProcessId, message: Opaque) {
		match self.process(id) {
			Some(process) => {
				process.borrow_mut().mailbox.push_back(message);
				self.enqueue(process);
			}
			None => warn!(%id, "Message sent to a finished process was dropped"),
		}
	}

	/// A task that sends `message` to process `id` and succeeds with `()`.
	#[must_use]
	pub fn send(&self, id: ProcessId, message: Opaque) -> Task {
		let scheduler = Rc::downgrade(&self.inner);
		Task::binding(move |resolver| {
			if let Some(inner) = scheduler.upgrade() {
				Scheduler { inner }.raw_send(id, message.clone());
				resolver.resolve(Task::succeed(()));
			}
			None
		})
	}

	/// Cancels the pending binding of process `id`, if any, and releases it.
	#[instrument(skip(self))]
	pub fn raw_kill(&self, id: ProcessId) {
		let process = self.inner.processes.borrow_mut().remove(&id);
		let cancel = process.and_then(|process| {
			let mut process = process.borrow_mut();
			process.clear();
			let cancel = process.cancel.take();
			cancel
		});
		if let Some(cancel) = cancel {
			trace!(%id, "Cancelling pending binding");
			cancel();
		}
	}

	/// A task that kills process `id` and succeeds with `()`.
	#[must_use]
	pub fn kill(&self, id: ProcessId) -> Task {
		let scheduler = Rc::downgrade(&self.inner);
		Task::binding(move |resolver| {
			if let Some(inner) = scheduler.upgrade() {
				Scheduler { inner }.raw_kill(id);
				resolver.resolve(Task::succeed(()));
			}
			None
		})
	}

	/// Finished and killed processes are not kept around, so both report
	/// [`ProcessState::Halted`].
	#[must_use]
	pub fn state(&self, id: ProcessId) -> ProcessState {
		let process = match self.process(id) {
			Some(process) => process,
			None if id.0 < self.inner.next_id.get() => return ProcessState::Halted,
			None => return ProcessState::Dead,
		};
		let process = process.borrow();
		match &process.root {
			None => ProcessState::Halted,
			Some(Task::Binding(_)) if process.awaiting.is_some() => ProcessState::BlockedOnBinding,
			Some(Task::Receive(_)) if process.mailbox.is_empty() => ProcessState::BlockedOnMailbox,
			Some(_) => ProcessState::Runnable,
		}
	}

	/// The number of processes that can still make progress.
	#[must_use]
	pub fn live_processes(&self) -> usize {
		self.inner.processes.borrow().len()
	}

	/// Whether no process is queued and no drain is in progress.
	#[must_use]
	pub fn is_idle(&self) -> bool {
		!self.inner.working.get() && self.inner.queue.borrow().is_empty()
	}

	fn enqueue(&self, process: Rc<RefCell<Process>>) {
		self.inner.queue.borrow_mut().push_back(process);
		if self.inner.working.replace(true) {
			return;
		}

		let span = trace_span!("drain");
		let _enter = span.enter();
		loop {
			let next = self.inner.queue.borrow_mut().pop_front();
			match next {
				Some(process) => self.step(&process),
				None => break,
			}
		}
		self.inner.working.set(false);
	}

	/// Runs `process` until it blocks, halts or is killed.
	///
	/// No `RefCell` borrow of the process is held while user callbacks run. A callback may kill
	/// the process it runs in, so each continuation is dropped if that happened.
	#[allow(clippy::too_many_lines)]
	fn step(&self, process: &Rc<RefCell<Process>>) {
		let id = process.borrow().id;
		let span = trace_span!("step", %id);
		let _enter = span.enter();

		loop {
			let root = match process.borrow_mut().root.take() {
				Some(root) => root,
				None => return trace!("Released"),
			};

			let next = match root {
				Task::Succeed(value) => {
					let handler = process.borrow_mut().pop_handler(true);
					match handler {
						Some(handler) => handler(value),
						None => return self.release(process, "Halted on success"),
					}
				}

				Task::Fail(error) => {
					let handler = process.borrow_mut().pop_handler(false);
					match handler {
						Some(handler) => handler(error),
						None => return self.release(process, "Halted on failure"),
					}
				}

				Task::Binding(start) => {
					let resolver = {
						let mut process = process.borrow_mut();
						process.binding_epoch += 1;
						process.awaiting = Some(process.binding_epoch);
						process.root = Some(Task::Binding(start.clone()));
						Resolver {
							scheduler: Rc::downgrade(&self.inner),
							id,
							epoch: process.binding_epoch,
						}
					};
					let epoch = resolver.epoch;
					let cancel = start(resolver);

					let cancel = {
						let mut process = process.borrow_mut();
						if process.released {
							cancel
						} else {
							if process.awaiting == Some(epoch) {
								process.cancel = cancel;
								trace!("Blocked on binding");
							}
							None
						}
					};
					if let Some(cancel) = cancel {
						trace!("Killed while starting a binding");
						cancel();
					}
					return;
				}

				Task::Receive(handler) => {
					let message = process.borrow_mut().mailbox.pop_front();
					match message {
						Some(message) => handler(message),
						None => {
							process.borrow_mut().root = Some(Task::Receive(handler));
							return trace!("Blocked on mailbox");
						}
					}
				}

				Task::AndThen(next, inner) => {
					let mut process = process.borrow_mut();
					process.stack = process.stack.cons(Frame::Succeed(next));
					*inner
				}

				Task::OnError(recover, inner) => {
					let mut process = process.borrow_mut();
					process.stack = process.stack.cons(Frame::Fail(recover));
					*inner
				}
			};

			let mut process = process.borrow_mut();
			if process.released {
				return trace!("Killed by its own callback");
			}
			process.root = Some(next);
		}
	}

	/// Drops a finished process from the table. Its id keeps reporting [`ProcessState::Halted`].
	fn release(&self, process: &Rc<RefCell<Process>>, reason: &'static str) {
		let id = {
			let mut process = process.borrow_mut();
			process.clear();
			process.id
		};
		self.inner.processes.borrow_mut().remove(&id);
		trace!("{}", reason);
	}
}

#[derive(Clone)]
pub struct WeakScheduler(Weak<Inner>);

impl WeakScheduler {
	#[must_use]
	pub fn upgrade(&self) -> Option<Scheduler> {
		self.0.upgrade().map(|inner| Scheduler { inner })
	}
}

impl Debug for WeakScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("WeakScheduler")
	}
}

/// Completes a pending [`Task::Binding`]. Resolving more than once, or after the process was
/// killed, does nothing.
pub struct Resolver {
	scheduler: Weak<Inner>,
	id: ProcessId,
	epoch: u64,
}

impl Debug for Resolver {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resolver").field("id", &self.id).field("epoch", &self.epoch).finish()
	}
}

impl Resolver {
	/// The process this resolver wakes.
	#[must_use]
	pub fn process_id(&self) -> ProcessId {
		self.id
	}

	/// Replaces the blocked binding with `task` and requeues the process.
	pub fn resolve(self, task: Task) {
		let scheduler = match self.scheduler.upgrade() {
			Some(inner) => Scheduler { inner },
			None => return warn!(id = %self.id, "Binding resolved after its scheduler was dropped"),
		};
		let process = match scheduler.process(self.id) {
			Some(process) => process,
			None => return warn!(id = %self.id, "Binding resolved for a finished process"),
		};
		{
			let mut process = process.borrow_mut();
			if process.awaiting != Some(self.epoch) {
				return warn!(id = %self.id, "Binding resolved more than once");
			}
			process.awaiting = None;
			process.cancel = None;
			process.root = Some(task);
		}
		scheduler.enqueue(process);
	}
}
