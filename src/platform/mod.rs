//! The effect bus: managers, the effects queue, ports and the program loop.
//!
//! Application code describes effects as [`Cmd`] and [`Sub`] values. A [`Runtime`] routes each
//! leaf to the effect manager named by it, running one process per manager on a
//! [`Scheduler`].

pub mod bag;
pub mod manager;
pub mod ports;
pub mod program;

pub use bag::{Bag, Cmd, Sub};
pub use manager::{Manager, ManagerMsg, Router};
pub use ports::{IncomingPort, OutgoingPort, SubscriberId};
pub use program::Program;

use crate::{
	collections::List,
	json::decode,
	opaque::{Opaque, Tagger},
	scheduler::{ProcessId, Scheduler},
};
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use std::{collections::VecDeque, rc::Rc};
use thiserror::Error;
use tracing::{error, instrument, trace, warn};

/// Hands a message to the running program's update function.
pub type SendToApp = Rc<dyn Fn(Opaque)>;

#[derive(Debug, Error)]
pub enum Error {
	/// Fatal. Only ever rendered into a panic.
	#[error("There can only be one port or effect manager named `{0}`.")]
	DuplicateName(String),
	#[error("No effect manager named `{0}` is defined.")]
	UnknownManager(String),
	#[error("The runtime has already started.")]
	AlreadyStarted,
	#[error("The runtime has not been started yet.")]
	NotStarted,
	#[error("Subscriber {id} is not subscribed to port `{port}`.")]
	SubscriberNotFound { port: String, id: SubscriberId },
	/// Fatal. Only ever rendered into a panic.
	#[error("Trying to send an unexpected type of value through port `{name}`:\n{error}")]
	PortDecode { name: String, error: decode::Error },
}

/// Logs `error` and panics with it.
pub(crate) fn fatal(error: &Error) -> ! {
	error!(%error, "Fatal runtime error.");
	panic!("{}", error)
}

struct Instance {
	home: Rc<str>,
	process: ProcessId,
	had_subscriptions: Cell<bool>,
}

#[derive(Default)]
struct Effects {
	commands: Vec<Opaque>,
	subscriptions: Vec<Opaque>,
}

struct RuntimeInner {
	scheduler: Scheduler,
	/// In definition order, which is also the dispatch order.
	managers: RefCell<Vec<(Rc<str>, Rc<Manager>)>>,
	instances: RefCell<Vec<Instance>>,
	send_to_app: RefCell<Option<SendToApp>>,
	queue: RefCell<VecDeque<(Cmd, Sub)>>,
	active: Cell<bool>,
}

/// One running application's effect managers and effects queue.
#[derive(Clone)]
pub struct Runtime {
	inner: Rc<RuntimeInner>,
}

impl Runtime {
	#[must_use]
	pub fn new(scheduler: Scheduler) -> Self {
		Self {
			inner: Rc::new(RuntimeInner {
				scheduler,
				managers: RefCell::default(),
				instances: RefCell::default(),
				send_to_app: RefCell::default(),
				queue: RefCell::default(),
				active: Cell::new(false),
			}),
		}
	}

	#[must_use]
	pub fn scheduler(&self) -> &Scheduler {
		&self.inner.scheduler
	}

	#[must_use]
	pub fn is_started(&self) -> bool {
		self.inner.send_to_app.borrow().is_some()
	}

	/// Registers `manager` under `home`. Leaves addressed to `home` are routed to it.
	///
	/// # Errors
	///
	/// Iff the runtime was already started.
	///
	/// # Panics
	///
	/// Iff a port or manager named `home` exists already.
	pub fn define_manager(&self, home: &str, manager: Manager) -> Result<(), Error> {
		if self.is_started() {
			warn!(home, "Tried to define an effect manager after start.");
			return Err(Error::AlreadyStarted);
		}
		let mut managers = self.inner.managers.borrow_mut();
		if managers.iter().any(|(existing, _)| &**existing == home) {
			drop(managers);
			fatal(&Error::DuplicateName(home.to_owned()));
		}
		managers.push((home.into(), Rc::new(manager)));
		Ok(())
	}

	/// Spawns one process per defined manager. Messages from managers and listeners go to
	/// `send_to_app`.
	///
	/// # Errors
	///
	/// Iff the runtime was already started.
	#[instrument(skip(self, send_to_app))]
	pub fn start(&self, send_to_app: SendToApp) -> Result<(), Error> {
		if self.is_started() {
			return Err(Error::AlreadyStarted);
		}
		*self.inner.send_to_app.borrow_mut() = Some(send_to_app.clone());

		let managers = self.inner.managers.borrow().clone();
		for (home, manager) in managers {
			let router = Router::new(send_to_app.clone(), self.inner.scheduler.downgrade());
			let task = manager::manager_task(manager, router.clone());
			let process = self.inner.scheduler.raw_spawn(task);
			router.set_process(process);
			trace!(home = &*home, ?process, "Spawned effect manager.");
			self.inner.instances.borrow_mut().push(Instance {
				home,
				process,
				had_subscriptions: Cell::new(false),
			});
		}
		Ok(())
	}

	/// # Errors
	///
	/// Iff the runtime was not started yet.
	pub fn send_to_app(&self) -> Result<SendToApp, Error> {
		self.inner.send_to_app.borrow().clone().ok_or(Error::NotStarted)
	}

	/// The process running the manager named `home`.
	///
	/// # Errors
	///
	/// Iff there is no such manager or the runtime was not started yet.
	pub fn process_of(&self, home: &str) -> Result<ProcessId, Error> {
		if !self.is_started() {
			return Err(Error::NotStarted);
		}
		self.inner
			.instances
			.borrow()
			.iter()
			.find(|instance| &*instance.home == home)
			.map(|instance| instance.process)
			.ok_or_else(|| Error::UnknownManager(home.to_owned()))
	}

	/// Queues `cmd` and `sub` for dispatch and, unless a dispatch is already running further up
	/// the stack, dispatches the whole queue in order.
	///
	/// Each manager with effects this round, or with subscriptions last round, receives one
	/// [`ManagerMsg::Effects`] per call.
	#[instrument(skip(self, cmd, sub))]
	pub fn enqueue_effects(&self, cmd: Cmd, sub: Sub) {
		self.inner.queue.borrow_mut().push_back((cmd, sub));
		if self.inner.active.replace(true) {
			trace!("Effects queued behind the current dispatch.");
			return;
		}
		loop {
			let next = self.inner.queue.borrow_mut().pop_front();
			match next {
				Some((cmd, sub)) => self.dispatch_effects(&cmd, &sub),
				None => break,
			}
		}
		self.inner.active.set(false);
	}

	fn dispatch_effects(&self, cmd: &Cmd, sub: &Sub) {
		let managers = self.inner.managers.borrow().clone();
		let mut effects = HashMap::new();
		gather(&managers, true, cmd.bag(), &mut effects, &List::new());
		gather(&managers, false, sub.bag(), &mut effects, &List::new());

		let deliveries: Vec<(ProcessId, Effects)> = {
			let instances = self.inner.instances.borrow();
			if instances.is_empty() && !effects.is_empty() {
				error!("Effects enqueued before the runtime was started were dropped.");
			}
			instances
				.iter()
				.filter_map(|instance| {
					let effects = effects.remove(&instance.home);
					let has_subscriptions = effects.as_ref().map_or(false, |effects| !effects.subscriptions.is_empty());
					let had_subscriptions = instance.had_subscriptions.replace(has_subscriptions);
					match effects {
						Some(effects) => Some((instance.process, effects)),
						None if had_subscriptions => Some((instance.process, Effects::default())),
						None => None,
					}
				})
				.collect()
		};

		for (process, Effects { commands, subscriptions }) in deliveries {
			self.inner
				.scheduler
				.raw_send(process, Opaque::new(ManagerMsg::Effects { commands, subscriptions }));
		}
	}
}

fn gather(
	managers: &[(Rc<str>, Rc<Manager>)],
	is_cmd: bool,
	bag: &Bag,
	effects: &mut HashMap<Rc<str>, Effects>,
	taggers: &List<Tagger>,
) {
	match bag {
		Bag::Leaf { home, value } => {
			let manager = match managers.iter().find(|(existing, _)| existing == home) {
				Some((_, manager)) => manager,
				None => {
					error!(home = &**home, "Dropped an effect for an unknown manager.");
					return;
				}
			};
			let map = if is_cmd { &manager.cmd_map } else { &manager.sub_map };
			let value = match map {
				Some(map) => {
					let taggers = taggers.clone();
					let composed: Tagger = Rc::new(move |mut message: Opaque| -> Opaque {
						for tagger in &taggers {
							message = tagger(message);
						}
						message
					});
					map(&composed, value.clone())
				}
				None => value.clone(),
			};
			let entry = effects.entry(home.clone()).or_default();
			if is_cmd {
				entry.commands.push(value);
			} else {
				entry.subscriptions.push(value);
			}
		}
		Bag::Batch(bags) => {
			for bag in bags {
				gather(managers, is_cmd, bag, effects, taggers);
			}
		}
		Bag::Map(tagger, bag) => gather(managers, is_cmd, bag, effects, &taggers.cons(tagger.clone())),
	}
}
