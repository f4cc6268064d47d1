//! Effect managers: long-lived processes that own one kind of effect.

use super::SendToApp;
use crate::{
	opaque::{Opaque, Tagger},
	scheduler::{ProcessId, WeakScheduler},
	task::{Callback, Task},
};
use core::cell::Cell;
use std::rc::Rc;
use tracing::{trace, warn};

/// Handles [`Effects`](ManagerMsg::Effects): `(router, commands, subscriptions, state) -> Task<state>`.
pub type OnEffects = Rc<dyn Fn(&Router, Vec<Opaque>, Vec<Opaque>, Opaque) -> Task>;
/// Handles [`SelfMsg`](ManagerMsg::SelfMsg): `(router, message, state) -> Task<state>`.
pub type OnSelfMsg = Rc<dyn Fn(&Router, Opaque, Opaque) -> Task>;
/// Applies a composed tagger to one effect value.
pub type EffectMap = Rc<dyn Fn(&Tagger, Opaque) -> Opaque>;

/// The definition of an effect manager.
///
/// The manager's state starts as the result of `init` and is threaded through every handler.
#[derive(Clone)]
pub struct Manager {
	pub init: Task,
	pub on_effects: OnEffects,
	pub on_self_msg: OnSelfMsg,
	/// `None` iff the manager takes no commands. Values then pass through untagged.
	pub cmd_map: Option<EffectMap>,
	/// `None` iff the manager takes no subscriptions.
	pub sub_map: Option<EffectMap>,
}

impl Manager {
	/// A manager whose self messages are ignored.
	pub fn new(init: Task, on_effects: impl Fn(&Router, Vec<Opaque>, Vec<Opaque>, Opaque) -> Task + 'static) -> Self {
		Self {
			init,
			on_effects: Rc::new(on_effects),
			on_self_msg: Rc::new(|_: &Router, _: Opaque, state: Opaque| Task::Succeed(state)),
			cmd_map: None,
			sub_map: None,
		}
	}

	#[must_use]
	pub fn on_self_msg(mut self, on_self_msg: impl Fn(&Router, Opaque, Opaque) -> Task + 'static) -> Self {
		self.on_self_msg = Rc::new(on_self_msg);
		self
	}

	#[must_use]
	pub fn cmd_map(mut self, cmd_map: impl Fn(&Tagger, Opaque) -> Opaque + 'static) -> Self {
		self.cmd_map = Some(Rc::new(cmd_map));
		self
	}

	#[must_use]
	pub fn sub_map(mut self, sub_map: impl Fn(&Tagger, Opaque) -> Opaque + 'static) -> Self {
		self.sub_map = Some(Rc::new(sub_map));
		self
	}
}

/// What a manager process receives.
#[derive(Clone, Debug)]
pub enum ManagerMsg {
	SelfMsg(Opaque),
	Effects {
		commands: Vec<Opaque>,
		subscriptions: Vec<Opaque>,
	},
}

/// A manager's way back into the program and into its own mailbox.
#[derive(Clone)]
pub struct Router {
	send_to_app: SendToApp,
	scheduler: WeakScheduler,
	process: Rc<Cell<Option<ProcessId>>>,
}

impl Router {
	pub(crate) fn new(send_to_app: SendToApp, scheduler: WeakScheduler) -> Self {
		Self {
			send_to_app,
			scheduler,
			process: Rc::new(Cell::new(None)),
		}
	}

	pub(crate) fn set_process(&self, id: ProcessId) {
		self.process.set(Some(id));
	}

	/// The manager's own process, once spawned.
	#[must_use]
	pub fn process(&self) -> Option<ProcessId> {
		self.process.get()
	}

	/// A task that hands `message` to the program's update function and succeeds with `()`.
	#[must_use]
	pub fn send_to_app(&self, message: Opaque) -> Task {
		let send_to_app = self.send_to_app.clone();
		Task::binding(move |resolver| {
			send_to_app(message.clone());
			resolver.resolve(Task::succeed(()));
			None
		})
	}

	/// A task that posts `message` to this manager's `on_self_msg` and succeeds with `()`.
	#[must_use]
	pub fn send_to_self(&self, message: Opaque) -> Task {
		let scheduler = self.scheduler.clone();
		let process = self.process.clone();
		Task::binding(move |resolver| {
			match (scheduler.upgrade(), process.get()) {
				(Some(scheduler), Some(id)) => scheduler.raw_send(id, Opaque::new(ManagerMsg::SelfMsg(message.clone()))),
				_ => warn!("Dropped a self message: the manager is not running."),
			}
			resolver.resolve(Task::succeed(()));
			None
		})
	}
}

/// The task a manager process runs: `init`, then receive and dispatch forever.
pub(crate) fn manager_task(manager: Rc<Manager>, router: Router) -> Task {
	let next = manager_loop(manager.clone(), router);
	manager.init.clone().and_then(move |state| next(state))
}

fn manager_loop(manager: Rc<Manager>, router: Router) -> Callback {
	Rc::new(move |state: Opaque| {
		let next = manager_loop(manager.clone(), router.clone());
		let manager = manager.clone();
		let router = router.clone();
		Task::receive(move |message| match message.get::<ManagerMsg>() {
			ManagerMsg::SelfMsg(message) => {
				trace!("Manager received a self message.");
				(manager.on_self_msg)(&router, message, state.clone())
			}
			ManagerMsg::Effects { commands, subscriptions } => {
				trace!(commands = commands.len(), subscriptions = subscriptions.len(), "Manager received effects.");
				(manager.on_effects)(&router, commands, subscriptions, state.clone())
			}
		})
		.and_then(move |state| next(state))
	})
}
