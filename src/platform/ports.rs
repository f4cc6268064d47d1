//! Named channels between the program and its host, carrying JSON.

use super::{fatal, Cmd, Error, Manager, Router, Runtime, SendToApp, Sub};
use crate::{
	json::{Decoder, Value},
	opaque::{Opaque, Tagger},
	task::Task,
};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Display, Formatter},
	marker::PhantomData,
};
use std::rc::Rc;
use tracing::{instrument, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl Display for SubscriberId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

type Subscriber = (SubscriberId, Rc<dyn Fn(&Value)>);

/// Sends values out of the program.
///
/// Each command is encoded once and handed to every host callback subscribed at that moment.
pub struct OutgoingPort<T> {
	name: Rc<str>,
	subscribers: Rc<RefCell<Rc<Vec<Subscriber>>>>,
	next_id: Cell<u64>,
	_value: PhantomData<fn(T)>,
}

/// Sends values into the program.
pub struct IncomingPort<T> {
	name: Rc<str>,
	decoder: Decoder<T>,
	subscribers: Rc<RefCell<Vec<Tagger>>>,
	runtime: Runtime,
}

impl Runtime {
	/// Defines a port that turns `T`s into JSON for the host.
	///
	/// # Errors
	///
	/// Iff the runtime was already started.
	///
	/// # Panics
	///
	/// Iff a port or manager named `name` exists already.
	pub fn outgoing_port<T: Any>(&self, name: &str, encode: impl Fn(&T) -> Value + 'static) -> Result<OutgoingPort<T>, Error> {
		let subscribers: Rc<RefCell<Rc<Vec<Subscriber>>>> = Rc::default();
		let port_name: Rc<str> = name.into();

		let on_effects = {
			let subscribers = subscribers.clone();
			let port_name = port_name.clone();
			move |_: &Router, commands: Vec<Opaque>, _: Vec<Opaque>, state: Opaque| {
				for command in commands {
					let value = match command.downcast_ref::<T>() {
						Some(value) => encode(value),
						None => {
							warn!(port = &*port_name, found = command.type_name(), "Dropped a command of the wrong type.");
							continue;
						}
					};
					// Subscribers changed by a callback only see later commands.
					let current = subscribers.borrow().clone();
					trace!(port = &*port_name, subscribers = current.len(), "Sending through outgoing port.");
					for (_, callback) in current.iter() {
						callback(&value);
					}
				}
				Task::Succeed(state)
			}
		};
		self.define_manager(name, Manager::new(Task::succeed(()), on_effects).cmd_map(|_, value| value))?;

		Ok(OutgoingPort {
			name: port_name,
			subscribers,
			next_id: Cell::new(0),
			_value: PhantomData,
		})
	}

	/// Defines a port the host can push JSON into, decoded with `decoder`.
	///
	/// # Errors
	///
	/// Iff the runtime was already started.
	///
	/// # Panics
	///
	/// Iff a port or manager named `name` exists already.
	pub fn incoming_port<T: Clone + 'static>(&self, name: &str, decoder: Decoder<T>) -> Result<IncomingPort<T>, Error> {
		let subscribers: Rc<RefCell<Vec<Tagger>>> = Rc::default();

		let on_effects = {
			let subscribers = subscribers.clone();
			move |_: &Router, _: Vec<Opaque>, subscriptions: Vec<Opaque>, state: Opaque| {
				*subscribers.borrow_mut() = subscriptions.iter().map(Opaque::get::<Tagger>).collect();
				Task::Succeed(state)
			}
		};
		let manager = Manager::new(Task::succeed(()), on_effects).sub_map(|tagger, value| {
			let tagger = tagger.clone();
			let last = value.get::<Tagger>();
			let composed: Tagger = Rc::new(move |message: Opaque| tagger(last(message)));
			Opaque::new(composed)
		});
		self.define_manager(name, manager)?;

		Ok(IncomingPort {
			name: name.into(),
			decoder,
			subscribers,
			runtime: self.clone(),
		})
	}
}

impl<T: Any> OutgoingPort<T> {
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// A command that sends `value` through this port.
	pub fn cmd(&self, value: T) -> Cmd {
		Cmd::leaf(&self.name, Opaque::new(value))
	}

	pub fn subscribe(&self, callback: impl Fn(&Value) + 'static) -> SubscriberId {
		let id = SubscriberId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		let mut subscribers = self.subscribers.borrow_mut();
		Rc::make_mut(&mut *subscribers).push((id, Rc::new(callback)));
		id
	}

	/// Safe to call from inside a subscriber, including for itself.
	///
	/// # Errors
	///
	/// Iff `id` is not currently subscribed.
	pub fn unsubscribe(&self, id: SubscriberId) -> Result<(), Error> {
		let mut subscribers = self.subscribers.borrow_mut();
		match subscribers.iter().position(|(existing, _)| *existing == id) {
			Some(index) => {
				Rc::make_mut(&mut *subscribers).remove(index);
				Ok(())
			}
			None => Err(Error::SubscriberNotFound {
				port: self.name.to_string(),
				id,
			}),
		}
	}
}

impl<T: Clone + 'static> IncomingPort<T> {
	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	/// A subscription that turns every value sent into this port into a message.
	pub fn subscribe(&self, tagger: impl Fn(T) -> Opaque + 'static) -> Sub {
		let tagger: Tagger = Rc::new(move |value: Opaque| tagger(value.get::<T>()));
		Sub::leaf(&self.name, Opaque::new(tagger))
	}

	/// Decodes `value` and sends it to the program once per current subscription.
	///
	/// # Errors
	///
	/// Iff the runtime was not started yet.
	///
	/// # Panics
	///
	/// Iff `value` does not decode. Hosts must only send what the port expects.
	#[instrument(skip(self, value), fields(port = &*self.name))]
	pub fn send(&self, value: &Value) -> Result<(), Error> {
		let send_to_app: SendToApp = self.runtime.send_to_app()?;
		let decoded = match self.decoder.decode_value(value) {
			Ok(decoded) => decoded,
			Err(error) => fatal(&Error::PortDecode {
				name: self.name.to_string(),
				error,
			}),
		};
		let subscribers = self.subscribers.borrow().clone();
		for tagger in subscribers {
			send_to_app(tagger(Opaque::new(decoded.clone())));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{json::decode, scheduler::Scheduler};
	use serde_json::json;

	#[test]
	fn outgoing_values_reach_every_subscriber() {
		let runtime = Runtime::new(Scheduler::new());
		let port = runtime.outgoing_port("out", |value: &i64| json!(value)).unwrap();
		runtime.start(Rc::new(|_: Opaque| ())).unwrap();

		let seen = Rc::new(RefCell::new(Vec::new()));
		for label in vec!["first", "second"] {
			let seen = seen.clone();
			port.subscribe(move |value| seen.borrow_mut().push(format!("{} {}", label, value)));
		}
		runtime.enqueue_effects(Cmd::batch(vec![port.cmd(1), port.cmd(2)]), Sub::none());
		assert_eq!(*seen.borrow(), ["first 1", "second 1", "first 2", "second 2"]);
	}

	#[test]
	fn unsubscribing_from_inside_a_callback() {
		let runtime = Runtime::new(Scheduler::new());
		let port = Rc::new(runtime.outgoing_port("out", |value: &i64| json!(value)).unwrap());
		runtime.start(Rc::new(|_: Opaque| ())).unwrap();

		let seen = Rc::new(RefCell::new(Vec::new()));
		let id = Rc::new(Cell::new(None));
		let subscribed = {
			let seen = seen.clone();
			let id = id.clone();
			let weak = Rc::downgrade(&port);
			port.subscribe(move |value| {
				seen.borrow_mut().push(value.clone());
				if let (Some(port), Some(own)) = (weak.upgrade(), id.get()) {
					port.unsubscribe(own).unwrap();
				}
			})
		};
		id.set(Some(subscribed));
		runtime.enqueue_effects(Cmd::batch(vec![port.cmd(1), port.cmd(2)]), Sub::none());
		assert_eq!(*seen.borrow(), [json!(1)]);
		assert!(matches!(
			port.unsubscribe(id.get().unwrap()),
			Err(Error::SubscriberNotFound { .. })
		));
	}

	#[test]
	fn incoming_values_become_messages() {
		let runtime = Runtime::new(Scheduler::new());
		let port = runtime.incoming_port("in", decode::string()).unwrap();
		assert!(matches!(port.send(&json!("early")), Err(Error::NotStarted)));

		let received = Rc::new(RefCell::new(Vec::new()));
		{
			let received = received.clone();
			runtime
				.start(Rc::new(move |message: Opaque| received.borrow_mut().push(message.get::<String>())))
				.unwrap();
		}
		let shout: Tagger = Rc::new(|message: Opaque| Opaque::new(message.get::<String>().to_uppercase()));
		runtime.enqueue_effects(Cmd::none(), port.subscribe(|text| Opaque::new(text + "!")).map(shout));
		port.send(&json!("hi")).unwrap();
		assert_eq!(*received.borrow(), ["HI!"]);
	}

	#[test]
	#[should_panic(expected = "Trying to send an unexpected type of value through port `in`")]
	fn malformed_incoming_values_are_fatal() {
		let runtime = Runtime::new(Scheduler::new());
		let port = runtime.incoming_port("in", decode::int()).unwrap();
		runtime.start(Rc::new(|_: Opaque| ())).unwrap();
		let _ = port.send(&json!("not a number"));
	}
}
