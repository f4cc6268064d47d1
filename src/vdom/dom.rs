//! The host tree the patches are applied to, and event dispatch back into the program.

use super::node::{CustomHandling, Handler};
use crate::{
	json::Value,
	opaque::{Opaque, Tagger},
	platform::SendToApp,
};
use core::{cell::RefCell, fmt::Debug};
use std::rc::Rc;
use tracing::{trace, trace_span};

/// A mutable, DOM-like tree of host nodes.
///
/// Handles are cheap references to host nodes. Implementations must treat inserting an
/// already-attached node as a move.
pub trait Dom: 'static {
	type Handle: Clone + PartialEq + Debug + 'static;

	fn create_text(&mut self, text: &str) -> Self::Handle;
	fn create_element(&mut self, namespace: Option<&str>, tag: &str) -> Self::Handle;
	fn replace_text(&mut self, node: &Self::Handle, text: &str);

	fn parent(&self, node: &Self::Handle) -> Option<Self::Handle>;
	fn child(&self, parent: &Self::Handle, index: usize) -> Option<Self::Handle>;

	/// Inserts `child` before `reference`, or at the end iff `reference` is `None`.
	fn insert_before(&mut self, parent: &Self::Handle, child: &Self::Handle, reference: Option<&Self::Handle>);
	fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle);
	fn replace_child(&mut self, parent: &Self::Handle, new: &Self::Handle, old: &Self::Handle);

	fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle) {
		self.insert_before(parent, child, None);
	}

	/// Appends `children` in order. Hosts may override this to batch the insertion.
	fn append_children(&mut self, parent: &Self::Handle, children: &[Self::Handle]) {
		for child in children {
			self.append_child(parent, child);
		}
	}

	fn property(&self, node: &Self::Handle, key: &str) -> Option<Value>;
	fn set_property(&mut self, node: &Self::Handle, key: &str, value: &Value);
	/// An empty `value` removes the style.
	fn set_style(&mut self, node: &Self::Handle, key: &str, value: &str);
	fn set_attribute(&mut self, node: &Self::Handle, key: &str, value: &str);
	fn remove_attribute(&mut self, node: &Self::Handle, key: &str);
	fn set_attribute_ns(&mut self, node: &Self::Handle, namespace: &str, key: &str, value: &str);
	fn remove_attribute_ns(&mut self, node: &Self::Handle, namespace: &str, key: &str);

	/// Registers `listener` as the one listener for `event` on `node`.
	fn add_listener(&mut self, node: &Self::Handle, event: &str, listener: Rc<Listener>, passive: bool);
	fn remove_listener(&mut self, node: &Self::Handle, event: &str);
	fn listener(&self, node: &Self::Handle, event: &str) -> Option<Rc<Listener>>;

	/// The event node attached to `node` by a mapped virtual node, if any.
	fn event_node(&self, node: &Self::Handle) -> Option<Rc<EventNode>>;
	fn set_event_node(&mut self, node: &Self::Handle, event_node: Rc<EventNode>);

	/// Called once `node` and its subtree have left the tree for good, but not for nodes that
	/// are only being moved. Hosts drop any side data they keep for the subtree.
	fn release(&mut self, _node: &Self::Handle) {}
}

/// A link in the chain that carries messages from a listener up to the program.
pub enum EventNode {
	Root(SendToApp),
	Tagged {
		/// Outermost first.
		taggers: RefCell<Vec<Tagger>>,
		parent: Rc<EventNode>,
	},
}

impl EventNode {
	#[must_use]
	pub fn root(send_to_app: SendToApp) -> Rc<Self> {
		Rc::new(EventNode::Root(send_to_app))
	}

	#[must_use]
	pub fn tagged(taggers: Vec<Tagger>, parent: Rc<EventNode>) -> Rc<Self> {
		Rc::new(EventNode::Tagged {
			taggers: RefCell::new(taggers),
			parent,
		})
	}

	/// Runs `message` through every tagger up the chain (innermost first) and hands it to the
	/// program.
	pub fn dispatch(&self, message: Opaque) {
		let mut message = message;
		let mut current = self;
		loop {
			match current {
				EventNode::Tagged { taggers, parent } => {
					let taggers = taggers.borrow().clone();
					for tagger in taggers.iter().rev() {
						message = tagger(message);
					}
					current = &**parent;
				}
				EventNode::Root(send_to_app) => return send_to_app(message),
			}
		}
	}
}

/// What the host should do with the native event after a listener ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventOutcome {
	pub stop_propagation: bool,
	pub prevent_default: bool,
}

/// The host-independent part of an event listener.
pub struct Listener {
	handler: RefCell<Handler>,
	event_node: Rc<EventNode>,
}

impl Listener {
	#[must_use]
	pub fn new(handler: Handler, event_node: Rc<EventNode>) -> Rc<Self> {
		Rc::new(Self {
			handler: RefCell::new(handler),
			event_node,
		})
	}

	#[must_use]
	pub fn handler(&self) -> Handler {
		self.handler.borrow().clone()
	}

	/// Swaps the handler without re-registering with the host.
	pub fn replace_handler(&self, handler: Handler) {
		*self.handler.borrow_mut() = handler;
	}

	/// Decodes `event` and sends the resulting message.
	///
	/// Returns `None` iff the event did not decode, in which case it is ignored.
	pub fn handle(&self, event: &Value) -> Option<EventOutcome> {
		let handler = self.handler();
		let span = trace_span!("Listener::handle", kind = handler.kind());
		let _enter = span.enter();

		let decoded = match &handler {
			Handler::Normal(decoder) => decoder.decode_value(event).map(|message| (message, EventOutcome::default())),
			Handler::MayStopPropagation(decoder) => decoder.decode_value(event).map(|(message, stop_propagation)| {
				(
					message,
					EventOutcome {
						stop_propagation,
						prevent_default: false,
					},
				)
			}),
			Handler::MayPreventDefault(decoder) => decoder.decode_value(event).map(|(message, prevent_default)| {
				(
					message,
					EventOutcome {
						stop_propagation: false,
						prevent_default,
					},
				)
			}),
			Handler::Custom(decoder) => decoder.decode_value(event).map(|handling: CustomHandling| {
				(
					handling.message,
					EventOutcome {
						stop_propagation: handling.stop_propagation,
						prevent_default: handling.prevent_default,
					},
				)
			}),
		};

		match decoded {
			Ok((message, outcome)) => {
				self.event_node.dispatch(message);
				Some(outcome)
			}
			Err(error) => {
				trace!(%error, "Ignored event that failed to decode.");
				None
			}
		}
	}
}
