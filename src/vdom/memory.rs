//! A headless [`Dom`] for tests and non-browser hosts.

use super::dom::{Dom, EventNode, EventOutcome, Listener};
use crate::json::Value;
use core::{cell::RefCell, fmt::Write};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

enum Content {
	Text(String),
	Element { namespace: Option<String>, tag: String },
}

struct MemoryNode {
	content: Content,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	attributes: HashMap<String, String>,
	attributes_ns: HashMap<(String, String), String>,
	properties: HashMap<String, Value>,
	styles: HashMap<String, String>,
	listeners: HashMap<String, (Rc<Listener>, bool)>,
	event_node: Option<Rc<EventNode>>,
}

/// An arena of nodes. Released nodes lose their listeners and event nodes but keep their slot.
#[derive(Default)]
pub struct MemoryDom {
	nodes: Vec<MemoryNode>,
}

impl MemoryDom {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// The number of nodes created so far.
	#[must_use]
	pub fn created(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> &[NodeId] {
		&self.nodes[node.0].children
	}

	#[must_use]
	pub fn attribute(&self, node: NodeId, key: &str) -> Option<&str> {
		self.nodes[node.0].attributes.get(key).map(String::as_str)
	}

	#[must_use]
	pub fn style(&self, node: NodeId, key: &str) -> Option<&str> {
		self.nodes[node.0].styles.get(key).map(String::as_str)
	}

	/// The number of listeners registered on nodes that have not been released.
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.nodes.iter().map(|node| node.listeners.len()).sum()
	}

	#[must_use]
	pub fn is_passive(&self, node: NodeId, event: &str) -> Option<bool> {
		self.nodes[node.0].listeners.get(event).map(|(_, passive)| *passive)
	}

	/// Stands in for the host writing a property, as an `<input>` does while the user types.
	pub fn poke_property(&mut self, node: NodeId, key: &str, value: Value) {
		self.nodes[node.0].properties.insert(key.to_owned(), value);
	}

	/// Serialises `node` as markup with sorted attributes, for comparing trees.
	///
	/// Properties appear as `.key=json`, styles as one sorted `style` attribute and listeners as
	/// `@event`.
	#[must_use]
	pub fn to_markup(&self, node: NodeId) -> String {
		let mut markup = String::new();
		self.write_markup(node, &mut markup);
		markup
	}

	fn write_markup(&self, node: NodeId, markup: &mut String) {
		let data = &self.nodes[node.0];
		match &data.content {
			Content::Text(text) => markup.push_str(text),
			Content::Element { namespace, tag } => {
				markup.push('<');
				if let Some(namespace) = namespace {
					let _ = write!(markup, "{{{}}}", namespace);
				}
				markup.push_str(tag);

				let mut attributes: Vec<String> = data.attributes.iter().map(|(key, value)| format!("{}={:?}", key, value)).collect();
				attributes.extend(
					data.attributes_ns
						.iter()
						.map(|((namespace, key), value)| format!("{}:{}={:?}", namespace, key, value)),
				);
				attributes.extend(data.properties.iter().map(|(key, value)| format!(".{}={}", key, value)));
				attributes.extend(data.listeners.keys().map(|event| format!("@{}", event)));
				if !data.styles.is_empty() {
					let mut styles: Vec<String> = data.styles.iter().map(|(key, value)| format!("{}:{}", key, value)).collect();
					styles.sort();
					attributes.push(format!("style={:?}", styles.join(";")));
				}
				attributes.sort();
				for attribute in attributes {
					markup.push(' ');
					markup.push_str(&attribute);
				}

				markup.push('>');
				for child in &data.children {
					self.write_markup(*child, markup);
				}
				let _ = write!(markup, "</{}>", tag);
			}
		}
	}

	fn push(&mut self, content: Content) -> NodeId {
		self.nodes.push(MemoryNode {
			content,
			parent: None,
			children: Vec::new(),
			attributes: HashMap::new(),
			attributes_ns: HashMap::new(),
			properties: HashMap::new(),
			styles: HashMap::new(),
			listeners: HashMap::new(),
			event_node: None,
		});
		NodeId(self.nodes.len() - 1)
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.nodes[node.0].parent.take() {
			self.nodes[parent.0].children.retain(|child| *child != node);
		}
	}
}

/// Fires `event` at `node` with `payload` as the event object.
///
/// The borrow of `dom` is released before the listener runs, so the program may redraw into
/// the same `dom`.
pub fn dispatch_event(dom: &RefCell<MemoryDom>, node: NodeId, event: &str, payload: &Value) -> Option<EventOutcome> {
	let listener = dom.borrow().listener(&node, event);
	match listener {
		Some(listener) => listener.handle(payload),
		None => {
			warn!(event, "No listener registered.");
			None
		}
	}
}

impl Dom for MemoryDom {
	type Handle = NodeId;

	fn create_text(&mut self, text: &str) -> NodeId {
		self.push(Content::Text(text.to_owned()))
	}

	fn create_element(&mut self, namespace: Option<&str>, tag: &str) -> NodeId {
		self.push(Content::Element {
			namespace: namespace.map(str::to_owned),
			tag: tag.to_owned(),
		})
	}

	fn replace_text(&mut self, node: &NodeId, text: &str) {
		match &mut self.nodes[node.0].content {
			Content::Text(existing) => *existing = text.to_owned(),
			Content::Element { tag, .. } => warn!(tag = tag.as_str(), "Expected a text node."),
		}
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.nodes[node.0].parent
	}

	fn child(&self, parent: &NodeId, index: usize) -> Option<NodeId> {
		self.nodes[parent.0].children.get(index).copied()
	}

	fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) {
		self.detach(*child);
		let children = &mut self.nodes[parent.0].children;
		let position = reference
			.and_then(|reference| children.iter().position(|existing| existing == reference))
			.unwrap_or_else(|| children.len());
		children.insert(position, *child);
		self.nodes[child.0].parent = Some(*parent);
	}

	fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
		if self.nodes[child.0].parent == Some(*parent) {
			self.detach(*child);
		} else {
			warn!(?parent, ?child, "Not a child.");
		}
	}

	fn replace_child(&mut self, parent: &NodeId, new: &NodeId, old: &NodeId) {
		self.insert_before(parent, new, Some(old));
		self.remove_child(parent, old);
	}

	fn property(&self, node: &NodeId, key: &str) -> Option<Value> {
		self.nodes[node.0].properties.get(key).cloned()
	}

	fn set_property(&mut self, node: &NodeId, key: &str, value: &Value) {
		self.nodes[node.0].properties.insert(key.to_owned(), value.clone());
	}

	fn set_style(&mut self, node: &NodeId, key: &str, value: &str) {
		let styles = &mut self.nodes[node.0].styles;
		if value.is_empty() {
			styles.remove(key);
		} else {
			styles.insert(key.to_owned(), value.to_owned());
		}
	}

	fn set_attribute(&mut self, node: &NodeId, key: &str, value: &str) {
		self.nodes[node.0].attributes.insert(key.to_owned(), value.to_owned());
	}

	fn remove_attribute(&mut self, node: &NodeId, key: &str) {
		self.nodes[node.0].attributes.remove(key);
	}

	fn set_attribute_ns(&mut self, node: &NodeId, namespace: &str, key: &str, value: &str) {
		self.nodes[node.0]
			.attributes_ns
			.insert((namespace.to_owned(), key.to_owned()), value.to_owned());
	}

	fn remove_attribute_ns(&mut self, node: &NodeId, namespace: &str, key: &str) {
		self.nodes[node.0].attributes_ns.remove(&(namespace.to_owned(), key.to_owned()));
	}

	fn add_listener(&mut self, node: &NodeId, event: &str, listener: Rc<Listener>, passive: bool) {
		self.nodes[node.0].listeners.insert(event.to_owned(), (listener, passive));
	}

	fn remove_listener(&mut self, node: &NodeId, event: &str) {
		self.nodes[node.0].listeners.remove(event);
	}

	fn listener(&self, node: &NodeId, event: &str) -> Option<Rc<Listener>> {
		self.nodes[node.0].listeners.get(event).map(|(listener, _)| listener.clone())
	}

	fn event_node(&self, node: &NodeId) -> Option<Rc<EventNode>> {
		self.nodes[node.0].event_node.clone()
	}

	fn set_event_node(&mut self, node: &NodeId, event_node: Rc<EventNode>) {
		self.nodes[node.0].event_node = Some(event_node);
	}

	fn release(&mut self, node: &NodeId) {
		let mut pending = vec![*node];
		while let Some(node) = pending.pop() {
			let data = &mut self.nodes[node.0];
			data.listeners.clear();
			data.event_node = None;
			pending.extend_from_slice(&data.children);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{json::decode, opaque::Opaque, vdom::Handler};

	#[test]
	fn inserting_an_attached_node_moves_it() {
		let mut dom = MemoryDom::new();
		let root = dom.create_element(None, "ul");
		let a = dom.create_text("a");
		let b = dom.create_text("b");
		dom.append_child(&root, &a);
		dom.append_child(&root, &b);
		dom.insert_before(&root, &b, Some(&a));
		assert_eq!(dom.children(root), &[b, a]);
		assert_eq!(dom.to_markup(root), "<ul>ba</ul>");
	}

	#[test]
	fn markup_is_sorted() {
		let mut dom = MemoryDom::new();
		let node = dom.create_element(None, "p");
		dom.set_attribute(&node, "z", "1");
		dom.set_attribute(&node, "a", "2");
		dom.set_style(&node, "color", "red");
		dom.set_style(&node, "margin", "0");
		dom.set_style(&node, "margin", "");
		assert_eq!(dom.to_markup(node), r#"<p a="2" style="color:red" z="1"></p>"#);
	}

	#[test]
	fn release_clears_the_subtree() {
		let mut dom = MemoryDom::new();
		let root = dom.create_element(None, "div");
		let button = dom.create_element(None, "button");
		dom.append_child(&root, &button);
		let listener = Listener::new(
			Handler::Normal(decode::succeed(Opaque::unit())),
			EventNode::root(Rc::new(|_: Opaque| ())),
		);
		dom.add_listener(&button, "click", listener, false);
		assert_eq!(dom.listener_count(), 1);

		dom.release(&root);
		assert_eq!(dom.listener_count(), 0);
		assert!(dom.event_node(&button).is_none());
	}
}
