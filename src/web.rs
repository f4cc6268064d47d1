//! [`Dom`] over the browser's DOM, via `web-sys`.
//!
//! Side data (listeners, event nodes) is kept in the [`WebDom`], keyed by an id stored on each
//! node as an expando property.

use crate::{
	json::Value,
	vdom::{Dom, EventNode, Fact, Listener, Node},
};
use core::convert::TryFrom;
use hashbrown::HashMap;
use js_sys::{Reflect, JSON};
use serde_json::{Map, Number};
use std::rc::Rc;
use tracing::{error, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{AddEventListenerOptions, CharacterData, Document, Element, HtmlElement, Text};

const ID_PROPERTY: &str = "__vdomRuntimeId";
const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

struct Registration {
	listener: Rc<Listener>,
	closure: Closure<dyn Fn(web_sys::Event)>,
}

pub struct WebDom {
	document: Document,
	next_id: u32,
	/// By node id, then event name.
	listeners: HashMap<u32, HashMap<String, Registration>>,
	event_nodes: HashMap<u32, Rc<EventNode>>,
}

impl WebDom {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self {
			document,
			next_id: 0,
			listeners: HashMap::new(),
			event_nodes: HashMap::new(),
		}
	}

	/// Uses the document of the current window, if there is one.
	#[must_use]
	pub fn for_window() -> Option<Self> {
		web_sys::window().and_then(|window| window.document()).map(Self::new)
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// The number of listeners currently registered through this [`WebDom`].
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.listeners.values().map(HashMap::len).sum()
	}

	fn unregister(node: &web_sys::Node, event: &str, registration: &Registration) {
		if let Err(error) = node.remove_event_listener_with_callback(event, registration.closure.as_ref().unchecked_ref()) {
			error!("Failed to remove {:?} listener: {:?}", event, error);
		}
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn existing_id(node: &web_sys::Node) -> Option<u32> {
		Reflect::get(node, &JsValue::from_str(ID_PROPERTY))
			.ok()
			.and_then(|id| id.as_f64())
			.map(|id| id as u32)
	}

	fn id(&mut self, node: &web_sys::Node) -> u32 {
		if let Some(id) = Self::existing_id(node) {
			return id;
		}
		let id = self.next_id;
		self.next_id += 1;
		if let Err(error) = Reflect::set(node, &JsValue::from_str(ID_PROPERTY), &JsValue::from(id)) {
			error!("Failed to tag node: {:?}", error);
		}
		id
	}
}

fn as_element(node: &web_sys::Node) -> Option<&Element> {
	let element = node.dyn_ref::<Element>();
	if element.is_none() {
		warn!("Expected an element but found {:?}.", node);
	}
	element
}

/// Converts primitives directly and everything else through JSON.
fn to_value(js: &JsValue) -> Value {
	if let Some(flag) = js.as_bool() {
		Value::Bool(flag)
	} else if let Some(number) = js.as_f64() {
		Number::from_f64(number).map_or(Value::Null, Value::Number)
	} else if let Some(string) = js.as_string() {
		Value::String(string)
	} else if js.is_null() || js.is_undefined() || js.is_function() {
		Value::Null
	} else {
		JSON::stringify(js)
			.ok()
			.and_then(|json| json.as_string())
			.and_then(|json| serde_json::from_str(&json).ok())
			.unwrap_or(Value::Null)
	}
}

fn to_js(value: &Value) -> JsValue {
	match value {
		Value::Null => JsValue::NULL,
		Value::Bool(flag) => JsValue::from_bool(*flag),
		Value::Number(number) => number.as_f64().map_or(JsValue::NULL, JsValue::from_f64),
		Value::String(string) => JsValue::from_str(string),
		Value::Array(_) | Value::Object(_) => JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL),
	}
}

const EVENT_FIELDS: &[&str] = &[
	"type", "key", "code", "keyCode", "which", "button", "buttons", "altKey", "ctrlKey", "metaKey", "shiftKey",
	"clientX", "clientY", "pageX", "pageY", "offsetX", "offsetY", "deltaX", "deltaY", "timeStamp",
];
const TARGET_FIELDS: &[&str] = &["value", "checked", "id", "name", "tagName", "selectedIndex"];

fn snapshot(object: &JsValue, fields: &[&str]) -> Map<String, Value> {
	fields
		.iter()
		.filter_map(|field| {
			let value = Reflect::get(object, &JsValue::from_str(field)).ok()?;
			if value.is_undefined() {
				None
			} else {
				Some(((*field).to_owned(), to_value(&value)))
			}
		})
		.collect()
}

/// The parts of `event` handler decoders can look at.
#[must_use]
pub fn event_to_value(event: &web_sys::Event) -> Value {
	let mut object = snapshot(event, EVENT_FIELDS);
	for target in &["target", "currentTarget"] {
		if let Ok(node) = Reflect::get(event, &JsValue::from_str(target)) {
			if node.is_object() {
				object.insert((*target).to_owned(), Value::Object(snapshot(&node, TARGET_FIELDS)));
			}
		}
	}
	Value::Object(object)
}

impl Dom for WebDom {
	type Handle = web_sys::Node;

	fn create_text(&mut self, text: &str) -> web_sys::Node {
		self.document.create_text_node(text).into()
	}

	fn create_element(&mut self, namespace: Option<&str>, tag: &str) -> web_sys::Node {
		let element = match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag),
			None => self.document.create_element(tag),
		};
		match element {
			Ok(element) => element.into(),
			Err(error) => {
				error!("Failed to create <{}>: {:?}. Rendering an empty text node instead.", tag, error);
				self.document.create_text_node("").into()
			}
		}
	}

	fn replace_text(&mut self, node: &web_sys::Node, text: &str) {
		match node.dyn_ref::<CharacterData>() {
			Some(data) => data.set_data(text),
			None => error!("Expected to update text but found {:?}.", node),
		}
	}

	fn parent(&self, node: &web_sys::Node) -> Option<web_sys::Node> {
		node.parent_node()
	}

	fn child(&self, parent: &web_sys::Node, index: usize) -> Option<web_sys::Node> {
		u32::try_from(index).ok().and_then(|index| parent.child_nodes().item(index))
	}

	fn insert_before(&mut self, parent: &web_sys::Node, child: &web_sys::Node, reference: Option<&web_sys::Node>) {
		if let Err(error) = parent.insert_before(child, reference) {
			error!("Failed to insert node: {:?}", error);
		}
	}

	fn remove_child(&mut self, parent: &web_sys::Node, child: &web_sys::Node) {
		if let Err(error) = parent.remove_child(child) {
			error!("Failed to remove the node: {:?}", error);
		}
	}

	fn replace_child(&mut self, parent: &web_sys::Node, new: &web_sys::Node, old: &web_sys::Node) {
		if let Err(error) = parent.replace_child(new, old) {
			error!("Failed to replace the node: {:?}", error);
		}
	}

	fn append_children(&mut self, parent: &web_sys::Node, children: &[web_sys::Node]) {
		let fragment = self.document.create_document_fragment();
		for child in children {
			if let Err(error) = fragment.append_child(child) {
				error!("Failed to collect node: {:?}", error);
			}
		}
		if let Err(error) = parent.append_child(&fragment) {
			error!("Failed to append nodes: {:?}", error);
		}
	}

	fn property(&self, node: &web_sys::Node, key: &str) -> Option<Value> {
		match Reflect::get(node, &JsValue::from_str(key)) {
			Ok(value) if !value.is_undefined() => Some(to_value(&value)),
			_ => None,
		}
	}

	fn set_property(&mut self, node: &web_sys::Node, key: &str, value: &Value) {
		if let Err(error) = Reflect::set(node, &JsValue::from_str(key), &to_js(value)) {
			error!("Failed to set property {:?}: {:?}", key, error);
		}
	}

	fn set_style(&mut self, node: &web_sys::Node, key: &str, value: &str) {
		let style = match node.dyn_ref::<HtmlElement>() {
			Some(element) => element.style(),
			None => return warn!("Can't style {:?}.", node),
		};
		let result = if value.is_empty() {
			style.remove_property(key).map(drop)
		} else {
			style.set_property(key, value)
		};
		if let Err(error) = result {
			error!("Failed to set style {:?}: {:?}", key, error);
		}
	}

	fn set_attribute(&mut self, node: &web_sys::Node, key: &str, value: &str) {
		if let Some(element) = as_element(node) {
			if let Err(error) = element.set_attribute(key, value) {
				error!("Failed to set attribute {:?}: {:?}", key, error);
			}
		}
	}

	fn remove_attribute(&mut self, node: &web_sys::Node, key: &str) {
		if let Some(element) = as_element(node) {
			if let Err(error) = element.remove_attribute(key) {
				error!("Failed to remove attribute {:?}: {:?}", key, error);
			}
		}
	}

	fn set_attribute_ns(&mut self, node: &web_sys::Node, namespace: &str, key: &str, value: &str) {
		if let Some(element) = as_element(node) {
			if let Err(error) = element.set_attribute_ns(Some(namespace), key, value) {
				error!("Failed to set attribute {:?}: {:?}", key, error);
			}
		}
	}

	fn remove_attribute_ns(&mut self, node: &web_sys::Node, namespace: &str, key: &str) {
		if let Some(element) = as_element(node) {
			if let Err(error) = element.remove_attribute_ns(Some(namespace), key) {
				error!("Failed to remove attribute {:?}: {:?}", key, error);
			}
		}
	}

	fn add_listener(&mut self, node: &web_sys::Node, event: &str, listener: Rc<Listener>, passive: bool) {
		self.remove_listener(node, event);

		let handler = listener.clone();
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			if let Some(outcome) = handler.handle(&event_to_value(&event)) {
				if outcome.stop_propagation {
					event.stop_propagation();
				}
				if outcome.prevent_default {
					event.prevent_default();
				}
			}
		}) as Box<dyn Fn(web_sys::Event)>);

		let mut options = AddEventListenerOptions::new();
		options.passive(passive);
		if let Err(error) =
			node.add_event_listener_with_callback_and_add_event_listener_options(event, closure.as_ref().unchecked_ref(), &options)
		{
			return error!("Failed to add {:?} listener: {:?}", event, error);
		}
		trace!(event, passive, "Added listener.");

		let id = self.id(node);
		self.listeners
			.entry(id)
			.or_default()
			.insert(event.to_owned(), Registration { listener, closure });
	}

	fn remove_listener(&mut self, node: &web_sys::Node, event: &str) {
		let registration = Self::existing_id(node)
			.and_then(|id| self.listeners.get_mut(&id))
			.and_then(|registrations| registrations.remove(event));
		if let Some(registration) = registration {
			Self::unregister(node, event, &registration);
		}
	}

	fn listener(&self, node: &web_sys::Node, event: &str) -> Option<Rc<Listener>> {
		let id = Self::existing_id(node)?;
		self.listeners
			.get(&id)?
			.get(event)
			.map(|registration| registration.listener.clone())
	}

	fn event_node(&self, node: &web_sys::Node) -> Option<Rc<EventNode>> {
		let id = Self::existing_id(node)?;
		self.event_nodes.get(&id).cloned()
	}

	fn set_event_node(&mut self, node: &web_sys::Node, event_node: Rc<EventNode>) {
		let id = self.id(node);
		self.event_nodes.insert(id, event_node);
	}

	fn release(&mut self, node: &web_sys::Node) {
		let mut pending = vec![node.clone()];
		while let Some(node) = pending.pop() {
			if let Some(id) = Self::existing_id(&node) {
				for (event, registration) in self.listeners.remove(&id).into_iter().flatten() {
					Self::unregister(&node, &event, &registration);
				}
				self.event_nodes.remove(&id);
			}
			let children = node.child_nodes();
			pending.extend((0..children.length()).filter_map(|index| children.item(index)));
		}
		trace!("Released a subtree.");
	}
}

/// Reads an existing DOM subtree back as a virtual node, so a program can adopt server-rendered
/// markup instead of replacing it.
///
/// Attributes become plain attribute facts. Nodes other than elements and text become empty text.
#[must_use]
pub fn virtualize(node: &web_sys::Node) -> Node {
	if let Some(text) = node.dyn_ref::<Text>() {
		return Node::text(text.data());
	}

	let element = match node.dyn_ref::<Element>() {
		Some(element) => element,
		None => return Node::text(""),
	};

	let attributes = element.attributes();
	let facts = (0..attributes.length())
		.filter_map(|i| attributes.item(i))
		.map(|attribute| match attribute.namespace_uri() {
			Some(namespace) => Fact::attribute_ns(namespace, attribute.name(), attribute.value()),
			None => Fact::attribute(attribute.name(), attribute.value()),
		})
		.collect();

	let child_nodes = node.child_nodes();
	let children = (0..child_nodes.length())
		.filter_map(|i| child_nodes.item(i))
		.map(|child| virtualize(&child))
		.collect();

	let tag = element.local_name();
	match element.namespace_uri() {
		Some(namespace) if namespace != XHTML_NAMESPACE => Node::element_ns(Some(namespace), tag, facts, children),
		_ => Node::element(tag.to_lowercase(), facts, children),
	}
}
