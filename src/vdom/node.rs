//! The virtual node tree.

use crate::{
	json::{
		decode::{self, Decoder},
		Value,
	},
	opaque::{same_rc, Opaque, Tagger},
};
use core::{
	any::Any,
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::Rc;

use super::dom::Dom;

/// A cheaply clonable, immutable virtual node.
///
/// Clones share identity, which [`diff`](super::diff::diff) uses to skip unchanged subtrees.
#[derive(Clone)]
pub struct Node(Rc<NodeKind>);

pub enum NodeKind {
	Text(String),
	Element {
		tag: String,
		namespace: Option<String>,
		facts: Rc<Facts>,
		children: Vec<Node>,
		descendants: usize,
	},
	Keyed {
		tag: String,
		namespace: Option<String>,
		facts: Rc<Facts>,
		children: Vec<(String, Node)>,
		descendants: usize,
	},
	Custom {
		facts: Rc<Facts>,
		model: Opaque,
		/// A `Widget<D>` for the [`Dom`] this node is rendered into.
		widget: Rc<dyn Any>,
		diff: Rc<dyn Fn(&Opaque, &Opaque) -> Option<Opaque>>,
	},
	Mapped {
		tagger: Tagger,
		inner: Node,
		descendants: usize,
	},
	Lazy {
		refs: Vec<LazyRef>,
		thunk: Rc<dyn Fn() -> Node>,
		cached: RefCell<Option<Node>>,
	},
}

/// An argument of a lazy node, compared by identity.
#[derive(Clone)]
pub enum LazyRef {
	Function(usize),
	Shared(Rc<dyn Any>),
}

impl PartialEq for LazyRef {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(LazyRef::Function(a), LazyRef::Function(b)) => a == b,
			(LazyRef::Shared(a), LazyRef::Shared(b)) => same_rc(a, b),
			_ => false,
		}
	}
}

/// Host-specific rendering for [`Node::custom`].
pub struct Widget<D: Dom> {
	pub render: Rc<dyn Fn(&mut D, &Opaque) -> D::Handle>,
	/// Returns a patch iff the host node needs updating.
	pub diff: Rc<dyn Fn(&Opaque, &Opaque) -> Option<Opaque>>,
	/// Applies a patch returned by `diff`, returning the (possibly replaced) host node.
	pub apply: Rc<dyn Fn(&mut D, &D::Handle, &Opaque) -> D::Handle>,
}

fn sanitize_tag(tag: String) -> String {
	if tag == "script" {
		"p".to_owned()
	} else {
		tag
	}
}

impl Node {
	pub fn text(text: impl Into<String>) -> Self {
		Self(Rc::new(NodeKind::Text(text.into())))
	}

	pub fn element(tag: impl Into<String>, facts: Vec<Fact>, children: Vec<Node>) -> Self {
		Self::element_ns(None, tag, facts, children)
	}

	pub fn element_ns(namespace: Option<String>, tag: impl Into<String>, facts: Vec<Fact>, children: Vec<Node>) -> Self {
		let descendants = children.iter().map(|child| child.descendants() + 1).sum();
		Self(Rc::new(NodeKind::Element {
			tag: sanitize_tag(tag.into()),
			namespace,
			facts: Rc::new(Facts::organize(facts)),
			children,
			descendants,
		}))
	}

	pub fn keyed(tag: impl Into<String>, facts: Vec<Fact>, children: Vec<(String, Node)>) -> Self {
		Self::keyed_ns(None, tag, facts, children)
	}

	pub fn keyed_ns(
		namespace: Option<String>,
		tag: impl Into<String>,
		facts: Vec<Fact>,
		children: Vec<(String, Node)>,
	) -> Self {
		let descendants = children.iter().map(|(_, child)| child.descendants() + 1).sum();
		Self(Rc::new(NodeKind::Keyed {
			tag: sanitize_tag(tag.into()),
			namespace,
			facts: Rc::new(Facts::organize(facts)),
			children,
			descendants,
		}))
	}

	/// A node rendered and patched by `widget`. Two custom nodes are only diffed against each
	/// other if they share the same `widget`.
	pub fn custom<D: Dom>(facts: Vec<Fact>, model: Opaque, widget: &Rc<Widget<D>>) -> Self {
		let diff = widget.diff.clone();
		let widget: Rc<dyn Any> = widget.clone();
		Self(Rc::new(NodeKind::Custom {
			facts: Rc::new(Facts::organize(facts)),
			model,
			widget,
			diff,
		}))
	}

	/// Wraps this node so that messages produced inside it pass through `tagger`.
	#[must_use]
	pub fn map(self, tagger: Tagger) -> Self {
		let descendants = self.descendants() + 1;
		Self(Rc::new(NodeKind::Mapped {
			tagger,
			inner: self,
			descendants,
		}))
	}

	/// A node that is only recomputed when one of `refs` changes identity.
	pub fn thunk(refs: Vec<LazyRef>, thunk: impl Fn() -> Node + 'static) -> Self {
		Self(Rc::new(NodeKind::Lazy {
			refs,
			thunk: Rc::new(thunk),
			cached: RefCell::new(None),
		}))
	}

	pub fn lazy<A: 'static>(view: fn(&A) -> Node, a: Rc<A>) -> Self {
		let refs = vec![LazyRef::Function(view as usize), LazyRef::Shared(a.clone())];
		Self::thunk(refs, move || view(&a))
	}

	pub fn lazy2<A: 'static, B: 'static>(view: fn(&A, &B) -> Node, a: Rc<A>, b: Rc<B>) -> Self {
		let refs = vec![
			LazyRef::Function(view as usize),
			LazyRef::Shared(a.clone()),
			LazyRef::Shared(b.clone()),
		];
		Self::thunk(refs, move || view(&a, &b))
	}

	#[must_use]
	pub fn kind(&self) -> &NodeKind {
		&self.0
	}

	/// The number of nodes below this one in pre-order numbering.
	///
	/// Lazy, text and custom nodes count as leaves.
	#[must_use]
	pub fn descendants(&self) -> usize {
		match &*self.0 {
			NodeKind::Element { descendants, .. }
			| NodeKind::Keyed { descendants, .. }
			| NodeKind::Mapped { descendants, .. } => *descendants,
			NodeKind::Text(_) | NodeKind::Custom { .. } | NodeKind::Lazy { .. } => 0,
		}
	}

	#[must_use]
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	/// For lazy nodes, returns the cached node, computing it first if necessary.
	///
	/// Other nodes are returned as they are.
	#[must_use]
	pub fn force(&self) -> Node {
		match &*self.0 {
			NodeKind::Lazy { thunk, cached, .. } => {
				let existing = cached.borrow().clone();
				match existing {
					Some(node) => node,
					None => {
						let node = thunk();
						*cached.borrow_mut() = Some(node.clone());
						node
					}
				}
			}
			_ => self.clone(),
		}
	}

	pub(crate) fn reuse_cache_of(&self, previous: &Node) {
		if let (NodeKind::Lazy { cached, .. }, NodeKind::Lazy { cached: previous, .. }) = (&*self.0, &*previous.0) {
			let node = previous.borrow().clone();
			*cached.borrow_mut() = node;
		}
	}

	/// Drops the keys of a keyed element. Other nodes are returned as they are.
	#[must_use]
	pub fn dekey(&self) -> Node {
		match &*self.0 {
			NodeKind::Keyed {
				tag,
				namespace,
				facts,
				children,
				descendants,
			} => Self(Rc::new(NodeKind::Element {
				tag: tag.clone(),
				namespace: namespace.clone(),
				facts: facts.clone(),
				children: children.iter().map(|(_, child)| child.clone()).collect(),
				descendants: *descendants,
			})),
			_ => self.clone(),
		}
	}
}

impl Debug for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &*self.0 {
			NodeKind::Text(text) => f.debug_tuple("Text").field(text).finish(),
			NodeKind::Element { tag, children, .. } => f.debug_struct("Element").field("tag", tag).field("children", children).finish(),
			NodeKind::Keyed { tag, children, .. } => f.debug_struct("Keyed").field("tag", tag).field("children", children).finish(),
			NodeKind::Custom { model, .. } => f.debug_struct("Custom").field("model", model).finish(),
			NodeKind::Mapped { inner, .. } => f.debug_tuple("Mapped").field(inner).finish(),
			NodeKind::Lazy { cached, .. } => f.debug_struct("Lazy").field("cached", &cached.borrow()).finish(),
		}
	}
}

/// What an event listener does with a decoded event.
#[derive(Clone, PartialEq, Debug)]
pub enum Handler {
	Normal(Decoder<Opaque>),
	MayStopPropagation(Decoder<(Opaque, bool)>),
	MayPreventDefault(Decoder<(Opaque, bool)>),
	Custom(Decoder<CustomHandling>),
}

#[derive(Clone, Debug)]
pub struct CustomHandling {
	pub message: Opaque,
	pub stop_propagation: bool,
	pub prevent_default: bool,
}

fn tag_message(tagger: Tagger, message: Opaque) -> Opaque {
	tagger(message)
}

fn tag_pair(tagger: Tagger, (message, flag): (Opaque, bool)) -> (Opaque, bool) {
	(tagger(message), flag)
}

fn tag_custom(tagger: Tagger, handling: CustomHandling) -> CustomHandling {
	CustomHandling {
		message: tagger(handling.message),
		..handling
	}
}

impl Handler {
	/// Numbered in the order the host's passive-listener decision relies on.
	#[must_use]
	pub fn kind(&self) -> u8 {
		match self {
			Handler::Normal(_) => 0,
			Handler::MayStopPropagation(_) => 1,
			Handler::MayPreventDefault(_) => 2,
			Handler::Custom(_) => 3,
		}
	}

	/// Listeners that can never call `preventDefault` are registered as passive.
	#[must_use]
	pub fn is_passive(&self) -> bool {
		self.kind() < 2
	}

	/// Maps the produced message through `tagger`.
	///
	/// Mapping the same handler with the same `tagger` twice gives equal handlers.
	#[must_use]
	pub fn map(&self, tagger: &Tagger) -> Self {
		let tagger = decode::succeed_shared(tagger.clone());
		match self {
			Handler::Normal(decoder) => Handler::Normal(decode::map2(tag_message, &tagger, decoder)),
			Handler::MayStopPropagation(decoder) => Handler::MayStopPropagation(decode::map2(tag_pair, &tagger, decoder)),
			Handler::MayPreventDefault(decoder) => Handler::MayPreventDefault(decode::map2(tag_pair, &tagger, decoder)),
			Handler::Custom(decoder) => Handler::Custom(decode::map2(tag_custom, &tagger, decoder)),
		}
	}
}

/// A single attribute, property, style or event declaration.
#[derive(Clone, Debug)]
pub enum Fact {
	Event(String, Handler),
	Style(String, String),
	Property(String, Value),
	Attribute(String, String),
	AttributeNs { namespace: String, key: String, value: String },
}

impl Fact {
	pub fn on(event: impl Into<String>, handler: Handler) -> Self {
		Fact::Event(event.into(), handler)
	}

	pub fn style(key: impl Into<String>, value: impl Into<String>) -> Self {
		Fact::Style(key.into(), value.into())
	}

	/// `innerHTML` and `formAction` are renamed with a `data-` prefix.
	pub fn property(key: impl Into<String>, value: Value) -> Self {
		let key = key.into();
		let key = if key == "innerHTML" || key == "formAction" {
			format!("data-{}", key)
		} else {
			key
		};
		Fact::Property(key, value)
	}

	/// Event handler attributes (`on…`) and `formAction` are renamed with a `data-` prefix.
	pub fn attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
		let key = key.into();
		let lower = key.to_ascii_lowercase();
		let key = if lower.starts_with("on") || lower == "formaction" {
			format!("data-{}", key)
		} else {
			key
		};
		Fact::Attribute(key, value.into())
	}

	/// Like [`Fact::attribute`], but blanks `javascript:` URLs.
	pub fn attribute_url(key: impl Into<String>, url: impl Into<String>) -> Self {
		let url = url.into();
		let compact: String = url.chars().filter(|c| !c.is_whitespace()).collect();
		let is_script = compact.get(..11).map_or(false, |scheme| scheme.eq_ignore_ascii_case("javascript:"));
		Self::attribute(key, if is_script { String::new() } else { url })
	}

	pub fn attribute_ns(namespace: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
		Fact::AttributeNs {
			namespace: namespace.into(),
			key: key.into(),
			value: value.into(),
		}
	}

	/// Only event facts are affected.
	#[must_use]
	pub fn map(self, tagger: &Tagger) -> Self {
		match self {
			Fact::Event(name, handler) => Fact::Event(name, handler.map(tagger)),
			other => other,
		}
	}
}

/// The facts of one element, by category.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Facts {
	pub events: HashMap<String, Handler>,
	pub styles: HashMap<String, String>,
	pub properties: HashMap<String, Value>,
	pub attributes: HashMap<String, String>,
	/// Namespace and value per key.
	pub attributes_ns: HashMap<String, (String, String)>,
}

fn add_class(existing: Option<&str>, class: String) -> String {
	match existing {
		Some(existing) => format!("{} {}", existing, class),
		None => class,
	}
}

impl Facts {
	/// Later facts override earlier ones, except that classes accumulate.
	#[must_use]
	pub fn organize(facts: Vec<Fact>) -> Self {
		let mut organized = Self::default();
		for fact in facts {
			match fact {
				Fact::Event(name, handler) => {
					organized.events.insert(name, handler);
				}
				Fact::Style(key, value) => {
					organized.styles.insert(key, value);
				}
				Fact::Property(key, Value::String(class)) if key == "className" => {
					let existing = organized.properties.get(&key).and_then(Value::as_str);
					let merged = add_class(existing, class);
					organized.properties.insert(key, Value::String(merged));
				}
				Fact::Property(key, value) => {
					organized.properties.insert(key, value);
				}
				Fact::Attribute(key, class) if key == "class" => {
					let merged = add_class(organized.attributes.get(&key).map(String::as_str), class);
					organized.attributes.insert(key, merged);
				}
				Fact::Attribute(key, value) => {
					organized.attributes.insert(key, value);
				}
				Fact::AttributeNs { namespace, key, value } => {
					organized.attributes_ns.insert(key, (namespace, value));
				}
			}
		}
		organized
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
			&& self.styles.is_empty()
			&& self.properties.is_empty()
			&& self.attributes.is_empty()
			&& self.attributes_ns.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn descendants_are_counted() {
		let tree = Node::element(
			"div",
			vec![],
			vec![
				Node::text("a"),
				Node::element("span", vec![], vec![Node::text("b"), Node::text("c")]),
				Node::text("d").map(Rc::new(|message: Opaque| message)),
			],
		);
		assert_eq!(tree.descendants(), 1 + (1 + 2) + (1 + 1));
	}

	#[test]
	fn sanitising_constructors() {
		match Node::element("script", vec![], vec![]).kind() {
			NodeKind::Element { tag, .. } => assert_eq!(tag, "p"),
			_ => unreachable!(),
		}
		assert!(matches!(Fact::attribute("onclick", "x"), Fact::Attribute(key, _) if key == "data-onclick"));
		assert!(matches!(Fact::attribute("formAction", "x"), Fact::Attribute(key, _) if key == "data-formAction"));
		assert!(matches!(Fact::attribute("title", "x"), Fact::Attribute(key, _) if key == "title"));
		assert!(matches!(Fact::property("innerHTML", json!("<b>")), Fact::Property(key, _) if key == "data-innerHTML"));
		assert!(matches!(Fact::attribute_url("href", " java\tScript:alert(1)"), Fact::Attribute(_, value) if value.is_empty()));
		assert!(matches!(Fact::attribute_url("href", "/home"), Fact::Attribute(_, value) if value == "/home"));
	}

	#[test]
	fn classes_accumulate() {
		let facts = Facts::organize(vec![
			Fact::attribute("class", "a"),
			Fact::attribute("id", "x"),
			Fact::attribute("class", "b"),
			Fact::property("className", json!("c")),
			Fact::property("className", json!("d")),
		]);
		assert_eq!(facts.attributes["class"], "a b");
		assert_eq!(facts.attributes["id"], "x");
		assert_eq!(facts.properties["className"], json!("c d"));
	}

	#[test]
	fn mapped_handlers_stay_equal() {
		let tagger: Tagger = Rc::new(|message: Opaque| message);
		let handler = Handler::Normal(decode::succeed(Opaque::unit()));
		assert_eq!(handler.map(&tagger), handler.map(&tagger));

		let other: Tagger = Rc::new(|message: Opaque| message);
		assert_ne!(handler.map(&tagger), handler.map(&other));
	}

	#[test]
	fn lazy_forces_once() {
		let calls = Rc::new(RefCell::new(0));
		let node = Node::thunk(vec![], {
			let calls = calls.clone();
			move || {
				*calls.borrow_mut() += 1;
				Node::text("lazy")
			}
		});
		let first = node.force();
		let second = node.force();
		assert!(Node::ptr_eq(&first, &second));
		assert_eq!(*calls.borrow(), 1);
	}
}
