use proptest::prelude::*;
use serde_json::json;
use std::{cell::RefCell, collections::HashMap, rc::Rc};
use vdom_runtime::{
	json::decode,
	opaque::{Opaque, Tagger},
	vdom::{
		apply_patches, diff,
		memory::{dispatch_event, MemoryDom, NodeId},
		render, Dom, EventNode, Fact, Handler, LazyRef, Node, Patch, PatchKind, Widget,
	},
};

fn ignore() -> Rc<EventNode> {
	EventNode::root(Rc::new(|_: Opaque| ()))
}

/// Renders `old` into a fresh body, then patches it towards `new`.
fn patched(old: &Node, new: &Node) -> (MemoryDom, NodeId, NodeId) {
	let mut dom = MemoryDom::new();
	let events = ignore();
	let body = dom.create_element(None, "body");
	let root = render(&mut dom, old, &events);
	dom.append_child(&body, &root);
	let root = apply_patches(&mut dom, &root, old, &diff(old, new), &events);
	(dom, body, root)
}

fn markup(node: &Node) -> String {
	let mut dom = MemoryDom::new();
	let root = render(&mut dom, node, &ignore());
	dom.to_markup(root)
}

#[derive(Clone, Debug)]
enum Shape {
	Text(String),
	Element {
		tag: &'static str,
		attributes: Vec<(&'static str, String)>,
		children: Vec<Shape>,
	},
	Keyed {
		attributes: Vec<(&'static str, String)>,
		children: Vec<(usize, Shape)>,
	},
	Mapped(Box<Shape>),
	/// A pinned lazy node shares its reference with every other pinned lazy node of the same
	/// shape, so only its argument decides whether it is diffed.
	Lazy { inner: Box<Shape>, pinned: bool },
}

fn attributes() -> impl Strategy<Value = Vec<(&'static str, String)>> {
	prop::collection::vec((prop::sample::select(vec!["id", "title", "class"]), "[xy]"), 0..3)
}

fn shape() -> impl Strategy<Value = Shape> {
	let leaf = "[a-c]{0,2}".prop_map(Shape::Text);
	leaf.prop_recursive(4, 48, 6, |inner| {
		prop_oneof![
			(
				prop::sample::select(vec!["div", "p", "span"]),
				attributes(),
				prop::collection::vec(inner.clone(), 0..5)
			)
				.prop_map(|(tag, attributes, children)| Shape::Element {
					tag,
					attributes,
					children
				}),
			(attributes(), prop::collection::vec(inner.clone(), 0..6))
				.prop_flat_map(|(attributes, children)| {
					let keys: Vec<usize> = (0..children.len()).collect();
					(Just(attributes), Just(children), Just(keys).prop_shuffle())
				})
				.prop_map(|(attributes, children, keys)| Shape::Keyed {
					attributes,
					children: keys.into_iter().zip(children).collect(),
				}),
			// Few keys, so siblings often share one.
			(attributes(), prop::collection::vec((0..3_usize, inner.clone()), 0..6))
				.prop_map(|(attributes, children)| Shape::Keyed { attributes, children }),
			inner.clone().prop_map(|shape| Shape::Mapped(Box::new(shape))),
			(inner, any::<bool>()).prop_map(|(inner, pinned)| Shape::Lazy {
				inner: Box::new(inner),
				pinned
			}),
		]
	})
}

fn facts(attributes: &[(&'static str, String)]) -> Vec<Fact> {
	attributes.iter().map(|(key, value)| Fact::attribute(*key, value.clone())).collect()
}

/// Lazy references handed out to pinned lazy shapes, by shape.
#[derive(Default)]
struct Pins(HashMap<String, Rc<()>>);

impl Pins {
	fn get(&mut self, shape: &Shape) -> LazyRef {
		LazyRef::Shared(self.0.entry(format!("{:?}", shape)).or_insert_with(|| Rc::new(())).clone())
	}
}

fn build(shape: &Shape, tagger: &Tagger, pins: &mut Pins) -> Node {
	match shape {
		Shape::Text(text) => Node::text(text.clone()),
		Shape::Element { tag, attributes, children } => Node::element(
			*tag,
			facts(attributes),
			children.iter().map(|child| build(child, tagger, pins)).collect(),
		),
		Shape::Keyed { attributes, children } => Node::keyed(
			"ul",
			facts(attributes),
			children
				.iter()
				.map(|(key, child)| (format!("k{}", key), build(child, tagger, pins)))
				.collect(),
		),
		Shape::Mapped(inner) => build(inner, tagger, pins).map(tagger.clone()),
		Shape::Lazy { inner, pinned } => {
			let node = build(inner, tagger, pins);
			let reference = if *pinned {
				pins.get(inner)
			} else {
				LazyRef::Shared(Rc::new(()))
			};
			Node::thunk(vec![reference], move || node.clone())
		}
	}
}

proptest! {
	#[test]
	fn patching_matches_a_fresh_render(a in shape(), b in shape()) {
		let tagger: Tagger = Rc::new(|message: Opaque| message);
		let mut pins = Pins::default();
		let (old, new) = (build(&a, &tagger, &mut pins), build(&b, &tagger, &mut pins));

		let (dom, body, root) = patched(&old, &new);
		prop_assert_eq!(dom.children(body), &[root][..]);
		prop_assert_eq!(dom.to_markup(root), markup(&new));
	}

	#[test]
	fn equal_trees_diff_to_nothing(a in shape()) {
		let tagger: Tagger = Rc::new(|message: Opaque| message);
		let mut pins = Pins::default();
		let patches = diff(&build(&a, &tagger, &mut pins), &build(&a, &tagger, &mut pins));
		prop_assert!(patches.is_empty(), "{:?}", patches);
	}
}

fn div(children: Vec<Node>) -> Node {
	Node::element("div", vec![], children)
}

#[test]
fn trailing_removal_is_a_single_patch() {
	let old = div(vec![Node::text("a"), Node::text("b")]);
	let new = div(vec![Node::text("a")]);

	let patches = diff(&old, &new);
	assert!(matches!(
		patches.as_slice(),
		[Patch {
			index: 0,
			kind: PatchKind::RemoveLast { from: 1, count: 1 }
		}]
	));

	let (dom, _, root) = patched(&old, &new);
	assert_eq!(dom.to_markup(root), "<div>a</div>");
}

fn list(keys: &[&str]) -> Node {
	Node::keyed(
		"ul",
		vec![],
		keys.iter()
			.map(|key| ((*key).to_owned(), Node::element("li", vec![], vec![Node::text(*key)])))
			.collect(),
	)
}

#[test]
fn keyed_swap_moves_existing_nodes() {
	let old = list(&["a", "b"]);
	let new = list(&["b", "a"]);

	match diff(&old, &new).as_slice() {
		[patch] => match &patch.kind {
			PatchKind::Reorder(reorder) => {
				assert_eq!(reorder.inserts.len(), 1);
				assert!(reorder.end_inserts.is_none());
				assert!(reorder
					.local
					.iter()
					.any(|patch| matches!(patch.kind, PatchKind::Remove(Some(_)))));
			}
			other => panic!("expected a reorder, got {:?}", other),
		},
		other => panic!("expected one patch, got {:?}", other),
	}

	let mut dom = MemoryDom::new();
	let events = ignore();
	let root = render(&mut dom, &old, &events);
	let before = dom.children(root).to_vec();
	let created = dom.created();

	let root = apply_patches(&mut dom, &root, &old, &diff(&old, &new), &events);
	assert_eq!(dom.children(root), &[before[1], before[0]]);
	assert_eq!(dom.created(), created);
	assert_eq!(dom.to_markup(root), "<ul><li>b</li><li>a</li></ul>");
}

#[test]
fn keyed_rotation_reuses_the_moved_node() {
	let old = list(&["a", "b", "c", "d"]);
	let new = list(&["d", "a", "b", "c"]);

	let mut dom = MemoryDom::new();
	let events = ignore();
	let root = render(&mut dom, &old, &events);
	let before = dom.children(root).to_vec();
	let created = dom.created();

	let root = apply_patches(&mut dom, &root, &old, &diff(&old, &new), &events);
	assert_eq!(dom.children(root), &[before[3], before[0], before[1], before[2]]);
	assert_eq!(dom.created(), created);
}

#[test]
fn duplicate_keys_patch_like_a_fresh_render() {
	let cases: &[(&[&str], &[&str])] = &[
		(&["a", "a"], &["a"]),
		(&["a", "b", "a"], &["b", "a", "a", "c"]),
		(&["x", "x", "x"], &["x", "y", "x"]),
		(&["a", "b"], &["b", "b", "a"]),
	];
	for (old, new) in cases {
		let (old, new) = (list(old), list(new));
		let (dom, body, root) = patched(&old, &new);
		assert_eq!(dom.children(body), &[root]);
		assert_eq!(dom.to_markup(root), markup(&new));
	}
}

fn buttons(keys: &[&str]) -> Node {
	let on_click = || Fact::on("click", Handler::Normal(decode::succeed(Opaque::unit())));
	Node::keyed(
		"div",
		vec![],
		keys.iter()
			.map(|key| ((*key).to_owned(), Node::element("button", vec![on_click()], vec![Node::text(*key)])))
			.collect(),
	)
}

#[test]
fn discarded_nodes_release_their_listeners() {
	let mut dom = MemoryDom::new();
	let events = ignore();
	let old = buttons(&["a", "b", "c"]);
	let root = render(&mut dom, &old, &events);
	assert_eq!(dom.listener_count(), 3);

	let moved = buttons(&["c", "a", "b"]);
	let root = apply_patches(&mut dom, &root, &old, &diff(&old, &moved), &events);
	assert_eq!(dom.listener_count(), 3);
	let c = dom.children(root)[0];
	assert!(dom.listener(&c, "click").is_some());

	let fewer = buttons(&["c", "b"]);
	let root = apply_patches(&mut dom, &root, &moved, &diff(&moved, &fewer), &events);
	assert_eq!(dom.listener_count(), 2);

	let text = Node::text("gone");
	apply_patches(&mut dom, &root, &fewer, &diff(&fewer, &text), &events);
	assert_eq!(dom.listener_count(), 0);
}

#[test]
fn removed_facts_are_cleared_from_the_host() {
	let old = Node::element(
		"p",
		vec![
			Fact::attribute("id", "x"),
			Fact::style("color", "red"),
			Fact::property("title", json!("t")),
		],
		vec![],
	);
	let new = Node::element("p", vec![Fact::style("margin", "0")], vec![]);
	let (dom, _, root) = patched(&old, &new);
	assert_eq!(dom.to_markup(root), r#"<p .title="" style="margin:0"></p>"#);
}

#[test]
fn value_is_restored_after_the_host_changes_it() {
	let view = || Node::element("input", vec![Fact::property("value", json!("model"))], vec![]);
	let old = view();

	let mut dom = MemoryDom::new();
	let events = ignore();
	let root = render(&mut dom, &old, &events);
	dom.poke_property(root, "value", json!("typed"));

	let new = view();
	let root = apply_patches(&mut dom, &root, &old, &diff(&old, &new), &events);
	assert_eq!(dom.to_markup(root), r#"<input .value="model"></input>"#);
}

fn prefixing(prefix: &'static str) -> Tagger {
	Rc::new(move |message: Opaque| Opaque::new(format!("{}{}", prefix, message.get::<String>())))
}

fn clickable(tagger: Tagger) -> Node {
	let on_click = Handler::MayPreventDefault(decode::map(
		|target: String| (Opaque::new(target), true),
		&decode::at(&["target", "id"], &decode::string()),
	));
	div(vec![Node::element("button", vec![Fact::on("click", on_click)], vec![]).map(tagger)])
}

#[test]
fn events_pass_through_current_taggers() {
	let received = Rc::new(RefCell::new(Vec::<String>::new()));
	let events = {
		let received = received.clone();
		EventNode::root(Rc::new(move |message: Opaque| received.borrow_mut().push(message.get())))
	};
	let dom = RefCell::new(MemoryDom::new());

	let old = clickable(prefixing("one:"));
	let root = render(&mut *dom.borrow_mut(), &old, &events);
	let button = dom.borrow().children(root)[0];
	let click = json!({ "target": { "id": "ok" } });

	let outcome = dispatch_event(&dom, button, "click", &click).unwrap();
	assert!(outcome.prevent_default);
	assert!(!outcome.stop_propagation);
	assert_eq!(dom.borrow().is_passive(button, "click"), Some(false));

	let new = clickable(prefixing("two:"));
	let patches = diff(&old, &new);
	assert!(patches.iter().any(|patch| matches!(patch.kind, PatchKind::Taggers(_))));
	let root = apply_patches(&mut *dom.borrow_mut(), &root, &old, &patches, &events);
	assert_eq!(dom.borrow().children(root)[0], button);

	dispatch_event(&dom, button, "click", &click);
	assert!(dispatch_event(&dom, button, "click", &json!({})).is_none());
	assert_eq!(*received.borrow(), ["one:ok", "two:ok"]);
}

fn gauge() -> Rc<Widget<MemoryDom>> {
	Rc::new(Widget {
		render: Rc::new(|dom: &mut MemoryDom, model: &Opaque| {
			let node = dom.create_element(None, "meter");
			dom.set_attribute(&node, "value", &model.get::<i32>().to_string());
			node
		}),
		diff: Rc::new(|old: &Opaque, new: &Opaque| {
			if old.get::<i32>() == new.get::<i32>() {
				None
			} else {
				Some(new.clone())
			}
		}),
		apply: Rc::new(|dom: &mut MemoryDom, node: &NodeId, patch: &Opaque| {
			dom.set_attribute(node, "value", &patch.get::<i32>().to_string());
			*node
		}),
	})
}

#[test]
fn custom_nodes_patch_themselves() {
	let widget = gauge();
	let view = |value: i32| div(vec![Node::custom(vec![Fact::attribute("id", "g")], Opaque::new(value), &widget)]);

	assert!(diff(&view(1), &view(1)).is_empty());

	let (dom, _, root) = patched(&view(1), &view(2));
	assert_eq!(dom.to_markup(root), r#"<div><meter id="g" value="2"></meter></div>"#);

	let other = gauge();
	let replaced = div(vec![Node::custom(vec![], Opaque::new(2), &other)]);
	let patches = diff(&view(2), &replaced);
	assert!(matches!(patches.as_slice(), [patch] if matches!(patch.kind, PatchKind::Redraw(_))));
}

thread_local! {
	static RENDERS: RefCell<usize> = RefCell::new(0);
}

fn counted(label: &String) -> Node {
	RENDERS.with(|renders| *renders.borrow_mut() += 1);
	Node::text(label.clone())
}

#[test]
fn lazy_nodes_only_rerender_for_new_arguments() {
	let label = Rc::new("a".to_owned());
	let old = div(vec![Node::lazy(counted, label.clone())]);
	let same = div(vec![Node::lazy(counted, label)]);

	let mut dom = MemoryDom::new();
	let events = ignore();
	let root = render(&mut dom, &old, &events);
	assert!(diff(&old, &same).is_empty());
	RENDERS.with(|renders| assert_eq!(*renders.borrow(), 1));

	let changed = div(vec![Node::lazy(counted, Rc::new("b".to_owned()))]);
	let root = apply_patches(&mut dom, &root, &same, &diff(&same, &changed), &events);
	assert_eq!(dom.to_markup(root), "<div>b</div>");
	RENDERS.with(|renders| assert_eq!(*renders.borrow(), 2));
}
