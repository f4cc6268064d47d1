//! Initial materialisation of virtual nodes.

use super::{
	diff::collect_taggers,
	dom::{Dom, EventNode, Listener},
	node::{Facts, Handler, Node, NodeKind, Widget},
	patch::FactsDiff,
};
use core::any::type_name;
use std::rc::Rc;
use tracing::{error, trace_span};

/// Creates host nodes for `node` and its descendants.
///
/// Messages from event listeners are sent up through `event_node`.
pub fn render<D: Dom>(dom: &mut D, node: &Node, event_node: &Rc<EventNode>) -> D::Handle {
	match node.kind() {
		NodeKind::Lazy { .. } => render(dom, &node.force(), event_node),

		NodeKind::Text(text) => {
			let span = if cfg!(feature = "dangerous-logging") {
				trace_span!("render text", text = text.as_str())
			} else {
				trace_span!("render text")
			};
			let _enter = span.enter();
			dom.create_text(text)
		}

		NodeKind::Mapped { .. } => {
			let (taggers, inner) = collect_taggers(node);
			let sub_event_node = EventNode::tagged(taggers, event_node.clone());
			let handle = render(dom, &inner, &sub_event_node);
			dom.set_event_node(&handle, sub_event_node);
			handle
		}

		NodeKind::Custom { facts, model, widget, .. } => {
			let span = trace_span!("render custom");
			let _enter = span.enter();
			let widget = widget_for::<D>(widget);
			let handle = (widget.render)(dom, model);
			apply_facts(dom, &handle, event_node, &facts_as_diff(facts));
			handle
		}

		NodeKind::Element {
			tag,
			namespace,
			facts,
			children,
			..
		} => {
			let span = trace_span!("render element", tag = tag.as_str());
			let _enter = span.enter();
			let handle = dom.create_element(namespace.as_deref(), tag);
			apply_facts(dom, &handle, event_node, &facts_as_diff(facts));
			for child in children {
				let child = render(dom, child, event_node);
				dom.append_child(&handle, &child);
			}
			handle
		}

		NodeKind::Keyed {
			tag,
			namespace,
			facts,
			children,
			..
		} => {
			let span = trace_span!("render keyed element", tag = tag.as_str());
			let _enter = span.enter();
			let handle = dom.create_element(namespace.as_deref(), tag);
			apply_facts(dom, &handle, event_node, &facts_as_diff(facts));
			for (_, child) in children {
				let child = render(dom, child, event_node);
				dom.append_child(&handle, &child);
			}
			handle
		}
	}
}

/// # Panics
///
/// Iff the custom node was built for a different [`Dom`].
pub(crate) fn widget_for<D: Dom>(widget: &Rc<dyn core::any::Any>) -> &Widget<D> {
	match widget.downcast_ref::<Widget<D>>() {
		Some(widget) => widget,
		None => {
			error!(host = type_name::<D>(), "Custom node rendered into the wrong host.");
			panic!("Custom node was not built for `{}`.", type_name::<D>())
		}
	}
}

fn facts_as_diff(facts: &Facts) -> FactsDiff {
	FactsDiff {
		events: facts.events.iter().map(|(key, handler)| (key.clone(), Some(handler.clone()))).collect(),
		styles: facts.styles.clone(),
		properties: facts.properties.clone(),
		attributes: facts.attributes.iter().map(|(key, value)| (key.clone(), Some(value.clone()))).collect(),
		attributes_ns: facts
			.attributes_ns
			.iter()
			.map(|(key, (namespace, value))| (key.clone(), (namespace.clone(), Some(value.clone()))))
			.collect(),
	}
}

/// Writes changed facts to `node`.
pub fn apply_facts<D: Dom>(dom: &mut D, node: &D::Handle, event_node: &Rc<EventNode>, facts: &FactsDiff) {
	for (key, value) in &facts.styles {
		dom.set_style(node, key, value);
	}

	for (event, handler) in &facts.events {
		apply_event(dom, node, event_node, event, handler.as_ref());
	}

	for (key, value) in &facts.attributes {
		match value {
			Some(value) => dom.set_attribute(node, key, value),
			None => dom.remove_attribute(node, key),
		}
	}

	for (key, (namespace, value)) in &facts.attributes_ns {
		match value {
			Some(value) => dom.set_attribute_ns(node, namespace, key, value),
			None => dom.remove_attribute_ns(node, namespace, key),
		}
	}

	for (key, value) in &facts.properties {
		let refreshed = key == "value" || key == "checked";
		if !refreshed || dom.property(node, key).as_ref() != Some(value) {
			dom.set_property(node, key, value);
		}
	}
}

fn apply_event<D: Dom>(dom: &mut D, node: &D::Handle, event_node: &Rc<EventNode>, event: &str, handler: Option<&Handler>) {
	let existing = dom.listener(node, event);

	let handler = match handler {
		Some(handler) => handler,
		None => {
			if existing.is_some() {
				dom.remove_listener(node, event);
			}
			return;
		}
	};

	if let Some(existing) = existing {
		if existing.handler().kind() == handler.kind() {
			existing.replace_handler(handler.clone());
			return;
		}
		dom.remove_listener(node, event);
	}

	let listener = Listener::new(handler.clone(), event_node.clone());
	dom.add_listener(node, event, listener, handler.is_passive());
}
