//! Applying patches to a rendered tree.
//!
//! This happens in two passes: first every patch's host node is located with a single walk over
//! the old virtual tree, skipping subtrees without patches by their descendant counts. Then the
//! patches are applied in order, which may detach or replace the located nodes.

use super::{
	dom::{Dom, EventNode},
	node::{Node, NodeKind},
	patch::{Entry, EntryStatus, Patch, PatchKind, Reorder},
	render::{apply_facts, render, widget_for},
};
use std::rc::Rc;
use tracing::{instrument, trace_span, warn};

#[derive(Clone)]
struct Located<H> {
	node: H,
	event_node: Rc<EventNode>,
	/// Parallel to the nested patches of lazy, reorder and move patches.
	nested: Vec<Option<Located<H>>>,
}

/// Applies `patches`, produced by diffing `old` against a new tree, to `root`, the rendering
/// of `old`.
///
/// Returns the new root handle, which differs from `root` iff the root was redrawn.
#[instrument(skip(dom, old, patches, event_node), fields(patches = patches.len()))]
pub fn apply_patches<D: Dom>(
	dom: &mut D,
	root: &D::Handle,
	old: &Node,
	patches: &[Patch],
	event_node: &Rc<EventNode>,
) -> D::Handle {
	if patches.is_empty() {
		return root.clone();
	}
	let targets = locate_all(dom, root, old, patches, event_node);
	apply_located(dom, root.clone(), patches, &targets, None)
}

fn locate_all<D: Dom>(
	dom: &D,
	node: &D::Handle,
	vnode: &Node,
	patches: &[Patch],
	event_node: &Rc<EventNode>,
) -> Vec<Option<Located<D::Handle>>> {
	let mut targets = vec![None; patches.len()];
	if !patches.is_empty() {
		locate(dom, node, vnode, patches, &mut targets, 0, 0, vnode.descendants(), event_node);
	}
	targets
}

/// Locates the host nodes of `patches[i..]` within `node`, whose pre-order indices span
/// `low..=high`. Returns the index of the first patch outside that span.
#[allow(clippy::too_many_arguments)]
fn locate<D: Dom>(
	dom: &D,
	node: &D::Handle,
	vnode: &Node,
	patches: &[Patch],
	targets: &mut [Option<Located<D::Handle>>],
	mut i: usize,
	low: usize,
	high: usize,
	event_node: &Rc<EventNode>,
) -> usize {
	let mut index = patches[i].index;

	while index == low {
		let nested = match &patches[i].kind {
			PatchKind::Lazy(sub_patches) => {
				let cached = vnode.force();
				locate_all(dom, node, &cached, sub_patches, event_node)
			}
			PatchKind::Reorder(Reorder { local, .. }) => locate_nested(dom, node, vnode, local, low, high, event_node),
			PatchKind::Remove(Some(removal)) => locate_nested(dom, node, vnode, &removal.patches, low, high, event_node),
			_ => Vec::new(),
		};
		targets[i] = Some(Located {
			node: node.clone(),
			event_node: event_node.clone(),
			nested,
		});

		i += 1;
		match patches.get(i) {
			Some(patch) if patch.index <= high => index = patch.index,
			_ => return i,
		}
	}

	match vnode.kind() {
		NodeKind::Mapped { inner, .. } => {
			let mut inner = inner.clone();
			while let NodeKind::Mapped { inner: deeper, .. } = inner.kind() {
				let deeper = deeper.clone();
				inner = deeper;
			}
			let event_node = dom.event_node(node).unwrap_or_else(|| event_node.clone());
			locate(dom, node, &inner, patches, targets, i, low + 1, high, &event_node)
		}
		NodeKind::Element { children, .. } => locate_children(dom, node, children.iter(), patches, targets, i, low, high, event_node),
		NodeKind::Keyed { children, .. } => locate_children(
			dom,
			node,
			children.iter().map(|(_, child)| child),
			patches,
			targets,
			i,
			low,
			high,
			event_node,
		),
		_ => i,
	}
}

fn locate_nested<D: Dom>(
	dom: &D,
	node: &D::Handle,
	vnode: &Node,
	patches: &[Patch],
	low: usize,
	high: usize,
	event_node: &Rc<EventNode>,
) -> Vec<Option<Located<D::Handle>>> {
	let mut targets = vec![None; patches.len()];
	if !patches.is_empty() {
		locate(dom, node, vnode, patches, &mut targets, 0, low, high, event_node);
	}
	targets
}

#[allow(clippy::too_many_arguments)]
fn locate_children<'a, D: Dom>(
	dom: &D,
	node: &D::Handle,
	children: impl Iterator<Item = &'a Node>,
	patches: &[Patch],
	targets: &mut [Option<Located<D::Handle>>],
	mut i: usize,
	mut low: usize,
	high: usize,
	event_node: &Rc<EventNode>,
) -> usize {
	let mut index = patches[i].index;
	for (j, child) in children.enumerate() {
		low += 1;
		let next_low = low + child.descendants();
		if low <= index && index <= next_low {
			match dom.child(node, j) {
				Some(child_node) => i = locate(dom, &child_node, child, patches, targets, i, low, next_low, event_node),
				None => {
					warn!(child = j, "Missing host child. Skipping its patches.");
					while patches.get(i).map_or(false, |patch| patch.index <= next_low) {
						i += 1;
					}
				}
			}
			match patches.get(i) {
				Some(patch) if patch.index <= high => index = patch.index,
				_ => return i,
			}
		}
		low = next_low;
	}
	i
}

/// Host nodes of the entries of the reorder patch being applied.
struct Moves<'a, H> {
	entries: &'a [Entry],
	handles: Vec<Option<H>>,
}

fn apply_located<D: Dom>(
	dom: &mut D,
	mut root: D::Handle,
	patches: &[Patch],
	targets: &[Option<Located<D::Handle>>],
	mut moves: Option<&mut Moves<'_, D::Handle>>,
) -> D::Handle {
	for (patch, target) in patches.iter().zip(targets) {
		let target = match target {
			Some(target) => target,
			None => {
				warn!(index = patch.index, kind = patch.kind.name(), "Skipping patch without host node.");
				continue;
			}
		};
		let span = trace_span!("apply patch", index = patch.index, kind = patch.kind.name());
		let _enter = span.enter();
		let new_node = apply_patch(dom, target, &patch.kind, moves.as_deref_mut());
		if target.node == root {
			root = new_node;
		}
	}
	root
}

fn apply_patch<D: Dom>(
	dom: &mut D,
	target: &Located<D::Handle>,
	patch: &PatchKind,
	moves: Option<&mut Moves<'_, D::Handle>>,
) -> D::Handle {
	let node = &target.node;
	match patch {
		PatchKind::Redraw(vnode) => redraw(dom, node, vnode, &target.event_node),

		PatchKind::Facts(facts) => {
			apply_facts(dom, node, &target.event_node, facts);
			node.clone()
		}

		PatchKind::Text(text) => {
			dom.replace_text(node, text);
			node.clone()
		}

		PatchKind::Lazy(sub_patches) => apply_located(dom, node.clone(), sub_patches, &target.nested, None),

		PatchKind::Taggers(taggers) => {
			match dom.event_node(node).as_deref() {
				Some(EventNode::Tagged { taggers: existing, .. }) => *existing.borrow_mut() = taggers.clone(),
				_ => dom.set_event_node(node, EventNode::tagged(taggers.clone(), target.event_node.clone())),
			}
			node.clone()
		}

		PatchKind::RemoveLast { from, count } => {
			for _ in 0..*count {
				match dom.child(node, *from) {
					Some(child) => {
						dom.remove_child(node, &child);
						dom.release(&child);
					}
					None => warn!(from, "Fewer host children than expected."),
				}
			}
			node.clone()
		}

		PatchKind::Append { from, children } => {
			let reference = dom.child(node, *from);
			for child in children {
				let child = render(dom, child, &target.event_node);
				dom.insert_before(node, &child, reference.as_ref());
			}
			node.clone()
		}

		PatchKind::Remove(None) => {
			detach(dom, node);
			dom.release(node);
			node.clone()
		}

		PatchKind::Remove(Some(removal)) => match moves {
			Some(moves) => {
				if moves.entries[removal.entry].index.is_some() {
					detach(dom, node);
				}
				let moved = apply_located(dom, node.clone(), &removal.patches, &target.nested, None);
				moves.handles[removal.entry] = Some(moved);
				node.clone()
			}
			None => {
				warn!("Keyed move outside of a reorder. Removing the node.");
				detach(dom, node);
				dom.release(node);
				node.clone()
			}
		},

		PatchKind::Reorder(reorder) => {
			apply_reorder(dom, target, reorder);
			node.clone()
		}

		PatchKind::Custom { widget, patch } => {
			let widget = widget_for::<D>(widget);
			let apply = widget.apply.clone();
			apply(dom, node, patch)
		}
	}
}

fn detach<D: Dom>(dom: &mut D, node: &D::Handle) {
	match dom.parent(node) {
		Some(parent) => dom.remove_child(&parent, node),
		None => warn!("Could not find parent node of node to remove. Ignoring."),
	}
}

fn redraw<D: Dom>(dom: &mut D, node: &D::Handle, vnode: &Node, event_node: &Rc<EventNode>) -> D::Handle {
	let parent = dom.parent(node);
	let new_node = render(dom, vnode, event_node);
	if dom.event_node(&new_node).is_none() {
		if let Some(existing) = dom.event_node(node) {
			dom.set_event_node(&new_node, existing);
		}
	}
	if new_node != *node {
		if let Some(parent) = parent {
			dom.replace_child(&parent, &new_node, node);
		}
		dom.release(node);
	}
	new_node
}

fn apply_reorder<D: Dom>(dom: &mut D, target: &Located<D::Handle>, reorder: &Reorder) {
	let node = &target.node;
	let mut moves = Moves {
		entries: &reorder.entries,
		handles: vec![None; reorder.entries.len()],
	};
	for (patch, located) in reorder.local.iter().zip(&target.nested) {
		if let (PatchKind::Remove(Some(removal)), Some(located)) = (&patch.kind, located) {
			moves.handles[removal.entry] = Some(located.node.clone());
		}
	}

	// Nodes moved to the end leave the list before any other change, like appending them to a
	// detached fragment would.
	if let Some(end_inserts) = &reorder.end_inserts {
		for &entry in end_inserts {
			if reorder.entries[entry].status == EntryStatus::Moved {
				if let Some(moved) = moves.handles[entry].clone() {
					detach(dom, &moved);
				}
			}
		}
	}

	apply_located(dom, node.clone(), &reorder.local, &target.nested, Some(&mut moves));

	for insert in &reorder.inserts {
		let child = entry_node(dom, &moves, insert.entry, &target.event_node);
		let reference = dom.child(node, insert.index);
		dom.insert_before(node, &child, reference.as_ref());
	}

	if let Some(end_inserts) = &reorder.end_inserts {
		let children: Vec<_> = end_inserts
			.iter()
			.map(|&entry| entry_node(dom, &moves, entry, &target.event_node))
			.collect();
		dom.append_children(node, &children);
	}
}

fn entry_node<D: Dom>(dom: &mut D, moves: &Moves<'_, D::Handle>, entry: usize, event_node: &Rc<EventNode>) -> D::Handle {
	match (&moves.entries[entry], &moves.handles[entry]) {
		(Entry { status: EntryStatus::Moved, .. }, Some(moved)) => moved.clone(),
		(Entry { node, .. }, _) => render(dom, node, event_node),
	}
}
