//! Tree diffing.
//!
//! Patches are produced in pre-order of the old tree, so that [`apply_patches`](super::apply::apply_patches)
//! can locate all of their host nodes in a single walk.

use super::{
	node::{Facts, Node, NodeKind},
	patch::{Entry, EntryId, EntryStatus, FactsDiff, Insert, Patch, PatchKind, Removal, Reorder},
};
use crate::{
	json::Value,
	opaque::{same_rc, Tagger},
};
use core::mem::discriminant;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{instrument, trace};

/// Appended to a repeated key so that siblings with the same key never match each other.
const DUPLICATE_KEY_SUFFIX: &str = "_elmW6BL";

/// Computes the patches that turn `old`'s rendering into `new`'s.
///
/// Subtrees shared by identity are skipped. Lazy nodes of `new` reuse or fill their cache.
#[must_use]
#[instrument(skip(old, new))]
pub fn diff(old: &Node, new: &Node) -> Vec<Patch> {
	let mut patches = Vec::new();
	diff_help(old, new, &mut patches, 0);
	trace!(count = patches.len(), "Diffed.");
	patches
}

fn push(patches: &mut Vec<Patch>, index: usize, kind: PatchKind) {
	patches.push(Patch { index, kind });
}

fn diff_help(x: &Node, y: &Node, patches: &mut Vec<Patch>, index: usize) {
	if Node::ptr_eq(x, y) {
		return;
	}

	if discriminant(x.kind()) != discriminant(y.kind()) {
		if let (NodeKind::Element { .. }, NodeKind::Keyed { .. }) = (x.kind(), y.kind()) {
			diff_help(x, &y.dekey(), patches, index);
		} else {
			push(patches, index, PatchKind::Redraw(y.clone()));
		}
		return;
	}

	match (x.kind(), y.kind()) {
		(NodeKind::Lazy { refs: x_refs, .. }, NodeKind::Lazy { refs: y_refs, .. }) => {
			if x_refs == y_refs {
				y.reuse_cache_of(x);
				return;
			}
			let x_node = x.force();
			let y_node = y.force();
			let mut sub_patches = Vec::new();
			diff_help(&x_node, &y_node, &mut sub_patches, 0);
			if !sub_patches.is_empty() {
				push(patches, index, PatchKind::Lazy(sub_patches));
			}
		}

		(NodeKind::Mapped { .. }, NodeKind::Mapped { .. }) => {
			let (x_taggers, x_inner) = collect_taggers(x);
			let (y_taggers, y_inner) = collect_taggers(y);
			let nesting = x_taggers.len() > 1 || y_taggers.len() > 1;
			if nesting && x_taggers.len() != y_taggers.len() {
				push(patches, index, PatchKind::Redraw(y.clone()));
				return;
			}
			if !x_taggers.iter().zip(&y_taggers).all(|(a, b)| same_rc(a, b)) {
				push(patches, index, PatchKind::Taggers(y_taggers));
			}
			diff_help(&x_inner, &y_inner, patches, index + 1);
		}

		(NodeKind::Text(x_text), NodeKind::Text(y_text)) => {
			if x_text != y_text {
				push(patches, index, PatchKind::Text(y_text.clone()));
			}
		}

		(
			NodeKind::Element {
				tag: x_tag,
				namespace: x_namespace,
				facts: x_facts,
				children: x_children,
				..
			},
			NodeKind::Element {
				tag: y_tag,
				namespace: y_namespace,
				facts: y_facts,
				children: y_children,
				..
			},
		) => {
			if x_tag != y_tag || x_namespace != y_namespace {
				push(patches, index, PatchKind::Redraw(y.clone()));
				return;
			}
			if let Some(facts_diff) = diff_facts(x_facts, y_facts) {
				push(patches, index, PatchKind::Facts(facts_diff));
			}
			diff_kids(x_children, y_children, patches, index);
		}

		(
			NodeKind::Keyed {
				tag: x_tag,
				namespace: x_namespace,
				facts: x_facts,
				children: x_children,
				..
			},
			NodeKind::Keyed {
				tag: y_tag,
				namespace: y_namespace,
				facts: y_facts,
				children: y_children,
				..
			},
		) => {
			if x_tag != y_tag || x_namespace != y_namespace {
				push(patches, index, PatchKind::Redraw(y.clone()));
				return;
			}
			if let Some(facts_diff) = diff_facts(x_facts, y_facts) {
				push(patches, index, PatchKind::Facts(facts_diff));
			}
			diff_keyed_kids(x_children, y_children, patches, index);
		}

		(
			NodeKind::Custom {
				facts: x_facts,
				model: x_model,
				widget: x_widget,
				diff: model_diff,
			},
			NodeKind::Custom {
				facts: y_facts,
				model: y_model,
				widget: y_widget,
				..
			},
		) => {
			if !same_rc(x_widget, y_widget) {
				push(patches, index, PatchKind::Redraw(y.clone()));
				return;
			}
			if let Some(facts_diff) = diff_facts(x_facts, y_facts) {
				push(patches, index, PatchKind::Facts(facts_diff));
			}
			if let Some(patch) = model_diff(x_model, y_model) {
				push(
					patches,
					index,
					PatchKind::Custom {
						widget: y_widget.clone(),
						patch,
					},
				);
			}
		}

		_ => push(patches, index, PatchKind::Redraw(y.clone())),
	}
}

/// Collapses nested mapped nodes into their taggers (outermost first) and the innermost node.
pub(crate) fn collect_taggers(node: &Node) -> (Vec<Tagger>, Node) {
	let mut taggers = Vec::new();
	let mut node = node.clone();
	while let NodeKind::Mapped { tagger, inner, .. } = node.kind() {
		taggers.push(tagger.clone());
		let inner = inner.clone();
		node = inner;
	}
	(taggers, node)
}

// FACTS

fn always_refreshed(key: &str) -> bool {
	key == "value" || key == "checked"
}

fn diff_category<V, D>(
	old: &HashMap<String, V>,
	new: &HashMap<String, V>,
	unchanged: impl Fn(&str, &V, &V) -> bool,
	removal: impl Fn(&V) -> D,
	addition: impl Fn(&V) -> D,
) -> HashMap<String, D> {
	let mut diff = HashMap::new();
	for (key, old_value) in old {
		match new.get(key) {
			None => {
				diff.insert(key.clone(), removal(old_value));
			}
			Some(new_value) if unchanged(key, old_value, new_value) => (),
			Some(new_value) => {
				diff.insert(key.clone(), addition(new_value));
			}
		}
	}
	for (key, new_value) in new {
		if !old.contains_key(key) {
			diff.insert(key.clone(), addition(new_value));
		}
	}
	diff
}

fn plainly_unchanged<V: PartialEq>(key: &str, old: &V, new: &V) -> bool {
	old == new && !always_refreshed(key)
}

/// Returns `None` iff nothing changed.
///
/// `value` and `checked` are always included, since the host may have changed them.
#[must_use]
pub fn diff_facts(old: &Rc<Facts>, new: &Rc<Facts>) -> Option<FactsDiff> {
	if Rc::ptr_eq(old, new) {
		return None;
	}
	let diff = FactsDiff {
		events: diff_category(&old.events, &new.events, |_, a, b| a == b, |_| None, |handler| Some(handler.clone())),
		styles: diff_category(&old.styles, &new.styles, plainly_unchanged, |_| String::new(), String::clone),
		properties: diff_category(
			&old.properties,
			&new.properties,
			plainly_unchanged,
			|value| match value {
				Value::String(_) => Value::String(String::new()),
				_ => Value::Null,
			},
			Value::clone,
		),
		attributes: diff_category(
			&old.attributes,
			&new.attributes,
			plainly_unchanged,
			|_| None,
			|value| Some(value.clone()),
		),
		attributes_ns: diff_category(
			&old.attributes_ns,
			&new.attributes_ns,
			plainly_unchanged,
			|(namespace, _)| (namespace.clone(), None),
			|(namespace, value)| (namespace.clone(), Some(value.clone())),
		),
	};
	if diff.is_empty() {
		None
	} else {
		Some(diff)
	}
}

// CHILDREN

fn diff_kids(x_kids: &[Node], y_kids: &[Node], patches: &mut Vec<Patch>, index: usize) {
	let x_len = x_kids.len();
	let y_len = y_kids.len();

	if x_len > y_len {
		push(
			patches,
			index,
			PatchKind::RemoveLast {
				from: y_len,
				count: x_len - y_len,
			},
		);
	} else if x_len < y_len {
		push(
			patches,
			index,
			PatchKind::Append {
				from: x_len,
				children: y_kids[x_len..].to_vec(),
			},
		);
	}

	let mut index = index;
	for (x_kid, y_kid) in x_kids.iter().zip(y_kids) {
		index += 1;
		diff_help(x_kid, y_kid, patches, index);
		index += x_kid.descendants();
	}
}

/// Insert/remove bookkeeping of one keyed diff.
#[derive(Default)]
struct Changes {
	by_key: HashMap<String, EntryId>,
	entries: Vec<Entry>,
	/// Position in `local` of each entry's removal patch, if any.
	removals: Vec<Option<usize>>,
	local: Vec<Patch>,
}

impl Changes {
	fn add_entry(&mut self, key: String, entry: Entry, removal: Option<usize>) -> EntryId {
		let id = self.entries.len();
		self.entries.push(entry);
		self.removals.push(removal);
		self.by_key.insert(key, id);
		id
	}

	fn insert(&mut self, key: String, node: &Node, y_index: Option<usize>) -> EntryId {
		match self.by_key.get(&key).copied() {
			None => self.add_entry(
				key,
				Entry {
					status: EntryStatus::Inserted,
					node: node.clone(),
					index: y_index,
				},
				None,
			),
			Some(id) if self.entries[id].status == EntryStatus::Removed => {
				let old = self.entries[id].node.clone();
				let old_index = self.entries[id].index.unwrap_or_default();
				let mut patches = Vec::new();
				diff_help(&old, node, &mut patches, old_index);

				let entry = &mut self.entries[id];
				entry.status = EntryStatus::Moved;
				entry.index = y_index;
				if let Some(position) = self.removals[id] {
					self.local[position].kind = PatchKind::Remove(Some(Removal { patches, entry: id }));
				}
				id
			}
			Some(_) => self.insert(key + DUPLICATE_KEY_SUFFIX, node, y_index),
		}
	}

	fn remove(&mut self, key: String, node: &Node, index: usize) {
		match self.by_key.get(&key).copied() {
			None => {
				push(&mut self.local, index, PatchKind::Remove(None));
				let position = self.local.len() - 1;
				self.add_entry(
					key,
					Entry {
						status: EntryStatus::Removed,
						node: node.clone(),
						index: Some(index),
					},
					Some(position),
				);
			}
			Some(id) if self.entries[id].status == EntryStatus::Inserted => {
				self.entries[id].status = EntryStatus::Moved;
				let new = self.entries[id].node.clone();
				let mut patches = Vec::new();
				diff_help(node, &new, &mut patches, index);
				push(&mut self.local, index, PatchKind::Remove(Some(Removal { patches, entry: id })));
			}
			Some(_) => self.remove(key + DUPLICATE_KEY_SUFFIX, node, index),
		}
	}
}

/// Matches children by key, looking ahead at most one position on either side.
fn diff_keyed_kids(x_kids: &[(String, Node)], y_kids: &[(String, Node)], patches: &mut Vec<Patch>, root_index: usize) {
	let mut changes = Changes::default();
	let mut inserts = Vec::new();

	let mut x_index = 0;
	let mut y_index = 0;
	let mut index = root_index;

	while x_index < x_kids.len() && y_index < y_kids.len() {
		let (x_key, x_node) = &x_kids[x_index];
		let (y_key, y_node) = &y_kids[y_index];

		if x_key == y_key {
			index += 1;
			diff_help(x_node, y_node, &mut changes.local, index);
			index += x_node.descendants();
			x_index += 1;
			y_index += 1;
			continue;
		}

		match (x_kids.get(x_index + 1), y_kids.get(y_index + 1)) {
			// swap
			(Some((x_next_key, x_next_node)), Some((y_next_key, y_next_node)))
				if y_key == x_next_key && x_key == y_next_key =>
			{
				index += 1;
				diff_help(x_node, y_next_node, &mut changes.local, index);
				let entry = changes.insert(x_key.clone(), y_node, Some(y_index));
				inserts.push(Insert { index: y_index, entry });
				index += x_node.descendants();

				index += 1;
				changes.remove(x_key.clone(), x_next_node, index);
				index += x_next_node.descendants();

				x_index += 2;
				y_index += 2;
			}
			// insert y
			(_, Some((y_next_key, y_next_node))) if x_key == y_next_key => {
				index += 1;
				let entry = changes.insert(y_key.clone(), y_node, Some(y_index));
				inserts.push(Insert { index: y_index, entry });
				diff_help(x_node, y_next_node, &mut changes.local, index);
				index += x_node.descendants();

				x_index += 1;
				y_index += 2;
			}
			// remove x
			(Some((x_next_key, x_next_node)), _) if y_key == x_next_key => {
				index += 1;
				changes.remove(x_key.clone(), x_node, index);
				index += x_node.descendants();

				index += 1;
				diff_help(x_next_node, y_node, &mut changes.local, index);
				index += x_next_node.descendants();

				x_index += 2;
				y_index += 1;
			}
			// remove x, insert y
			(Some((x_next_key, x_next_node)), Some((y_next_key, y_next_node))) if x_next_key == y_next_key => {
				index += 1;
				changes.remove(x_key.clone(), x_node, index);
				let entry = changes.insert(y_key.clone(), y_node, Some(y_index));
				inserts.push(Insert { index: y_index, entry });
				index += x_node.descendants();

				index += 1;
				diff_help(x_next_node, y_next_node, &mut changes.local, index);
				index += x_next_node.descendants();

				x_index += 2;
				y_index += 2;
			}
			_ => break,
		}
	}

	for (x_key, x_node) in &x_kids[x_index..] {
		index += 1;
		changes.remove(x_key.clone(), x_node, index);
		index += x_node.descendants();
	}

	let mut end_inserts = None;
	for (y_key, y_node) in &y_kids[y_index..] {
		let entry = changes.insert(y_key.clone(), y_node, None);
		end_inserts.get_or_insert_with(Vec::new).push(entry);
	}

	if !changes.local.is_empty() || !inserts.is_empty() || end_inserts.is_some() {
		push(
			patches,
			root_index,
			PatchKind::Reorder(Reorder {
				local: changes.local,
				inserts,
				end_inserts,
				entries: changes.entries,
			}),
		);
	}
}
