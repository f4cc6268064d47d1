//! Located mutation instructions produced by [`diff`](super::diff::diff).

use super::node::{Handler, Node};
use crate::{
	json::Value,
	opaque::{Opaque, Tagger},
};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::Rc;

/// A mutation of the host node at pre-order position `index` in the old tree.
#[derive(Debug)]
pub struct Patch {
	pub index: usize,
	pub kind: PatchKind,
}

pub enum PatchKind {
	Redraw(Node),
	Facts(FactsDiff),
	Text(String),
	/// Patches for a lazy node's rendering, indexed from that rendering's root.
	Lazy(Vec<Patch>),
	/// Replaces the tagger chain of a mapped node, outermost first.
	Taggers(Vec<Tagger>),
	RemoveLast { from: usize, count: usize },
	/// Appends `children` after the first `from` existing children.
	Append { from: usize, children: Vec<Node> },
	Reorder(Reorder),
	/// Removes a keyed child. `Some` iff the child is moved rather than deleted.
	Remove(Option<Removal>),
	/// A patch produced by a custom node's widget, to be applied by the same widget.
	Custom { widget: Rc<dyn Any>, patch: Opaque },
}

impl Debug for PatchKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			PatchKind::Redraw(node) => f.debug_tuple("Redraw").field(node).finish(),
			PatchKind::Facts(diff) => f.debug_tuple("Facts").field(diff).finish(),
			PatchKind::Text(text) => f.debug_tuple("Text").field(text).finish(),
			PatchKind::Lazy(patches) => f.debug_tuple("Lazy").field(patches).finish(),
			PatchKind::Taggers(taggers) => write!(f, "Taggers({})", taggers.len()),
			PatchKind::RemoveLast { from, count } => f.debug_struct("RemoveLast").field("from", from).field("count", count).finish(),
			PatchKind::Append { from, children } => f.debug_struct("Append").field("from", from).field("children", children).finish(),
			PatchKind::Reorder(reorder) => f.debug_tuple("Reorder").field(reorder).finish(),
			PatchKind::Remove(removal) => f.debug_tuple("Remove").field(removal).finish(),
			PatchKind::Custom { patch, .. } => f.debug_struct("Custom").field("patch", patch).finish_non_exhaustive(),
		}
	}
}

/// Index into [`Reorder::entries`].
pub type EntryId = usize;

#[derive(Debug)]
pub struct Reorder {
	/// Patches for children of the reordered node, including every [`PatchKind::Remove`].
	pub local: Vec<Patch>,
	pub inserts: Vec<Insert>,
	/// Children appended after all others, in order. `None` iff there are none.
	pub end_inserts: Option<Vec<EntryId>>,
	pub entries: Vec<Entry>,
}

#[derive(Debug)]
pub struct Insert {
	/// Target position among the new children.
	pub index: usize,
	pub entry: EntryId,
}

#[derive(Debug)]
pub struct Removal {
	/// Patches turning the moved node into its new version, indexed in the old tree.
	pub patches: Vec<Patch>,
	pub entry: EntryId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryStatus {
	Inserted,
	Removed,
	Moved,
}

/// Per-key bookkeeping of a keyed diff.
#[derive(Debug)]
pub struct Entry {
	pub status: EntryStatus,
	/// The new node of inserted entries, the old node of removed ones.
	pub node: Node,
	/// The old position of removed entries, the new position of inserted or moved ones.
	/// `None` for entries moved to the end.
	pub index: Option<usize>,
}

/// Changed facts. Removals are explicit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FactsDiff {
	pub events: HashMap<String, Option<Handler>>,
	/// An empty value removes the style.
	pub styles: HashMap<String, String>,
	/// Removed properties are reset to `""` (if they were strings) or `null`.
	pub properties: HashMap<String, Value>,
	pub attributes: HashMap<String, Option<String>>,
	pub attributes_ns: HashMap<String, (String, Option<String>)>,
}

impl FactsDiff {
	/// The number of changed keys across all categories.
	#[must_use]
	pub fn len(&self) -> usize {
		self.events.len() + self.styles.len() + self.properties.len() + self.attributes.len() + self.attributes_ns.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl PatchKind {
	/// A short name for logging.
	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			PatchKind::Redraw(_) => "redraw",
			PatchKind::Facts(_) => "facts",
			PatchKind::Text(_) => "text",
			PatchKind::Lazy(_) => "lazy",
			PatchKind::Taggers(_) => "taggers",
			PatchKind::RemoveLast { .. } => "remove-last",
			PatchKind::Append { .. } => "append",
			PatchKind::Reorder(_) => "reorder",
			PatchKind::Remove(_) => "remove",
			PatchKind::Custom { .. } => "custom",
		}
	}
}
