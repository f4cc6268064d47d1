//! The virtual DOM: node trees, diffing, and patching an injected host tree.
//!
//! ```
//! use std::rc::Rc;
//! use vdom_runtime::{
//! 	opaque::Opaque,
//! 	vdom::{apply_patches, diff, memory::MemoryDom, render, EventNode, Fact, Node},
//! };
//!
//! let view = |count: usize| {
//! 	Node::element(
//! 		"ul",
//! 		vec![Fact::attribute("class", "items")],
//! 		(0..count).map(|i| Node::element("li", vec![], vec![Node::text(i.to_string())])).collect(),
//! 	)
//! };
//!
//! let mut dom = MemoryDom::new();
//! let events = EventNode::root(Rc::new(|_: Opaque| ()));
//! let old = view(1);
//! let root = render(&mut dom, &old, &events);
//!
//! let new = view(3);
//! let root = apply_patches(&mut dom, &root, &old, &diff(&old, &new), &events);
//! assert_eq!(dom.to_markup(root), r#"<ul class="items"><li>0</li><li>1</li><li>2</li></ul>"#);
//! ```

pub mod apply;
pub mod diff;
pub mod dom;
pub mod memory;
pub mod node;
pub mod patch;
pub mod render;

pub use apply::apply_patches;
pub use diff::diff;
pub use dom::{Dom, EventNode, EventOutcome, Listener};
pub use node::{CustomHandling, Fact, Facts, Handler, LazyRef, Node, Widget};
pub use patch::{Patch, PatchKind};
pub use render::render;

use crate::platform::SendToApp;
use core::cell::RefCell;
use std::rc::Rc;
use tracing::instrument;

/// Keeps a host subtree in sync with successive virtual trees.
pub struct Renderer<D: Dom> {
	dom: Rc<RefCell<D>>,
	root: D::Handle,
	current: Node,
	events: Rc<EventNode>,
}

impl<D: Dom> Renderer<D> {
	/// Renders `node` and appends it to `container`.
	pub fn mount(dom: Rc<RefCell<D>>, container: &D::Handle, node: Node, send_to_app: SendToApp) -> Self {
		let events = EventNode::root(send_to_app);
		let root = {
			let mut host = dom.borrow_mut();
			let root = render(&mut *host, &node, &events);
			host.append_child(container, &root);
			root
		};
		Self {
			dom,
			root,
			current: node,
			events,
		}
	}

	/// Takes over `root`, which must already look like `current`.
	///
	/// With the `web` feature, `web::virtualize` reads such a tree back from the page.
	pub fn adopt(dom: Rc<RefCell<D>>, root: D::Handle, current: Node, send_to_app: SendToApp) -> Self {
		Self {
			dom,
			root,
			current,
			events: EventNode::root(send_to_app),
		}
	}

	/// Patches the host tree to match `next`.
	///
	/// # Panics
	///
	/// Iff the host tree is already borrowed, i.e. when called from inside a host mutation.
	#[instrument(skip(self, next))]
	pub fn draw(&mut self, next: Node) {
		let patches = diff(&self.current, &next);
		if !patches.is_empty() {
			let mut host = self.dom.borrow_mut();
			self.root = apply_patches(&mut *host, &self.root, &self.current, &patches, &self.events);
		}
		self.current = next;
	}

	#[must_use]
	pub fn root(&self) -> &D::Handle {
		&self.root
	}

	#[must_use]
	pub fn current(&self) -> &Node {
		&self.current
	}
}
