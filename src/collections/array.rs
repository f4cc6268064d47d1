//! A persistent vector: a trie of 32-element nodes plus a tail buffer.
//!
//! Indices are split into 5-bit digit groups, one per trie level. The last partial leaf lives in
//! `tail` so that [`Array::push`] only touches the trie once every 32 elements.

use core::{
	fmt::{self, Debug, Formatter},
	iter::FromIterator,
};
use std::rc::Rc;

pub const BRANCH_FACTOR: usize = 32;
const SHIFT_STEP: u32 = 5;
const BIT_MASK: usize = BRANCH_FACTOR - 1;

enum Node<T> {
	SubTree(Rc<Vec<Node<T>>>),
	Leaf(Rc<Vec<T>>),
}

impl<T> Clone for Node<T> {
	fn clone(&self) -> Self {
		match self {
			Node::SubTree(nodes) => Node::SubTree(nodes.clone()),
			Node::Leaf(values) => Node::Leaf(values.clone()),
		}
	}
}

pub struct Array<T> {
	len: usize,
	start_shift: u32,
	tree: Rc<Vec<Node<T>>>,
	tail: Rc<Vec<T>>,
}

impl<T> Clone for Array<T> {
	fn clone(&self) -> Self {
		Self {
			len: self.len,
			start_shift: self.start_shift,
			tree: self.tree.clone(),
			tail: self.tail.clone(),
		}
	}
}

impl<T> Default for Array<T> {
	fn default() -> Self {
		Self::new()
	}
}

fn tail_index(len: usize) -> usize {
	(len >> SHIFT_STEP) << SHIFT_STEP
}

impl<T> Array<T> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			len: 0,
			start_shift: SHIFT_STEP,
			tree: Rc::new(Vec::new()),
			tail: Rc::new(Vec::new()),
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	#[must_use]
	pub fn get(&self, index: usize) -> Option<&T> {
		if index >= self.len {
			None
		} else if index >= tail_index(self.len) {
			self.tail.get(index & BIT_MASK)
		} else {
			let mut shift = self.start_shift;
			let mut nodes = &self.tree;
			loop {
				match nodes.get((index >> shift) & BIT_MASK)? {
					Node::SubTree(sub) => {
						nodes = sub;
						shift -= SHIFT_STEP;
					}
					Node::Leaf(values) => return values.get(index & BIT_MASK),
				}
			}
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &T> {
		let mut leaves = Vec::with_capacity(self.len / BRANCH_FACTOR);
		collect_leaves(&self.tree, &mut leaves);
		leaves.into_iter().flat_map(|leaf| leaf.iter()).chain(self.tail.iter())
	}
}

fn collect_leaves<'a, T>(nodes: &'a [Node<T>], leaves: &mut Vec<&'a Vec<T>>) {
	for node in nodes {
		match node {
			Node::SubTree(sub) => collect_leaves(sub, leaves),
			Node::Leaf(values) => leaves.push(values),
		}
	}
}

impl<T: Clone> Array<T> {
	#[must_use]
	pub fn initialize(len: usize, f: impl FnMut(usize) -> T) -> Self {
		(0..len).map(f).collect()
	}

	#[must_use]
	pub fn repeat(len: usize, value: &T) -> Self {
		Self::initialize(len, |_| value.clone())
	}

	/// Returns a new array with `value` appended.
	#[must_use]
	pub fn push(&self, value: T) -> Self {
		let mut tail = self.tail.clone();
		Rc::make_mut(&mut tail).push(value);
		self.replace_tail(tail)
	}

	fn replace_tail(&self, new_tail: Rc<Vec<T>>) -> Self {
		let new_len = self.len + new_tail.len() - self.tail.len();
		if new_tail.len() == BRANCH_FACTOR {
			let overflow = (new_len >> SHIFT_STEP) > (1 << self.start_shift);
			if overflow {
				let new_shift = self.start_shift + SHIFT_STEP;
				let root = vec![Node::SubTree(self.tree.clone())];
				Self {
					len: new_len,
					start_shift: new_shift,
					tree: insert_tail_in_tree(new_shift, self.len, new_tail, &root),
					tail: Rc::new(Vec::new()),
				}
			} else {
				Self {
					len: new_len,
					start_shift: self.start_shift,
					tree: insert_tail_in_tree(self.start_shift, self.len, new_tail, &self.tree),
					tail: Rc::new(Vec::new()),
				}
			}
		} else {
			Self {
				len: new_len,
				start_shift: self.start_shift,
				tree: self.tree.clone(),
				tail: new_tail,
			}
		}
	}

	/// Returns a new array with the element at `index` replaced. Out-of-range indices return
	/// an unchanged copy.
	#[must_use]
	pub fn set(&self, index: usize, value: T) -> Self {
		if index >= self.len {
			return self.clone();
		}
		let mut result = self.clone();
		if index >= tail_index(self.len) {
			Rc::make_mut(&mut result.tail)[index & BIT_MASK] = value;
		} else {
			result.tree = set_help(self.start_shift, index, value, &self.tree);
		}
		result
	}

	#[must_use]
	pub fn to_vec(&self) -> Vec<T> {
		self.iter().cloned().collect()
	}
}

fn insert_tail_in_tree<T>(shift: u32, index: usize, tail: Rc<Vec<T>>, tree: &[Node<T>]) -> Rc<Vec<Node<T>>> {
	let pos = (index >> shift) & BIT_MASK;
	let mut tree = tree.to_vec();
	if pos >= tree.len() {
		if shift == SHIFT_STEP {
			tree.push(Node::Leaf(tail));
		} else {
			let sub = insert_tail_in_tree(shift - SHIFT_STEP, index, tail, &[]);
			tree.push(Node::SubTree(sub));
		}
	} else {
		let sub = match &tree[pos] {
			Node::SubTree(sub) => insert_tail_in_tree(shift - SHIFT_STEP, index, tail, sub),
			leaf @ Node::Leaf(_) => insert_tail_in_tree(shift - SHIFT_STEP, index, tail, &[leaf.clone()]),
		};
		tree[pos] = Node::SubTree(sub);
	}
	Rc::new(tree)
}

fn set_help<T: Clone>(shift: u32, index: usize, value: T, tree: &Rc<Vec<Node<T>>>) -> Rc<Vec<Node<T>>> {
	let pos = (index >> shift) & BIT_MASK;
	let mut tree = tree.clone();
	let nodes = Rc::make_mut(&mut tree);
	nodes[pos] = match &nodes[pos] {
		Node::SubTree(sub) => Node::SubTree(set_help(shift - SHIFT_STEP, index, value, sub)),
		Node::Leaf(values) => {
			let mut values = values.clone();
			Rc::make_mut(&mut values)[index & BIT_MASK] = value;
			Node::Leaf(values)
		}
	};
	tree
}

impl<T: Clone> FromIterator<T> for Array<T> {
	/// Builds the trie bottom-up: full leaves first, then groups of 32 nodes compressed into
	/// subtrees until a single root level remains.
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		let mut leaves = Vec::new();
		let mut tail = Vec::with_capacity(BRANCH_FACTOR);
		for value in iter {
			tail.push(value);
			if tail.len() == BRANCH_FACTOR {
				leaves.push(Node::Leaf(Rc::new(core::mem::replace(&mut tail, Vec::with_capacity(BRANCH_FACTOR)))));
			}
		}

		if leaves.is_empty() {
			return Self {
				len: tail.len(),
				start_shift: SHIFT_STEP,
				tree: Rc::new(Vec::new()),
				tail: Rc::new(tail),
			};
		}

		let tree_len = leaves.len() * BRANCH_FACTOR;
		let mut depth = 0;
		let mut remaining = tree_len - 1;
		while remaining >= BRANCH_FACTOR {
			remaining /= BRANCH_FACTOR;
			depth += 1;
		}

		let mut nodes = leaves;
		while nodes.len() > BRANCH_FACTOR {
			nodes = compress_nodes(nodes);
		}

		Self {
			len: tree_len + tail.len(),
			start_shift: SHIFT_STEP.max(depth * SHIFT_STEP),
			tree: Rc::new(nodes),
			tail: Rc::new(tail),
		}
	}
}

fn compress_nodes<T>(nodes: Vec<Node<T>>) -> Vec<Node<T>> {
	let mut compressed = Vec::with_capacity((nodes.len() + BRANCH_FACTOR - 1) / BRANCH_FACTOR);
	let mut group = Vec::with_capacity(BRANCH_FACTOR);
	for node in nodes {
		group.push(node);
		if group.len() == BRANCH_FACTOR {
			compressed.push(Node::SubTree(Rc::new(core::mem::replace(&mut group, Vec::with_capacity(BRANCH_FACTOR)))));
		}
	}
	if !group.is_empty() {
		compressed.push(Node::SubTree(Rc::new(group)));
	}
	compressed
}

impl<T: PartialEq> PartialEq for Array<T> {
	fn eq(&self, other: &Self) -> bool {
		self.len == other.len && self.iter().zip(other.iter()).all(|(a, b)| a == b)
	}
}

impl<T: Debug> Debug for Array<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}
