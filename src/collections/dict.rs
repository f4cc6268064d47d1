//! A persistent ordered map backed by a left-leaning red-black tree.
//!
//! Insertion and removal rebuild only the path to the affected key and rebalance with
//! [`balance`], [`move_red_left`] and [`move_red_right`].

use core::{
	cmp::Ordering,
	fmt::{self, Debug, Formatter},
	iter::FromIterator,
};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
	Red,
	Black,
}

type Tree<K, V> = Option<Rc<Node<K, V>>>;

struct Node<K, V> {
	color: Color,
	key: K,
	value: V,
	left: Tree<K, V>,
	right: Tree<K, V>,
}

fn node<K, V>(color: Color, key: K, value: V, left: Tree<K, V>, right: Tree<K, V>) -> Tree<K, V> {
	Some(Rc::new(Node { color, key, value, left, right }))
}

fn is_red<K, V>(tree: &Tree<K, V>) -> bool {
	matches!(tree, Some(node) if node.color == Color::Red)
}

fn is_black_node<K, V>(tree: &Tree<K, V>) -> bool {
	matches!(tree, Some(node) if node.color == Color::Black)
}

/// The same node with a different color. Children are shared.
fn paint<K: Clone, V: Clone>(color: Color, n: &Node<K, V>) -> Tree<K, V> {
	node(color, n.key.clone(), n.value.clone(), n.left.clone(), n.right.clone())
}

fn balance<K: Clone, V: Clone>(color: Color, key: K, value: V, left: Tree<K, V>, right: Tree<K, V>) -> Tree<K, V> {
	match &right {
		Some(r) if r.color == Color::Red => match &left {
			Some(l) if l.color == Color::Red => node(Color::Red, key, value, paint(Color::Black, l), paint(Color::Black, r)),
			_ => node(
				color,
				r.key.clone(),
				r.value.clone(),
				node(Color::Red, key, value, left, r.left.clone()),
				r.right.clone(),
			),
		},
		_ => match &left {
			Some(l) if l.color == Color::Red && is_red(&l.left) => {
				let ll = l.left.as_ref().expect("checked by `is_red`");
				node(
					Color::Red,
					l.key.clone(),
					l.value.clone(),
					paint(Color::Black, ll),
					node(Color::Black, key, value, l.right.clone(), right),
				)
			}
			_ => node(color, key, value, left, right),
		},
	}
}

fn insert_help<K: Ord + Clone, V: Clone>(key: K, value: V, tree: &Tree<K, V>) -> Tree<K, V> {
	match tree {
		None => node(Color::Red, key, value, None, None),
		Some(n) => match key.cmp(&n.key) {
			Ordering::Less => balance(n.color, n.key.clone(), n.value.clone(), insert_help(key, value, &n.left), n.right.clone()),
			Ordering::Equal => node(n.color, n.key.clone(), value, n.left.clone(), n.right.clone()),
			Ordering::Greater => balance(n.color, n.key.clone(), n.value.clone(), n.left.clone(), insert_help(key, value, &n.right)),
		},
	}
}

fn move_red_left<K: Clone, V: Clone>(tree: &Tree<K, V>) -> Tree<K, V> {
	let n = match tree {
		Some(n) => n,
		None => return None,
	};
	match (&n.left, &n.right) {
		(Some(l), Some(r)) => match &r.left {
			Some(rl) if rl.color == Color::Red => node(
				Color::Red,
				rl.key.clone(),
				rl.value.clone(),
				node(Color::Black, n.key.clone(), n.value.clone(), paint(Color::Red, l), rl.left.clone()),
				node(Color::Black, r.key.clone(), r.value.clone(), rl.right.clone(), r.right.clone()),
			),
			_ => node(Color::Black, n.key.clone(), n.value.clone(), paint(Color::Red, l), paint(Color::Red, r)),
		},
		_ => tree.clone(),
	}
}

fn move_red_right<K: Clone, V: Clone>(tree: &Tree<K, V>) -> Tree<K, V> {
	let n = match tree {
		Some(n) => n,
		None => return None,
	};
	match (&n.left, &n.right) {
		(Some(l), Some(r)) => match &l.left {
			Some(ll) if ll.color == Color::Red => node(
				Color::Red,
				l.key.clone(),
				l.value.clone(),
				paint(Color::Black, ll),
				node(Color::Black, n.key.clone(), n.value.clone(), l.right.clone(), paint(Color::Red, r)),
			),
			_ => node(Color::Black, n.key.clone(), n.value.clone(), paint(Color::Red, l), paint(Color::Red, r)),
		},
		_ => tree.clone(),
	}
}

fn remove_help<K: Ord + Clone, V: Clone>(target: &K, tree: &Tree<K, V>) -> Tree<K, V> {
	let n = match tree {
		Some(n) => n,
		None => return None,
	};
	if *target < n.key {
		match &n.left {
			Some(l) if l.color == Color::Black => {
				if is_red(&l.left) {
					node(n.color, n.key.clone(), n.value.clone(), remove_help(target, &n.left), n.right.clone())
				} else {
					match move_red_left(tree) {
						Some(m) => balance(m.color, m.key.clone(), m.value.clone(), remove_help(target, &m.left), m.right.clone()),
						None => None,
					}
				}
			}
			_ => node(n.color, n.key.clone(), n.value.clone(), remove_help(target, &n.left), n.right.clone()),
		}
	} else {
		remove_help_eq_gt(target, &remove_help_prep_eq_gt(tree, n))
	}
}

fn remove_help_prep_eq_gt<K: Clone, V: Clone>(tree: &Tree<K, V>, n: &Node<K, V>) -> Tree<K, V> {
	match &n.left {
		Some(l) if l.color == Color::Red => node(
			n.color,
			l.key.clone(),
			l.value.clone(),
			l.left.clone(),
			node(Color::Red, n.key.clone(), n.value.clone(), l.right.clone(), n.right.clone()),
		),
		_ => match &n.right {
			Some(r) if r.color == Color::Black && (r.left.is_none() || is_black_node(&r.left)) => move_red_right(tree),
			_ => tree.clone(),
		},
	}
}

fn remove_help_eq_gt<K: Ord + Clone, V: Clone>(target: &K, tree: &Tree<K, V>) -> Tree<K, V> {
	let n = match tree {
		Some(n) => n,
		None => return None,
	};
	if *target == n.key {
		match get_min(&n.right) {
			Some(min) => balance(n.color, min.key.clone(), min.value.clone(), n.left.clone(), remove_min(&n.right)),
			None => None,
		}
	} else {
		balance(n.color, n.key.clone(), n.value.clone(), n.left.clone(), remove_help(target, &n.right))
	}
}

fn get_min<K, V>(tree: &Tree<K, V>) -> Option<&Rc<Node<K, V>>> {
	let mut current = tree.as_ref()?;
	while let Some(left) = &current.left {
		current = left;
	}
	Some(current)
}

fn remove_min<K: Clone, V: Clone>(tree: &Tree<K, V>) -> Tree<K, V> {
	let n = match tree {
		Some(n) => n,
		None => return None,
	};
	match &n.left {
		None => None,
		Some(l) if l.color == Color::Black => {
			if is_red(&l.left) {
				node(n.color, n.key.clone(), n.value.clone(), remove_min(&n.left), n.right.clone())
			} else {
				match move_red_left(tree) {
					Some(m) => balance(m.color, m.key.clone(), m.value.clone(), remove_min(&m.left), m.right.clone()),
					None => None,
				}
			}
		}
		Some(_) => node(n.color, n.key.clone(), n.value.clone(), remove_min(&n.left), n.right.clone()),
	}
}

fn blacken_root<K: Clone, V: Clone>(tree: Tree<K, V>) -> Tree<K, V> {
	match &tree {
		Some(n) if n.color == Color::Red => paint(Color::Black, n),
		_ => tree,
	}
}

/// A persistent ordered map.
pub struct Dict<K, V> {
	root: Tree<K, V>,
	len: usize,
}

impl<K, V> Clone for Dict<K, V> {
	fn clone(&self) -> Self {
		Self {
			root: self.root.clone(),
			len: self.len,
		}
	}
}

impl<K, V> Default for Dict<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K, V> Dict<K, V> {
	#[must_use]
	pub fn new() -> Self {
		Self { root: None, len: 0 }
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.root.is_none()
	}

	/// In-order (ascending key) traversal.
	pub fn iter(&self) -> Iter<'_, K, V> {
		let mut iter = Iter { stack: Vec::new() };
		iter.push_left(&self.root);
		iter
	}

	pub fn keys(&self) -> impl Iterator<Item = &K> {
		self.iter().map(|(k, _)| k)
	}

	pub fn values(&self) -> impl Iterator<Item = &V> {
		self.iter().map(|(_, v)| v)
	}

	/// Checks the left-leaning red-black invariants, returning the black height of the tree.
	///
	/// # Errors
	///
	/// Describes the first violation found: a red root, a red right child, a red node with a red
	/// child, or unequal black heights between sibling subtrees.
	pub fn validate(&self) -> Result<usize, String> {
		fn walk<K, V>(tree: &Tree<K, V>, parent_red: bool) -> Result<usize, String> {
			match tree {
				None => Ok(1),
				Some(n) => {
					let red = n.color == Color::Red;
					if red && parent_red {
						return Err("red node with a red parent".to_owned());
					}
					if is_red(&n.right) {
						return Err("red right child".to_owned());
					}
					let left = walk(&n.left, red)?;
					let right = walk(&n.right, red)?;
					if left != right {
						return Err(format!("unequal black heights {} and {}", left, right));
					}
					Ok(left + if red { 0 } else { 1 })
				}
			}
		}
		if is_red(&self.root) {
			return Err("red root".to_owned());
		}
		walk(&self.root, false)
	}
}

impl<K: Ord, V> Dict<K, V> {
	#[must_use]
	pub fn get(&self, key: &K) -> Option<&V> {
		let mut current = &self.root;
		while let Some(n) = current {
			current = match key.cmp(&n.key) {
				Ordering::Less => &n.left,
				Ordering::Equal => return Some(&n.value),
				Ordering::Greater => &n.right,
			};
		}
		None
	}

	#[must_use]
	pub fn contains_key(&self, key: &K) -> bool {
		self.get(key).is_some()
	}
}

impl<K: Ord + Clone, V: Clone> Dict<K, V> {
	#[must_use]
	pub fn singleton(key: K, value: V) -> Self {
		Self::new().insert(key, value)
	}

	/// Returns a new map with `key` bound to `value`, replacing any previous binding.
	#[must_use]
	pub fn insert(&self, key: K, value: V) -> Self {
		let len = if self.contains_key(&key) { self.len } else { self.len + 1 };
		Self {
			root: blacken_root(insert_help(key, value, &self.root)),
			len,
		}
	}

	/// Returns a new map without `key`. Missing keys leave the map unchanged.
	#[must_use]
	pub fn remove(&self, key: &K) -> Self {
		if !self.contains_key(key) {
			return self.clone();
		}
		Self {
			root: blacken_root(remove_help(key, &self.root)),
			len: self.len - 1,
		}
	}

	#[must_use]
	pub fn update(&self, key: K, f: impl FnOnce(Option<&V>) -> Option<V>) -> Self {
		match f(self.get(&key)) {
			Some(value) => self.insert(key, value),
			None => self.remove(&key),
		}
	}

	/// Ascending `(key, value)` pairs.
	#[must_use]
	pub fn to_list(&self) -> Vec<(K, V)> {
		self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
	}
}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for Dict<K, V> {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		iter.into_iter().fold(Self::new(), |dict, (k, v)| dict.insert(k, v))
	}
}

impl<K: PartialEq, V: PartialEq> PartialEq for Dict<K, V> {
	fn eq(&self, other: &Self) -> bool {
		self.len == other.len && self.iter().zip(other.iter()).all(|(a, b)| a == b)
	}
}

impl<K: Debug, V: Debug> Debug for Dict<K, V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.iter()).finish()
	}
}

pub struct Iter<'a, K, V> {
	stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
	fn push_left(&mut self, mut tree: &'a Tree<K, V>) {
		while let Some(n) = tree {
			self.stack.push(n);
			tree = &n.left;
		}
	}
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
	type Item = (&'a K, &'a V);

	fn next(&mut self) -> Option<Self::Item> {
		let n = self.stack.pop()?;
		self.push_left(&n.right);
		Some((&n.key, &n.value))
	}
}
