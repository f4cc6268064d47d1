use core::{
	fmt::{self, Debug, Formatter},
	iter::FromIterator,
};
use std::rc::Rc;

/// An immutable singly-linked list.
///
/// [`List::cons`] and [`List::append`] share their tails with the input lists.
pub struct List<T> {
	head: Option<Rc<Cons<T>>>,
	len: usize,
}

struct Cons<T> {
	value: T,
	next: List<T>,
}

impl<T> Clone for List<T> {
	fn clone(&self) -> Self {
		Self {
			head: self.head.clone(),
			len: self.len,
		}
	}
}

impl<T> Default for List<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> List<T> {
	#[must_use]
	pub fn new() -> Self {
		Self { head: None, len: 0 }
	}

	#[must_use]
	pub fn cons(&self, value: T) -> Self {
		Self {
			head: Some(Rc::new(Cons { value, next: self.clone() })),
			len: self.len + 1,
		}
	}

	#[must_use]
	pub fn head(&self) -> Option<&T> {
		self.head.as_ref().map(|cons| &cons.value)
	}

	/// Everything but the head, or [`None`] for the empty list.
	#[must_use]
	pub fn tail(&self) -> Option<&Self> {
		self.head.as_ref().map(|cons| &cons.next)
	}

	/// Head and tail at once.
	#[must_use]
	pub fn uncons(&self) -> Option<(&T, &Self)> {
		self.head.as_ref().map(|cons| (&cons.value, &cons.next))
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.head.is_none()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn iter(&self) -> Iter<'_, T> {
		Iter { next: self.head.as_deref() }
	}

	#[must_use]
	pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> List<U> {
		let values: Vec<U> = self.iter().map(f).collect();
		values.into_iter().rev().fold(List::new(), |acc, value| acc.cons(value))
	}

	#[must_use]
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		match (&a.head, &b.head) {
			(None, None) => true,
			(Some(a), Some(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl<T: Clone> List<T> {
	#[must_use]
	pub fn reverse(&self) -> Self {
		self.iter().fold(Self::new(), |acc, value| acc.cons(value.clone()))
	}

	/// `self` followed by `other`. Only `self`'s cells are copied.
	#[must_use]
	pub fn append(&self, other: &Self) -> Self {
		self.reverse().iter().fold(other.clone(), |acc, value| acc.cons(value.clone()))
	}

	#[must_use]
	pub fn to_vec(&self) -> Vec<T> {
		self.iter().cloned().collect()
	}
}

impl<T> FromIterator<T> for List<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		let items: Vec<T> = iter.into_iter().collect();
		items.into_iter().rev().fold(Self::new(), |acc, value| acc.cons(value))
	}
}

impl<T: PartialEq> PartialEq for List<T> {
	fn eq(&self, other: &Self) -> bool {
		self.len == other.len && self.iter().zip(other.iter()).all(|(a, b)| a == b)
	}
}
impl<T: Eq> Eq for List<T> {}

impl<T: Debug> Debug for List<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

impl<T> Drop for List<T> {
	fn drop(&mut self) {
		// Unlink iteratively so that dropping a long list doesn't overflow the stack.
		let mut next = self.head.take();
		while let Some(cons) = next {
			match Rc::try_unwrap(cons) {
				Ok(mut cons) => next = cons.next.head.take(),
				Err(_) => break,
			}
		}
	}
}

pub struct Iter<'a, T> {
	next: Option<&'a Cons<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
	type Item = &'a T;

	fn next(&mut self) -> Option<Self::Item> {
		self.next.map(|cons| {
			self.next = cons.next.head.as_deref();
			&cons.value
		})
	}
}

impl<'a, T> IntoIterator for &'a List<T> {
	type Item = &'a T;
	type IntoIter = Iter<'a, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}
