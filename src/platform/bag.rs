//! Effect descriptions as plain data.

use crate::opaque::{Opaque, Tagger};
use core::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// A tree of effects for one or more managers, addressed by manager name.
#[derive(Clone)]
pub enum Bag {
	Leaf { home: Rc<str>, value: Opaque },
	Batch(Vec<Bag>),
	/// Applies the tagger to every message the subtree's effects produce.
	Map(Tagger, Box<Bag>),
}

impl Debug for Bag {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Bag::Leaf { home, value } => f.debug_struct("Leaf").field("home", home).field("value", value).finish(),
			Bag::Batch(bags) => f.debug_tuple("Batch").field(bags).finish(),
			Bag::Map(_, bag) => f.debug_tuple("Map").field(&"..").field(bag).finish(),
		}
	}
}

macro_rules! bag_newtype {
	($(#[$attr:meta])* $name:ident) => {
		$(#[$attr])*
		#[derive(Clone, Debug)]
		pub struct $name(pub(crate) Bag);

		impl $name {
			#[must_use]
			pub fn none() -> Self {
				Self(Bag::Batch(Vec::new()))
			}

			#[must_use]
			pub fn batch(items: Vec<Self>) -> Self {
				Self(Bag::Batch(items.into_iter().map(|item| item.0).collect()))
			}

			/// A single effect for the manager named `home`.
			#[must_use]
			pub fn leaf(home: &str, value: Opaque) -> Self {
				Self(Bag::Leaf {
					home: home.into(),
					value,
				})
			}

			#[must_use]
			pub fn map(self, tagger: Tagger) -> Self {
				Self(Bag::Map(tagger, Box::new(self.0)))
			}

			#[must_use]
			pub fn bag(&self) -> &Bag {
				&self.0
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self::none()
			}
		}
	};
}

bag_newtype!(
	/// Commands: effects to perform once.
	Cmd
);
bag_newtype!(
	/// Subscriptions: effects to keep up for as long as they are returned.
	Sub
);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn none_is_an_empty_batch() {
		assert!(matches!(Cmd::none().bag(), Bag::Batch(bags) if bags.is_empty()));
		assert!(matches!(Sub::default().bag(), Bag::Batch(bags) if bags.is_empty()));
	}

	#[test]
	fn batches_keep_their_order() {
		let cmd = Cmd::batch(vec![Cmd::leaf("a", Opaque::new(1)), Cmd::leaf("b", Opaque::new(2))]);
		match cmd.bag() {
			Bag::Batch(bags) => {
				let homes: Vec<&str> = bags
					.iter()
					.map(|bag| match bag {
						Bag::Leaf { home, .. } => &**home,
						_ => panic!("not a leaf"),
					})
					.collect();
				assert_eq!(homes, ["a", "b"]);
			}
			other => panic!("{:?}", other),
		}
	}
}
