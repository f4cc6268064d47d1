//! Type-erased values for the dynamically-typed seams of the runtime.
//!
//! Messages, task results, process mailboxes and effect payloads all pass through closures that
//! change their type along the way (taggers, continuations), so they travel as [`Opaque`].

use core::{
	any::{type_name, Any},
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;

/// A cheaply clonable, reference-counted value of any `'static` type.
///
/// Equality via [`Opaque::ptr_eq`] is **identity**, which is what lazy nodes and the
/// scheduler's bookkeeping compare by.
#[derive(Clone)]
pub struct Opaque {
	value: Rc<dyn Any>,
	type_name: &'static str,
}

impl Opaque {
	pub fn new<T: Any>(value: T) -> Self {
		Self {
			value: Rc::new(value),
			type_name: type_name::<T>(),
		}
	}

	/// Wraps an existing [`Rc`] without reallocating, so identity is shared with `value`.
	pub fn from_rc<T: Any>(value: Rc<T>) -> Self {
		Self {
			value,
			type_name: type_name::<T>(),
		}
	}

	#[must_use]
	pub fn unit() -> Self {
		Self::new(())
	}

	#[must_use]
	pub fn is<T: Any>(&self) -> bool {
		self.value.is::<T>()
	}

	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.value.downcast_ref()
	}

	/// Clones the contained value out.
	///
	/// # Panics
	///
	/// Iff the contained value is not a `T`. A mismatch here is a programming error in the
	/// taggers or continuations that produced this value.
	#[must_use]
	pub fn get<T: Any + Clone>(&self) -> T {
		match self.downcast_ref::<T>() {
			Some(value) => value.clone(),
			None => {
				tracing::error!(expected = type_name::<T>(), found = self.type_name, "Opaque value type mismatch");
				panic!("Expected an opaque `{}` but found `{}`.", type_name::<T>(), self.type_name)
			}
		}
	}

	#[must_use]
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	#[must_use]
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.value, &b.value)
	}
}

impl Debug for Opaque {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Opaque<{}>@{:p}", self.type_name, Rc::as_ptr(&self.value) as *const ())
	}
}

/// Translates a message from a nested component's type into its parent's.
pub type Tagger = Rc<dyn Fn(Opaque) -> Opaque>;

/// Identity comparison for reference-counted closures.
///
/// Only the data pointer is compared, since vtable pointers for the same closure type are not
/// guaranteed to be unique across codegen units.
#[must_use]
pub fn same_rc<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
	Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}
