//! Composable JSON decoders.
//!
//! A [`Decoder<T>`] is a description, not a closure: decoders built the same way compare equal,
//! which lets the facts diff keep event listeners whose handlers did not change.
//! Functions passed to [`map`], [`Decoder::and_then`] etc. compare by identity, except that two
//! non-capturing closures or `fn` items of the same type are always considered equal.

use super::encode;
use crate::{
	collections::{Array, Dict},
	opaque::same_rc,
};
use core::{
	any::{type_name, Any, TypeId},
	fmt::{self, Display, Formatter},
	iter::FromIterator,
	marker::PhantomData,
	mem::size_of,
};
use serde_json::Value;
use std::rc::Rc;
use tracing::{error, instrument};

type Boxed = Box<dyn Any>;

/// A decoding failure, with the path at which it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
	Field(String, Box<Error>),
	Index(usize, Box<Error>),
	/// Every alternative of a [`one_of`], in order.
	OneOf(Vec<Error>),
	Failure(String, Value),
}

impl std::error::Error for Error {}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&error_to_string(self, Vec::new()))
	}
}

fn indent(text: &str) -> String {
	text.split('\n').collect::<Vec<_>>().join("\n    ")
}

fn is_simple_field_name(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric()),
		None => false,
	}
}

fn error_to_string(mut error: &Error, mut context: Vec<String>) -> String {
	loop {
		match error {
			Error::Field(name, inner) => {
				context.push(if is_simple_field_name(name) {
					format!(".{}", name)
				} else {
					format!("['{}']", name)
				});
				error = &**inner;
			}
			Error::Index(index, inner) => {
				context.push(format!("[{}]", index));
				error = &**inner;
			}
			Error::OneOf(errors) => match errors.as_slice() {
				[] => {
					return if context.is_empty() {
						"Ran into a Json.Decode.oneOf with no possibilities!".to_owned()
					} else {
						format!("Ran into a Json.Decode.oneOf with no possibilities at json{}", context.concat())
					}
				}
				[single] => error = single,
				_ => {
					let starter = if context.is_empty() {
						"Json.Decode.oneOf".to_owned()
					} else {
						format!("The Json.Decode.oneOf at json{}", context.concat())
					};
					let mut parts = vec![format!("{} failed in the following {} ways:", starter, errors.len())];
					parts.extend(
						errors
							.iter()
							.enumerate()
							.map(|(i, error)| format!("\n\n({}) {}", i + 1, indent(&error.to_string()))),
					);
					return parts.join("\n\n");
				}
			},
			Error::Failure(message, json) => {
				let introduction = if context.is_empty() {
					"Problem with the given value:\n\n".to_owned()
				} else {
					format!("Problem with the value at json{}:\n\n    ", context.concat())
				};
				return format!("{}{}\n\n{}", introduction, indent(&encode::encode(4, json)), message);
			}
		}
	}
}

fn expecting(what: &str, value: &Value) -> Error {
	Error::Failure(format!("Expecting {}", what), value.clone())
}

/// A type-erased function together with what it compares equal by.
struct Callable<F: ?Sized> {
	call: Rc<F>,
	zero_sized: Option<TypeId>,
}

impl<F: ?Sized> Callable<F> {
	fn new<U: 'static>(call: Rc<F>) -> Self {
		Self {
			call,
			zero_sized: if size_of::<U>() == 0 { Some(TypeId::of::<U>()) } else { None },
		}
	}

	fn same(a: &Self, b: &Self) -> bool {
		match (a.zero_sized, b.zero_sized) {
			(Some(a), Some(b)) => a == b,
			_ => same_rc(&a.call, &b.call),
		}
	}
}

/// A constant produced on every run. Compares by identity.
struct Constant {
	/// Address of the shared value. `produce` keeps it alive, so it can't be reused while compared.
	identity: *const (),
	produce: Rc<dyn Fn() -> Boxed>,
}

impl Constant {
	fn new<T: Any + Clone>(value: T) -> Self {
		let value = Rc::new(value);
		Self {
			identity: Rc::as_ptr(&value) as *const (),
			produce: Rc::new(move || -> Boxed { Box::new(T::clone(&value)) }),
		}
	}

	fn shared<T: ?Sized + 'static>(value: Rc<T>) -> Self {
		Self {
			identity: Rc::as_ptr(&value) as *const (),
			produce: Rc::new(move || -> Boxed { Box::new(Rc::clone(&value)) }),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Primitive {
	String,
	Int,
	Float,
	Bool,
	Value,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Container {
	List,
	Array,
	Pairs,
	Dict,
}

enum Kind {
	Succeed(Constant),
	Fail(String),
	Primitive(Primitive),
	Null(Constant),
	Sequence(Container, Rc<Kind>, Rc<dyn Fn(Vec<Boxed>) -> Boxed>),
	Object(Container, Rc<Kind>, Rc<dyn Fn(Vec<(String, Boxed)>) -> Boxed>),
	Field(String, Rc<Kind>),
	Index(usize, Rc<Kind>),
	Map(Callable<dyn Fn(Vec<Boxed>) -> Boxed>, Vec<Rc<Kind>>),
	AndThen(Callable<dyn Fn(Boxed) -> Rc<Kind>>, Rc<Kind>),
	OneOf(Vec<Rc<Kind>>),
}

fn kind_eq(a: &Kind, b: &Kind) -> bool {
	match (a, b) {
		(Kind::Succeed(a), Kind::Succeed(b)) | (Kind::Null(a), Kind::Null(b)) => a.identity == b.identity,
		(Kind::Fail(a), Kind::Fail(b)) => a == b,
		(Kind::Primitive(a), Kind::Primitive(b)) => a == b,
		(Kind::Sequence(c_a, a, _), Kind::Sequence(c_b, b, _)) | (Kind::Object(c_a, a, _), Kind::Object(c_b, b, _)) => {
			c_a == c_b && kinds_eq(a, b)
		}
		(Kind::Field(f_a, a), Kind::Field(f_b, b)) => f_a == f_b && kinds_eq(a, b),
		(Kind::Index(i_a, a), Kind::Index(i_b, b)) => i_a == i_b && kinds_eq(a, b),
		(Kind::Map(f_a, a), Kind::Map(f_b, b)) => Callable::same(f_a, f_b) && lists_eq(a, b),
		(Kind::AndThen(f_a, a), Kind::AndThen(f_b, b)) => Callable::same(f_a, f_b) && kinds_eq(a, b),
		(Kind::OneOf(a), Kind::OneOf(b)) => lists_eq(a, b),
		_ => false,
	}
}

fn kinds_eq(a: &Rc<Kind>, b: &Rc<Kind>) -> bool {
	Rc::ptr_eq(a, b) || kind_eq(a, b)
}

fn lists_eq(a: &[Rc<Kind>], b: &[Rc<Kind>]) -> bool {
	a.len() == b.len() && a.iter().zip(b).all(|(a, b)| kinds_eq(a, b))
}

fn run(kind: &Kind, value: &Value) -> Result<Boxed, Error> {
	match kind {
		Kind::Succeed(constant) => Ok((constant.produce)()),
		Kind::Fail(message) => Err(Error::Failure(message.clone(), value.clone())),
		Kind::Primitive(primitive) => run_primitive(*primitive, value),
		Kind::Null(constant) => {
			if value.is_null() {
				Ok((constant.produce)())
			} else {
				Err(expecting("null", value))
			}
		}
		Kind::Sequence(container, item, collect) => match value {
			Value::Array(values) => {
				let mut decoded = Vec::with_capacity(values.len());
				for (i, value) in values.iter().enumerate() {
					decoded.push(run(item, value).map_err(|error| Error::Index(i, Box::new(error)))?);
				}
				Ok(collect(decoded))
			}
			_ => Err(expecting(if *container == Container::List { "a LIST" } else { "an ARRAY" }, value)),
		},
		Kind::Object(_, item, collect) => match value {
			Value::Object(entries) => {
				let mut decoded = Vec::with_capacity(entries.len());
				for (key, value) in entries {
					let entry = run(item, value).map_err(|error| Error::Field(key.clone(), Box::new(error)))?;
					decoded.push((key.clone(), entry));
				}
				Ok(collect(decoded))
			}
			_ => Err(expecting("an OBJECT", value)),
		},
		Kind::Field(name, inner) => match value.as_object().and_then(|object| object.get(name)) {
			Some(field) => run(inner, field).map_err(|error| Error::Field(name.clone(), Box::new(error))),
			None => Err(expecting(&format!("an OBJECT with a field named `{}`", name), value)),
		},
		Kind::Index(index, inner) => match value {
			Value::Array(values) => match values.get(*index) {
				Some(item) => run(inner, item).map_err(|error| Error::Index(*index, Box::new(error))),
				None => Err(expecting(
					&format!("a LONGER array. Need index {} but only see {} entries", index, values.len()),
					value,
				)),
			},
			_ => Err(expecting("an ARRAY", value)),
		},
		Kind::Map(f, decoders) => {
			let mut values = Vec::with_capacity(decoders.len());
			for decoder in decoders {
				values.push(run(decoder, value)?);
			}
			Ok((f.call)(values))
		}
		Kind::AndThen(f, inner) => {
			let next = (f.call)(run(inner, value)?);
			run(&next, value)
		}
		Kind::OneOf(decoders) => {
			let mut errors = Vec::with_capacity(decoders.len());
			for decoder in decoders {
				match run(decoder, value) {
					Ok(decoded) => return Ok(decoded),
					Err(error) => errors.push(error),
				}
			}
			Err(Error::OneOf(errors))
		}
	}
}

fn run_primitive(primitive: Primitive, value: &Value) -> Result<Boxed, Error> {
	match primitive {
		Primitive::String => value
			.as_str()
			.map(|s| Box::new(s.to_owned()) as Boxed)
			.ok_or_else(|| expecting("a STRING", value)),
		Primitive::Int => value
			.as_i64()
			.or_else(|| {
				value
					.as_f64()
					.filter(|f| f.is_finite() && f.fract() == 0.0)
					.and_then(num_traits::cast::<f64, i64>)
			})
			.map(|i| Box::new(i) as Boxed)
			.ok_or_else(|| expecting("an INT", value)),
		Primitive::Float => value
			.as_f64()
			.map(|f| Box::new(f) as Boxed)
			.ok_or_else(|| expecting("a FLOAT", value)),
		Primitive::Bool => value
			.as_bool()
			.map(|b| Box::new(b) as Boxed)
			.ok_or_else(|| expecting("a BOOL", value)),
		Primitive::Value => Ok(Box::new(value.clone())),
	}
}

fn take<T: 'static>(value: Boxed) -> T {
	match value.downcast::<T>() {
		Ok(value) => *value,
		Err(_) => {
			error!(expected = type_name::<T>(), "Decoder produced a value of an unexpected type");
			panic!("Decoder produced a value of an unexpected type (expected `{}`).", type_name::<T>())
		}
	}
}

fn next<T: 'static>(values: &mut impl Iterator<Item = Boxed>) -> T {
	match values.next() {
		Some(value) => take(value),
		None => unreachable!("`Kind::Map` arity mismatch"),
	}
}

/// A JSON decoder producing `T`.
pub struct Decoder<T> {
	kind: Rc<Kind>,
	_phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Decoder<T> {
	fn clone(&self) -> Self {
		Self {
			kind: self.kind.clone(),
			_phantom: PhantomData,
		}
	}
}

impl<T> PartialEq for Decoder<T> {
	fn eq(&self, other: &Self) -> bool {
		kinds_eq(&self.kind, &other.kind)
	}
}

impl<T> fmt::Debug for Decoder<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Decoder<{}>@{:p}", type_name::<T>(), Rc::as_ptr(&self.kind))
	}
}

impl<T: 'static> Decoder<T> {
	fn from_kind(kind: Kind) -> Self {
		Self {
			kind: Rc::new(kind),
			_phantom: PhantomData,
		}
	}

	/// Runs this decoder against an already-parsed value.
	///
	/// # Errors
	///
	/// Iff the value does not have the expected shape.
	pub fn decode_value(&self, value: &Value) -> Result<T, Error> {
		run(&self.kind, value).map(take)
	}

	/// Parses `json` and runs this decoder against the result.
	///
	/// # Errors
	///
	/// Iff `json` is not valid JSON (a [`Error::Failure`] carrying the input as a string) or
	/// does not have the expected shape.
	#[instrument(skip(self, json))]
	pub fn decode_string(&self, json: &str) -> Result<T, Error> {
		match serde_json::from_str::<Value>(json) {
			Ok(value) => self.decode_value(&value),
			Err(error) => Err(Error::Failure(
				format!("This is not valid JSON! {}", error),
				Value::String(json.to_owned()),
			)),
		}
	}

	#[must_use]
	pub fn map<U: 'static, F: Fn(T) -> U + 'static>(&self, f: F) -> Decoder<U> {
		let call: Rc<dyn Fn(Vec<Boxed>) -> Boxed> = Rc::new(move |values: Vec<Boxed>| -> Boxed {
			let mut values = values.into_iter();
			Box::new(f(next(&mut values)))
		});
		Decoder::from_kind(Kind::Map(Callable::new::<F>(call), vec![self.kind.clone()]))
	}

	#[must_use]
	pub fn and_then<U: 'static, F: Fn(T) -> Decoder<U> + 'static>(&self, f: F) -> Decoder<U> {
		let call: Rc<dyn Fn(Boxed) -> Rc<Kind>> = Rc::new(move |value: Boxed| f(take(value)).kind);
		Decoder::from_kind(Kind::AndThen(Callable::new::<F>(call), self.kind.clone()))
	}
}

#[must_use]
pub fn succeed<T: Any + Clone>(value: T) -> Decoder<T> {
	Decoder::from_kind(Kind::Succeed(Constant::new(value)))
}

/// Like [`succeed`], but compares by the identity of `value` itself, so two decoders built
/// around the same `Rc` are equal.
#[must_use]
pub fn succeed_shared<T: ?Sized + 'static>(value: Rc<T>) -> Decoder<Rc<T>> {
	Decoder::from_kind(Kind::Succeed(Constant::shared(value)))
}

#[must_use]
pub fn fail<T: 'static>(message: impl Into<String>) -> Decoder<T> {
	Decoder::from_kind(Kind::Fail(message.into()))
}

#[must_use]
pub fn string() -> Decoder<String> {
	Decoder::from_kind(Kind::Primitive(Primitive::String))
}

/// Accepts integers and integral floats.
#[must_use]
pub fn int() -> Decoder<i64> {
	Decoder::from_kind(Kind::Primitive(Primitive::Int))
}

#[must_use]
pub fn float() -> Decoder<f64> {
	Decoder::from_kind(Kind::Primitive(Primitive::Float))
}

#[must_use]
pub fn bool() -> Decoder<bool> {
	Decoder::from_kind(Kind::Primitive(Primitive::Bool))
}

/// Passes the JSON value through unchanged.
#[must_use]
pub fn value() -> Decoder<Value> {
	Decoder::from_kind(Kind::Primitive(Primitive::Value))
}

/// Succeeds with `value` iff the JSON value is `null`.
#[must_use]
pub fn null<T: Any + Clone>(value: T) -> Decoder<T> {
	Decoder::from_kind(Kind::Null(Constant::new(value)))
}

#[must_use]
pub fn nullable<T: Any + Clone>(decoder: &Decoder<T>) -> Decoder<Option<T>> {
	one_of(vec![null(None), decoder.map(Some)])
}

/// Like [`nullable`], but also absorbs any failure of `decoder`.
#[must_use]
pub fn maybe<T: Any + Clone>(decoder: &Decoder<T>) -> Decoder<Option<T>> {
	one_of(vec![decoder.map(Some), succeed(None)])
}

#[must_use]
pub fn list<T: 'static>(decoder: &Decoder<T>) -> Decoder<Vec<T>> {
	Decoder::from_kind(Kind::Sequence(
		Container::List,
		decoder.kind.clone(),
		Rc::new(|values: Vec<Boxed>| -> Boxed { Box::new(values.into_iter().map(take::<T>).collect::<Vec<_>>()) }),
	))
}

#[must_use]
pub fn array<T: Clone + 'static>(decoder: &Decoder<T>) -> Decoder<Array<T>> {
	Decoder::from_kind(Kind::Sequence(
		Container::Array,
		decoder.kind.clone(),
		Rc::new(|values: Vec<Boxed>| -> Boxed { Box::new(values.into_iter().map(take::<T>).collect::<Array<_>>()) }),
	))
}

#[must_use]
pub fn key_value_pairs<T: 'static>(decoder: &Decoder<T>) -> Decoder<Vec<(String, T)>> {
	Decoder::from_kind(Kind::Object(
		Container::Pairs,
		decoder.kind.clone(),
		Rc::new(|entries: Vec<(String, Boxed)>| -> Boxed {
			Box::new(
				entries
					.into_iter()
					.map(|(key, value)| (key, take::<T>(value)))
					.collect::<Vec<_>>(),
			)
		}),
	))
}

#[must_use]
pub fn dict<T: Clone + 'static>(decoder: &Decoder<T>) -> Decoder<Dict<String, T>> {
	Decoder::from_kind(Kind::Object(
		Container::Dict,
		decoder.kind.clone(),
		Rc::new(|entries: Vec<(String, Boxed)>| -> Boxed {
			Box::new(Dict::from_iter(
				entries.into_iter().map(|(key, value)| (key, take::<T>(value))),
			))
		}),
	))
}

#[must_use]
pub fn field<T: 'static>(name: impl Into<String>, decoder: &Decoder<T>) -> Decoder<T> {
	Decoder::from_kind(Kind::Field(name.into(), decoder.kind.clone()))
}

/// Nested [`field`]s, outermost first.
#[must_use]
pub fn at<T: 'static>(path: &[&str], decoder: &Decoder<T>) -> Decoder<T> {
	path.iter().rev().fold(decoder.clone(), |decoder, name| field(*name, &decoder))
}

#[must_use]
pub fn index<T: 'static>(index: usize, decoder: &Decoder<T>) -> Decoder<T> {
	Decoder::from_kind(Kind::Index(index, decoder.kind.clone()))
}

#[must_use]
pub fn map<A: 'static, R: 'static, F: Fn(A) -> R + 'static>(f: F, a: &Decoder<A>) -> Decoder<R> {
	a.map(f)
}

#[must_use]
pub fn map2<A, B, R, F>(f: F, a: &Decoder<A>, b: &Decoder<B>) -> Decoder<R>
where
	A: 'static,
	B: 'static,
	R: 'static,
	F: Fn(A, B) -> R + 'static,
{
	let call: Rc<dyn Fn(Vec<Boxed>) -> Boxed> = Rc::new(move |values: Vec<Boxed>| -> Boxed {
		let mut values = values.into_iter();
		let a = next(&mut values);
		let b = next(&mut values);
		Box::new(f(a, b))
	});
	Decoder::from_kind(Kind::Map(Callable::new::<F>(call), vec![a.kind.clone(), b.kind.clone()]))
}

#[must_use]
pub fn map3<A, B, C, R, F>(f: F, a: &Decoder<A>, b: &Decoder<B>, c: &Decoder<C>) -> Decoder<R>
where
	A: 'static,
	B: 'static,
	C: 'static,
	R: 'static,
	F: Fn(A, B, C) -> R + 'static,
{
	let call: Rc<dyn Fn(Vec<Boxed>) -> Boxed> = Rc::new(move |values: Vec<Boxed>| -> Boxed {
		let mut values = values.into_iter();
		let a = next(&mut values);
		let b = next(&mut values);
		let c = next(&mut values);
		Box::new(f(a, b, c))
	});
	Decoder::from_kind(Kind::Map(
		Callable::new::<F>(call),
		vec![a.kind.clone(), b.kind.clone(), c.kind.clone()],
	))
}

#[must_use]
pub fn map4<A, B, C, D, R, F>(f: F, a: &Decoder<A>, b: &Decoder<B>, c: &Decoder<C>, d: &Decoder<D>) -> Decoder<R>
where
	A: 'static,
	B: 'static,
	C: 'static,
	D: 'static,
	R: 'static,
	F: Fn(A, B, C, D) -> R + 'static,
{
	let call: Rc<dyn Fn(Vec<Boxed>) -> Boxed> = Rc::new(move |values: Vec<Boxed>| -> Boxed {
		let mut values = values.into_iter();
		let a = next(&mut values);
		let b = next(&mut values);
		let c = next(&mut values);
		let d = next(&mut values);
		Box::new(f(a, b, c, d))
	});
	Decoder::from_kind(Kind::Map(
		Callable::new::<F>(call),
		vec![a.kind.clone(), b.kind.clone(), c.kind.clone(), d.kind.clone()],
	))
}

#[must_use]
pub fn and_then<T: 'static, U: 'static, F: Fn(T) -> Decoder<U> + 'static>(f: F, decoder: &Decoder<T>) -> Decoder<U> {
	decoder.and_then(f)
}

/// Tries each decoder in order. Fails with every alternative's error iff none succeeds.
#[must_use]
pub fn one_of<T: 'static>(decoders: Vec<Decoder<T>>) -> Decoder<T> {
	Decoder::from_kind(Kind::OneOf(decoders.into_iter().map(|decoder| decoder.kind).collect()))
}

/// Defers building a decoder until it runs, for recursive structures.
#[must_use]
pub fn lazy<T: 'static, F: Fn() -> Decoder<T> + 'static>(thunk: F) -> Decoder<T> {
	succeed(()).and_then(move |()| thunk())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn paths_in_failures() {
		let decoder = at(&["user", "tags"], &index(3, &int()));
		let error = decoder
			.decode_value(&json!({ "user": { "tags": [1, 2, 3, "x"] } }))
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"Problem with the value at json.user.tags[3]:\n\n    \"x\"\n\nExpecting an INT"
		);

		let error = field("1st", &string()).decode_value(&json!({ "1st": null })).unwrap_err();
		assert!(error.to_string().starts_with("Problem with the value at json['1st']:"));
	}

	#[test]
	fn missing_field_and_short_array() {
		let error = field("name", &string()).decode_value(&json!({})).unwrap_err();
		assert_eq!(error, Error::Failure("Expecting an OBJECT with a field named `name`".to_owned(), json!({})));

		let error = index(2, &int()).decode_value(&json!([1])).unwrap_err();
		assert_eq!(
			error,
			Error::Failure("Expecting a LONGER array. Need index 2 but only see 1 entries".to_owned(), json!([1]))
		);
	}

	#[test]
	fn one_of_collects_all_alternatives() {
		let decoder = field("a", &one_of(vec![int().map(|i| i.to_string()), string().map(|s| s + "!")]));
		assert_eq!(decoder.decode_value(&json!({ "a": "hi" })).unwrap(), "hi!");

		let error = decoder.decode_value(&json!({ "a": true })).unwrap_err();
		assert_eq!(
			error.to_string(),
			"The Json.Decode.oneOf at json.a failed in the following 2 ways:\n\n\n\n\
			(1) Problem with the given value:\n    \n    true\n    \n    Expecting an INT\n\n\n\n\
			(2) Problem with the given value:\n    \n    true\n    \n    Expecting a STRING"
		);

		let empty: Decoder<i64> = one_of(vec![]);
		assert_eq!(
			empty.decode_value(&json!(1)).unwrap_err().to_string(),
			"Ran into a Json.Decode.oneOf with no possibilities!"
		);
	}

	#[test]
	fn integral_floats_are_ints() {
		assert_eq!(int().decode_value(&json!(3.0)), Ok(3));
		assert!(int().decode_value(&json!(3.5)).is_err());
		assert_eq!(float().decode_value(&json!(3)), Ok(3.0));
	}

	#[test]
	fn collections() {
		let pairs = key_value_pairs(&int()).decode_value(&json!({ "b": 2, "a": 1 })).unwrap();
		assert_eq!(pairs.len(), 2);
		let dict = dict(&int()).decode_value(&json!({ "b": 2, "a": 1 })).unwrap();
		assert_eq!(dict.get(&"a".to_owned()), Some(&1));
		let array = array(&bool()).decode_value(&json!([true, false])).unwrap();
		assert_eq!(array.to_vec(), vec![true, false]);
		let error = list(&int()).decode_value(&json!([1, "2"])).unwrap_err();
		assert!(matches!(error, Error::Index(1, _)));
		assert_eq!(nullable(&int()).decode_value(&json!(null)), Ok(None));
		assert_eq!(maybe(&int()).decode_value(&json!("x")), Ok(None));
	}

	#[test]
	fn invalid_json() {
		let error = int().decode_string("{").unwrap_err();
		match error {
			Error::Failure(message, Value::String(input)) => {
				assert!(message.starts_with("This is not valid JSON! "));
				assert_eq!(input, "{");
			}
			other => panic!("unexpected error {:?}", other),
		}
	}

	#[test]
	fn structural_equality() {
		fn double(x: i64) -> i64 {
			x * 2
		}
		let a = field("x", &int().map(double));
		let b = field("x", &int().map(double));
		assert_eq!(a, b);
		assert_ne!(a, field("y", &int().map(double)));
		assert_ne!(int().map(|x| x + 1), int().map(|x| x + 1));

		let offset = 1;
		let captured = int().map(move |x| x + offset);
		assert_eq!(captured, captured.clone());
		assert_ne!(list(&captured), list(&int().map(move |x| x + offset)));

		let message = succeed(1);
		assert_eq!(message, message.clone());
		assert_ne!(succeed(1), succeed(1));
	}

	#[test]
	fn recursive_decoders() {
		#[derive(Clone, Debug, PartialEq)]
		struct Tree(Vec<Tree>);
		fn tree() -> Decoder<Tree> {
			list(&lazy(tree)).map(Tree)
		}
		assert_eq!(tree().decode_value(&json!([[], [[]]])), Ok(Tree(vec![Tree(vec![]), Tree(vec![Tree(vec![])])])));
	}
}
