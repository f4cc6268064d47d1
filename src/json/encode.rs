//! Building and printing JSON values.

use crate::collections::{Array, Dict};
use serde::Serialize;
use serde_json::{
	ser::{PrettyFormatter, Serializer},
	Map, Number, Value,
};

/// Prints `value`, indenting nested structures by `indent` spaces per level.
/// An `indent` of `0` prints compactly on one line.
#[must_use]
pub fn encode(indent: usize, value: &Value) -> String {
	if indent == 0 {
		return value.to_string();
	}
	let indent = vec![b' '; indent];
	let mut serializer = Serializer::with_formatter(Vec::new(), PrettyFormatter::with_indent(&indent));
	match value.serialize(&mut serializer) {
		Ok(()) => String::from_utf8_lossy(&serializer.into_inner()).into_owned(),
		Err(error) => {
			tracing::warn!(%error, "Pretty-printing JSON failed, falling back to compact output");
			value.to_string()
		}
	}
}

#[must_use]
pub fn string(value: impl Into<String>) -> Value {
	Value::String(value.into())
}

#[must_use]
pub fn int(value: i64) -> Value {
	Value::Number(value.into())
}

/// Non-finite floats become `null`.
#[must_use]
pub fn float(value: f64) -> Value {
	Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[must_use]
pub fn bool(value: bool) -> Value {
	Value::Bool(value)
}

#[must_use]
pub fn null() -> Value {
	Value::Null
}

pub fn list<T>(items: impl IntoIterator<Item = T>, encode: impl FnMut(T) -> Value) -> Value {
	Value::Array(items.into_iter().map(encode).collect())
}

pub fn array<T>(array: &Array<T>, encode: impl FnMut(&T) -> Value) -> Value {
	Value::Array(array.iter().map(encode).collect())
}

/// Later duplicates of a key overwrite earlier ones.
pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
	Value::Object(entries.into_iter().map(|(key, value)| (key.into(), value)).collect::<Map<_, _>>())
}

pub fn dict<T>(dict: &Dict<String, T>, mut encode: impl FnMut(&T) -> Value) -> Value {
	object(dict.iter().map(|(key, value)| (key.clone(), encode(value))))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn indentation() {
		let value = object(vec![("a", list(vec![1, 2], int)), ("b", null())]);
		assert_eq!(encode(0, &value), r#"{"a":[1,2],"b":null}"#);
		assert_eq!(encode(4, &value), "{\n    \"a\": [\n        1,\n        2\n    ],\n    \"b\": null\n}");
	}

	#[test]
	fn non_finite_floats_are_null() {
		assert_eq!(float(f64::NAN), Value::Null);
		assert_eq!(float(1.5), json!(1.5));
	}
}
