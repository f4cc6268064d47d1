//! The JSON layer used at typed boundaries: ports, event handlers and effect payloads.
//!
//! Values are [`serde_json::Value`]s. [`decode`] turns them into Rust values with path-annotated
//! [`decode::Error`]s, [`encode`] builds and prints them.

pub mod decode;
pub mod encode;

pub use decode::Decoder;
pub use serde_json::Value;
