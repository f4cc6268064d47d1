#![doc(html_root_url = "https://docs.rs/vdom-runtime/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! The core of a functional-reactive UI runtime.
//!
//! - [`vdom`]: virtual node trees, a diff engine producing located patches, and patch
//!   application against any [`Dom`](vdom::Dom).
//! - [`scheduler`] and [`task`]: cooperative, single-threaded processes running [`Task`](task::Task)s.
//! - [`platform`]: effect managers, ports and the program loop.
//! - [`collections`]: persistent `List`, `Dict` and `Array`.
//! - [`json`]: decoders and encoders over `serde_json` values.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod collections;
pub mod json;
pub mod opaque;
pub mod platform;
pub mod scheduler;
pub mod task;
pub mod vdom;

#[cfg(feature = "web")]
pub mod web;
