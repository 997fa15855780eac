//! Backend-agnostic filtering and record mapping for document stores.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Conditions** ([`condition`]) - Boolean filter expression trees and the visitor seam over them
//! - **Filter parsing** ([`filter`]) - The human readable filter grammar, e.g. `age gt 18 and name sw 'A'`
//! - **Query compilation** ([`compiler`]) - Conditions compiled into native query documents
//! - **Records** ([`record`]) - Statically declared record types and their field values
//! - **Type rules** ([`rule`]) - Pluggable per-type conversions, with timestamp and date rules built in
//! - **Conversion** ([`converter`]) - Generic record ↔ document conversion with name mapping
//! - **Descriptor cache** ([`cache`]) - Lock-free cache of per-type record descriptors
//! - **Store clients** ([`client`]) - The contract a concrete document store implements
//! - **CRUD handling** ([`handler`]) - Typed create/read/update/delete and search over a store client
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! #[derive(Debug, Clone, Record)]
//! pub struct Person {
//!     pub email: String,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! let query = compile_filter("age gt 18")?;
//! assert_eq!(query, doc! { "age": { "$gt": 18_i64 } });
//!
//! let document = Converter::default().encode(person)?;
//! assert!(document.contains_key("_id"));
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap;

pub mod cache;
pub mod client;
pub mod compiler;
pub mod condition;
pub mod converter;
pub mod error;
pub mod filter;
pub mod handler;
pub mod record;
pub mod rule;
pub mod timestamp;
