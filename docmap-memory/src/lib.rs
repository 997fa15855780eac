//! In-memory document store for docmap.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreClient` trait.
//! It evaluates the query documents produced by the condition compiler directly against the
//! stored BSON documents, which makes it suitable for development and tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! #[derive(Debug, Clone, Record)]
//! pub struct User {
//!     pub email: String,
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = CrudHandler::<User, _>::new(InMemoryStore::new(), "users");
//!
//!     users.create(User { email: "a@b.c".into(), name: "Alice".into() }).await?;
//!     let alice = users.read("a@b.c").await?;
//!
//!     Ok(())
//! }
//! ```

pub mod evaluator;
pub mod store;

pub use evaluator::QueryEvaluator;
pub use store::InMemoryStore;
