//! Main docmap crate providing backend-agnostic filtering and record mapping for document stores.
//!
//! This crate is the primary entry point for users of the docmap project. It re-exports the
//! core modules, the `Record` derive macro and the store clients.
//!
//! # Features
//!
//! - **Filter grammar** - Human readable filters such as `age gt 18 and name sw 'A'`
//! - **Query compilation** - Filters compiled into the store's native query documents
//! - **Record mapping** - Generic record ↔ document conversion with pluggable type rules
//! - **Multiple stores** - In-memory and MongoDB store clients behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Debug, Clone, Record)]
//! pub struct User {
//!     pub email: String,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StoreError> {
//!     let users = CrudHandler::<User, _>::new(InMemoryStore::new(), "users");
//!
//!     users
//!         .create(User { email: "alice@example.com".into(), name: "Alice".into(), age: 30 })
//!         .await?;
//!
//!     // `email` is the first field and therefore stored under `_id`
//!     let alice = users.read("alice@example.com").await?;
//!
//!     let adults = users.filter(&FilterRequest::new("age ge 18").size(10)).await?;
//!     println!("Found {} adults", adults.size);
//!
//!     users.update("alice@example.com", User { age: 31, ..alice }).await?;
//!     users.delete("alice@example.com").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Type rules
//!
//! Fields of semantic types without a structural representation are converted by type
//! rules. The default converter registers the timestamp and date rules; applications add
//! their own and pass the converter to the handler:
//!
//! ```ignore
//! let converter = Converter::default()
//!     .with_rule(MoneyRule)
//!     .with_name_mapping("orderNumber", "_id");
//!
//! let orders = CrudHandler::<Order, _>::new(store, "orders").with_converter(converter);
//! ```
//!
//! # Stores
//!
//! - [`memory`] - In-memory store for development and testing
//! - [`mongodb`] - MongoDB store (requires `mongodb` feature)

pub mod prelude;

pub use docmap_core::{
    cache, client, compiler, condition, converter, error, filter, handler, record, rule, timestamp,
};
pub use docmap_macros::Record;

// Re-export BSON and chrono for convenience
pub use bson;
pub use chrono;

/// Attribute macro for implementing [`client::StoreClient`] on custom stores.
pub use async_trait::async_trait;

/// In-memory store implementation.
pub mod memory {
    pub use docmap_memory::{InMemoryStore, QueryEvaluator};
}

/// MongoDB store implementation.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmap_mongodb::{MongoDbStore, MongoSettings};
}
