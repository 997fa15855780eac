//! MongoDB store implementation for docmap.
//!
//! This crate provides a MongoDB-based implementation of the `StoreClient` trait. Compiled
//! query documents are handed to the server unchanged, so filtering, pagination and counting
//! run on MongoDB's query engine.
//!
//! To use this store, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmap = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docmap::{prelude::*, mongodb::{MongoDbStore, MongoSettings}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::connect(&MongoSettings::new("mongodb://localhost:27017", "app")).await?;
//!     let people = CrudHandler::<Person, _>::new(store, "people");
//!
//!     Ok(())
//! }
//! ```

pub mod settings;
pub mod store;

pub use settings::MongoSettings;
pub use store::MongoDbStore;
