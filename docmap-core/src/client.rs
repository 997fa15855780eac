//! Store-client contract.
//!
//! A [`StoreClient`] executes compiled query documents against a concrete document store. It
//! knows nothing about records or filter strings; the [`CrudHandler`](crate::handler::CrudHandler)
//! does that translation before calling it.

use async_trait::async_trait;
use bson::Document;

use crate::error::StoreResult;

/// Pagination applied to a find.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return; `None` returns all remaining matches.
    ///
    /// `Some(0)` returns no documents, only the total.
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new(skip: u64, limit: Option<u64>) -> Self {
        Self { skip, limit }
    }
}

/// Documents returned by a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub documents: Vec<Document>,
    /// Total number of matches ignoring pagination, when the store reports it.
    pub total: Option<u64>,
}

/// Abstract interface for document stores.
///
/// Implementations must be safe to share between concurrent tasks.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Returns the documents of `collection` matching the query document `filter`.
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> StoreResult<FindResult>;

    /// Inserts a new document.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()>;

    /// Applies the update document `update` to the document matching `filter`.
    ///
    /// Returns whether a document matched.
    async fn update(&self, collection: &str, filter: Document, update: Document) -> StoreResult<bool>;

    /// Deletes the document matching `filter`.
    ///
    /// Returns whether a document matched.
    async fn delete(&self, collection: &str, filter: Document) -> StoreResult<bool>;
}
