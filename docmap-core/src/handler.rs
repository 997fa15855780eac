//! Typed CRUD and search operations over a [`StoreClient`].
//!
//! The handler wires the filter parser, the [`compile`] step and the [`Converter`] to a store
//! client. Reads, updates and deletes address a record through an identity-equality query on
//! the converter's identity key.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! let handler = CrudHandler::<Person, _>::new(InMemoryStore::new(), "people");
//!
//! handler.create(person).await?;
//! let adults = handler.filter(&FilterRequest::new("age ge 18")).await?;
//! let person = handler.read("test@test.de").await?;
//! ```

use std::{marker::PhantomData, sync::Arc};

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    client::{FindOptions, StoreClient},
    compiler::{compile, compile_filter},
    condition::{Condition, Literal, Operator},
    converter::Converter,
    error::{StoreError, StoreResult},
    record::Record,
};

/// A paginated search expressed as a filter string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Filter in the condition grammar; blank matches everything.
    #[serde(default)]
    pub filter: String,
    /// Number of matches to skip.
    #[serde(default)]
    pub from: u64,
    /// Maximum number of results; `None` returns all remaining matches.
    #[serde(default)]
    pub size: Option<u64>,
}

impl FilterRequest {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }

    pub fn from(mut self, from: u64) -> Self {
        self.from = from;
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// One page of decoded search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult<R> {
    pub from: u64,
    /// Number of records in `results`.
    pub size: usize,
    /// Total number of matches, when the store reports it.
    pub count: Option<u64>,
    pub results: Vec<R>,
}

/// CRUD handler for records of type `R` stored in one collection.
#[derive(Debug)]
pub struct CrudHandler<R, S> {
    client: S,
    collection: String,
    converter: Arc<Converter>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, S: StoreClient> CrudHandler<R, S> {
    /// Creates a handler using the default converter and the `_id` identity convention.
    pub fn new(client: S, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
            converter: Arc::new(Converter::default()),
            _record: PhantomData,
        }
    }

    pub fn with_converter(mut self, converter: impl Into<Arc<Converter>>) -> Self {
        self.converter = converter.into();
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn client(&self) -> &S {
        &self.client
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    fn identity_filter(&self, id: Literal) -> StoreResult<Document> {
        let condition = Condition::operand(self.converter.identity_key(), Operator::Eq, id);
        Ok(compile(&condition)?)
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<R>> {
        let found = self
            .client
            .find(&self.collection, filter, FindOptions::new(0, Some(1)))
            .await?;

        found
            .documents
            .into_iter()
            .next()
            .map(|document| self.converter.decode(document))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Searches the collection with a filter string.
    pub async fn filter(&self, request: &FilterRequest) -> StoreResult<FilterResult<R>> {
        let query = compile_filter(&request.filter)?;
        debug!(collection = %self.collection, filter = %request.filter, "filter records");

        let found = self
            .client
            .find(&self.collection, query, FindOptions::new(request.from, request.size))
            .await?;

        let results = found
            .documents
            .into_iter()
            .map(|document| self.converter.decode(document))
            .collect::<Result<Vec<R>, _>>()?;

        Ok(FilterResult {
            from: request.from,
            size: results.len(),
            count: found.total,
            results,
        })
    }

    /// Stores a new record.
    pub async fn create(&self, record: R) -> StoreResult<()> {
        let document = self.converter.encode(record)?;
        debug!(collection = %self.collection, id = ?document.get(self.converter.identity_key()), "create record");

        self.client.insert(&self.collection, document).await
    }

    /// Reads the record with the given identity.
    pub async fn read(&self, id: impl Into<Literal>) -> StoreResult<R> {
        let id = id.into();
        debug!(collection = %self.collection, %id, "read record");

        self.find_one(self.identity_filter(id.clone())?)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string(), self.collection.clone()))
    }

    /// Applies the supplied fields of `record` to the stored record with the given identity.
    ///
    /// The identity and fields without a value are left untouched.
    pub async fn update(&self, id: impl Into<Literal>, record: R) -> StoreResult<()> {
        let id = id.into();
        let identity_key = self.converter.identity_key();

        let fields: Document = self
            .converter
            .encode(record)?
            .into_iter()
            .filter(|(key, value)| key != identity_key && *value != Bson::Null)
            .collect();
        if fields.is_empty() {
            return Err(StoreError::InvalidDocument("update without fields".into()));
        }
        debug!(collection = %self.collection, %id, fields = fields.len(), "update record");

        let matched = self
            .client
            .update(&self.collection, self.identity_filter(id.clone())?, doc! { "$set": fields })
            .await?;
        if !matched {
            return Err(StoreError::NotFound(id.to_string(), self.collection.clone()));
        }

        Ok(())
    }

    /// Deletes the record with the given identity and returns it.
    pub async fn delete(&self, id: impl Into<Literal>) -> StoreResult<R> {
        let id = id.into();
        let record = self.read(id.clone()).await?;
        debug!(collection = %self.collection, %id, "delete record");

        self.client
            .delete(&self.collection, self.identity_filter(id)?)
            .await?;

        Ok(record)
    }
}
