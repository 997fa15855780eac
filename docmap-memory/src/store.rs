//! In-memory storage implementation of the store-client contract.
//!
//! Documents are kept as BSON documents per collection, in insertion order, behind an
//! async-safe read-write lock.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use tracing::{debug, trace};

use docmap_core::{
    client::{FindOptions, FindResult, StoreClient},
    error::{StoreError, StoreResult},
};

use crate::evaluator::QueryEvaluator;

type StoreMap = HashMap<String, Vec<Document>>;

const IDENTITY_KEY: &str = "_id";

/// Thread-safe in-memory document store.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share the
/// same documents. Queries scan every document of a collection; there is no indexing.
///
/// # Example
///
/// ```ignore
/// use docmap::{client::{FindOptions, StoreClient}, memory::InMemoryStore};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert("people", doc! { "_id": "a", "age": 30 }).await?;
///
/// let found = store
///     .find("people", doc! { "age": { "$gt": 18 } }, FindOptions::default())
///     .await?;
/// assert_eq!(found.total, Some(1));
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all collections that hold or held documents.
    pub async fn collections(&self) -> Vec<String> {
        self.store.read().await.keys().cloned().collect()
    }

    fn apply_set(document: &mut Document, fields: Document) -> StoreResult<()> {
        for (path, value) in fields {
            if path == IDENTITY_KEY {
                return Err(StoreError::InvalidDocument("the identity cannot be updated".into()));
            }

            let mut segments: Vec<&str> = path.split('.').collect();
            let last = segments.pop().unwrap_or_default();

            let mut target = &mut *document;
            for segment in segments {
                if !matches!(target.get(segment), Some(Bson::Document(_))) {
                    target.insert(segment, Document::new());
                }
                target = target
                    .get_document_mut(segment)
                    .map_err(|err| StoreError::InvalidDocument(err.to_string()))?;
            }
            target.insert(last, value);
        }

        Ok(())
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> StoreResult<FindResult> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(FindResult {
                documents: Vec::new(),
                total: Some(0),
            });
        };

        let matched = QueryEvaluator::filter_documents(documents, &filter)?;
        let total = matched.len() as u64;
        trace!(collection, %filter, total, "evaluated query");

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(FindResult {
            documents: matched.into_iter().skip(skip).take(limit).cloned().collect(),
            total: Some(total),
        })
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        if let Some(id) = document.get(IDENTITY_KEY) {
            if documents.iter().any(|existing| existing.get(IDENTITY_KEY) == Some(id)) {
                return Err(StoreError::AlreadyExists(id.to_string(), collection.to_string()));
            }
        }

        debug!(collection, id = ?document.get(IDENTITY_KEY), "inserted document");
        documents.push(document);

        Ok(())
    }

    async fn update(&self, collection: &str, filter: Document, update: Document) -> StoreResult<bool> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(false);
        };

        let mut index = None;
        for (position, document) in documents.iter().enumerate() {
            if QueryEvaluator::new(document).matches(&filter)? {
                index = Some(position);
                break;
            }
        }
        let Some(document) = index.and_then(|index| documents.get_mut(index)) else {
            return Ok(false);
        };

        // Applied to a copy so that a rejected field leaves the stored document untouched.
        let mut updated = document.clone();
        for (operator, fields) in update {
            match (operator.as_str(), fields) {
                ("$set", Bson::Document(fields)) => Self::apply_set(&mut updated, fields)?,
                (other, _) => {
                    return Err(StoreError::InvalidDocument(format!(
                        "unsupported update operator {other}"
                    )));
                }
            }
        }
        *document = updated;
        debug!(collection, %filter, "updated document");

        Ok(true)
    }

    async fn delete(&self, collection: &str, filter: Document) -> StoreResult<bool> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(false);
        };

        let mut index = None;
        for (position, document) in documents.iter().enumerate() {
            if QueryEvaluator::new(document).matches(&filter)? {
                index = Some(position);
                break;
            }
        }

        match index {
            Some(index) => {
                documents.remove(index);
                debug!(collection, %filter, "deleted document");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
