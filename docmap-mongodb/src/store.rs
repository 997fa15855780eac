use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions as MongoFindOptions},
};
use tracing::{debug, info};

use docmap_core::{
    client::{FindOptions, FindResult, StoreClient},
    error::{StoreError, StoreResult},
};

use crate::settings::MongoSettings;

const DUPLICATE_KEY: i32 = 11000;

fn backend(err: MongoError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

/// Translates skip and limit into driver options.
///
/// MongoDB reads a zero limit as "no limit", so `Some(0)` yields `None` and the caller returns no
/// documents without querying.
fn native_find_options(options: &FindOptions) -> Option<MongoFindOptions> {
    let mut find_options = MongoFindOptions::default();
    if options.skip > 0 {
        find_options.skip = Some(options.skip);
    }
    match options.limit {
        Some(0) => return None,
        Some(limit) => find_options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX)),
        None => {}
    }

    Some(find_options)
}

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Connects with the given settings and pings the server once.
    pub async fn connect(settings: &MongoSettings) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&settings.uri)
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;
        options.max_pool_size = Some(settings.pool_size);
        options.connect_timeout = Some(settings.connection_timeout());
        options.server_selection_timeout = Some(settings.connection_timeout());

        let client = Client::with_options(options)
            .map_err(|e| StoreError::Initialization(e.to_string()))?;

        client
            .database(&settings.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;
        info!(database = %settings.database, "connected to mongodb");

        Ok(Self::new(client, settings.database.clone()))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    pub async fn shutdown(self) -> StoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreClient for MongoDbStore {
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> StoreResult<FindResult> {
        let collection = self.get_collection(collection);

        let total = collection
            .count_documents(filter.clone())
            .await
            .map_err(backend)?;

        let Some(find_options) = native_find_options(&options) else {
            debug!(collection = %collection.name(), total, "find with zero limit");
            return Ok(FindResult {
                documents: Vec::new(),
                total: Some(total),
            });
        };

        let documents = collection
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend)?;
        debug!(collection = %collection.name(), total, returned = documents.len(), "find");

        Ok(FindResult {
            documents,
            total: Some(total),
        })
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        let id = document.get("_id").map(ToString::to_string).unwrap_or_default();

        self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::AlreadyExists(id, collection.to_string())
                } else {
                    backend(e)
                }
            })?;

        Ok(())
    }

    async fn update(&self, collection: &str, filter: Document, update: Document) -> StoreResult<bool> {
        let result = self
            .get_collection(collection)
            .update_one(filter, update)
            .await
            .map_err(backend)?;

        Ok(result.matched_count > 0)
    }

    async fn delete(&self, collection: &str, filter: Document) -> StoreResult<bool> {
        let result = self
            .get_collection(collection)
            .delete_one(filter)
            .await
            .map_err(backend)?;

        Ok(result.deleted_count > 0)
    }
}
