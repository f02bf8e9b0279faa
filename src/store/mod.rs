// src/store/mod.rs
mod mongo;

pub use mongo::{MongoConnection, MongoConnector, MongoStore};

use async_trait::async_trait;
use mongodb::bson::Document;
use std::fmt;

/// A (database, collection) pair operations are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub database: String,
    pub collection: String,
}

impl Target {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database operation failed: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
}

/// The document-database operations the generator issues. The driver behind
/// this seam is an opaque collaborator; tests substitute in-memory fakes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Increment `field` by `by` on the first document matching `filter`.
    async fn increment_one(
        &self,
        target: &Target,
        filter: Document,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError>;

    async fn find_one(
        &self,
        target: &Target,
        filter: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn insert_one(&self, target: &Target, doc: Document) -> Result<(), StoreError>;

    async fn delete_one(&self, target: &Target, filter: Document) -> Result<(), StoreError>;

    async fn insert_many(&self, target: &Target, docs: Vec<Document>) -> Result<(), StoreError>;

    /// Returns the number of documents removed.
    async fn delete_many(&self, target: &Target, filter: Document) -> Result<u64, StoreError>;

    async fn drop_collection(&self, target: &Target) -> Result<(), StoreError>;
}

/// A short-lived connection opened purely for churn; the caller closes it.
#[async_trait]
pub trait Connection: Send {
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// Opens fresh connections and dedicated stores on demand.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Connection>, StoreError>;

    /// A store backed by its own fresh connection, for workers that must not
    /// share the generator's primary connection.
    async fn open_store(&self) -> Result<Box<dyn DocumentStore>, StoreError>;
}
