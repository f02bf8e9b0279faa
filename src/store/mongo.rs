// src/store/mongo.rs
use super::{Connection, Connector, DocumentStore, StoreError, Target};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use url::Url;

/// `DocumentStore` over the official driver. One `MongoStore` wraps one
/// client; the generator's primary store is never shared with workers.
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    pub async fn connect(uri: &Url) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri.as_str())
            .await
            .map_err(|source| StoreError::Connect {
                uri: uri.to_string(),
                source,
            })?;
        Ok(Self { client })
    }

    fn collection(&self, target: &Target) -> Collection<Document> {
        self.client
            .database(&target.database)
            .collection(&target.collection)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn increment_one(
        &self,
        target: &Target,
        filter: Document,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError> {
        let mut inc = Document::new();
        inc.insert(field, by);
        self.collection(target)
            .update_one(filter, doc! { "$inc": inc }, None)
            .await?;
        Ok(())
    }

    async fn find_one(
        &self,
        target: &Target,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(target).find_one(filter, None).await?)
    }

    async fn insert_one(&self, target: &Target, doc: Document) -> Result<(), StoreError> {
        self.collection(target).insert_one(doc, None).await?;
        Ok(())
    }

    async fn delete_one(&self, target: &Target, filter: Document) -> Result<(), StoreError> {
        self.collection(target).delete_one(filter, None).await?;
        Ok(())
    }

    async fn insert_many(&self, target: &Target, docs: Vec<Document>) -> Result<(), StoreError> {
        self.collection(target).insert_many(docs, None).await?;
        Ok(())
    }

    async fn delete_many(&self, target: &Target, filter: Document) -> Result<u64, StoreError> {
        let result = self.collection(target).delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn drop_collection(&self, target: &Target) -> Result<(), StoreError> {
        self.collection(target).drop(None).await?;
        Ok(())
    }
}

/// Opens throwaway clients against a fixed URI.
pub struct MongoConnector {
    uri: Url,
}

impl MongoConnector {
    pub fn new(uri: Url) -> Self {
        Self { uri }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn open(&self) -> Result<Box<dyn Connection>, StoreError> {
        let client = Client::with_uri_str(self.uri.as_str())
            .await
            .map_err(|source| StoreError::Connect {
                uri: self.uri.to_string(),
                source,
            })?;
        Ok(Box::new(MongoConnection {
            client: Some(client),
        }))
    }

    async fn open_store(&self) -> Result<Box<dyn DocumentStore>, StoreError> {
        Ok(Box::new(MongoStore::connect(&self.uri).await?))
    }
}

/// A churn connection. Close tears the client down explicitly so the server
/// sees the disconnect immediately rather than whenever drop-cleanup runs.
pub struct MongoConnection {
    client: Option<Client>,
}

#[async_trait]
impl Connection for MongoConnection {
    async fn close(&mut self) -> Result<(), StoreError> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
        Ok(())
    }
}
