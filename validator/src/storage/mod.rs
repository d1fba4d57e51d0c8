//! Storage Module
//!
//! MongoDB access layer. The document store is the only shared mutable
//! state between validators; every write is either an insert whose unique
//! index makes it idempotent, or a compare-and-set update filtered on `_id`
//! plus the expected prior status. No other concurrency primitive exists.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::MongoConfig;
use crate::models;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Handle to the validator's database.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connects to MongoDB and selects the configured database.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .context("Failed to parse MongoDB URI")?;
        let timeout = Duration::from_millis(config.timeout_millis);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        let db = client.database(&config.database);

        // Round trip once so a bad URI fails at startup, not first sweep
        db.run_command(mongodb::bson::doc! { "ping": 1 }, None)
            .await
            .context("Failed to ping MongoDB")?;

        Ok(Self { db })
    }

    /// Creates the unique indexes the insert-idempotency contract relies on.
    pub async fn setup_indexes(&self) -> Result<()> {
        self.create_unique_index(models::COLLECTION_MINTS, &["transaction_hash"])
            .await?;
        self.create_unique_index(models::COLLECTION_INVALID_MINTS, &["transaction_hash"])
            .await?;
        self.create_unique_index(
            models::COLLECTION_BURNS,
            &["transaction_hash", "log_index"],
        )
        .await?;
        self.create_unique_index(models::COLLECTION_HEALTHCHECKS, &["name"])
            .await?;
        Ok(())
    }

    async fn create_unique_index(&self, collection: &str, fields: &[&str]) -> Result<()> {
        let mut keys = Document::new();
        for field in fields {
            keys.insert(field.to_string(), 1i32);
        }
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.db
            .collection::<Document>(collection)
            .create_index(model, None)
            .await
            .with_context(|| format!("Failed to create index on {}", collection))?;
        Ok(())
    }

    /// Inserts a document. A duplicate-key rejection is idempotent success
    /// and comes back as `Ok(false)`.
    pub async fn insert_one<T: Serialize>(&self, collection: &str, document: &T) -> Result<bool> {
        let result = self
            .db
            .collection::<Document>(collection)
            .insert_one(
                mongodb::bson::to_document(document).context("Failed to serialize document")?,
                None,
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key_error(&err) => Ok(false),
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("Failed to insert into {}", collection)))
            }
        }
    }

    /// Finds all documents matching `filter`.
    pub async fn find_many<T>(&self, collection: &str, filter: Document) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let cursor = self
            .db
            .collection::<T>(collection)
            .find(filter, None)
            .await
            .with_context(|| format!("Failed to query {}", collection))?;
        cursor
            .try_collect()
            .await
            .with_context(|| format!("Failed to read {} cursor", collection))
    }

    /// Finds a single document matching `filter`.
    pub async fn find_one<T>(&self, collection: &str, filter: Document) -> Result<Option<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        self.db
            .collection::<T>(collection)
            .find_one(filter, None)
            .await
            .with_context(|| format!("Failed to query {}", collection))
    }

    /// Compare-and-set update: `filter` must carry `_id` plus the expected
    /// prior status. Returns how many documents matched.
    pub async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<u64> {
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(filter, update, None)
            .await
            .with_context(|| format!("Failed to update {}", collection))?;
        Ok(result.matched_count)
    }

    /// Upserts a document, used for per-service health records.
    pub async fn upsert_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<()> {
        self.db
            .collection::<Document>(collection)
            .update_one(
                filter,
                update,
                UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .with_context(|| format!("Failed to upsert into {}", collection))?;
        Ok(())
    }
}

/// Whether an error is a unique-index violation.
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .as_ref()
            .map(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY_CODE))
            .unwrap_or(false),
        _ => false,
    }
}
