//! MongoDB backend (feature `mongodb`).
//!
//! One document per session in a collection of your choosing:
//!
//! ```text
//! { _id: "<24 hex>", user_id: <int>?, data: "<sealed>", last_accessed: ISODate }
//! ```

use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use crate::{SessionBackend, SessionDocument, SessionId};

/// Errors from the MongoDB backend.
#[derive(Debug, thiserror::Error)]
pub enum MongoBackendError {
    /// The driver reported a failure (network, auth, write concern...).
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// A stored document's `_id` is not a session identifier.
    #[error("stored session has invalid id {0:?}")]
    InvalidId(String),

    /// A stored document's timestamp is outside the representable range.
    #[error("stored session has invalid last_accessed {0}")]
    InvalidTimestamp(i64),
}

/// The stored row. Uses BSON dates so `last_accessed` can be indexed and
/// compared server-side (e.g. by a TTL index).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRow {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    data: String,
    last_accessed: bson::DateTime,
}

impl From<&SessionDocument> for SessionRow {
    fn from(document: &SessionDocument) -> Self {
        Self {
            id: document.id.to_string(),
            user_id: document.user_id,
            data: document.payload.clone(),
            last_accessed: bson::DateTime::from_millis(
                document.last_accessed.timestamp_millis(),
            ),
        }
    }
}

impl TryFrom<SessionRow> for SessionDocument {
    type Error = MongoBackendError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .parse::<SessionId>()
            .map_err(|_| MongoBackendError::InvalidId(row.id.clone()))?;
        let millis = row.last_accessed.timestamp_millis();
        let last_accessed: DateTime<Utc> = DateTime::from_timestamp_millis(millis)
            .ok_or(MongoBackendError::InvalidTimestamp(millis))?;
        Ok(Self {
            id,
            user_id: row.user_id,
            payload: row.data,
            last_accessed,
        })
    }
}

/// Stores sessions in a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    collection: Collection<SessionRow>,
}

impl MongoBackend {
    /// Uses `collection` in `database`.
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            collection: database.collection(collection),
        }
    }

    /// Wraps an existing collection handle.
    pub fn from_collection<D: Send + Sync>(collection: Collection<D>) -> Self {
        Self {
            collection: collection.clone_with_type(),
        }
    }
}

impl SessionBackend for MongoBackend {
    type Error = MongoBackendError;

    async fn find_one(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionDocument>, Self::Error> {
        self.collection
            .find_one(doc! { "_id": id.to_string() })
            .await?
            .map(SessionDocument::try_from)
            .transpose()
    }

    async fn upsert_one(
        &self,
        document: &SessionDocument,
    ) -> Result<(), Self::Error> {
        let row = SessionRow::from(document);
        self.collection
            .replace_one(doc! { "_id": row.id.as_str() }, &row)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete_one(&self, id: &SessionId) -> Result<(), Self::Error> {
        self.collection
            .delete_one(doc! { "_id": id.to_string() })
            .await?;
        Ok(())
    }
}
