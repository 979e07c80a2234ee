//! MongoDB-backed result store.

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, IndexModel, bson::doc, options::IndexOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::{
    models::SprintResultEntity,
    storage::{StorageError, StorageResult},
};

use super::ResultStore;

const RESULT_COLLECTION_NAME: &str = "sprint_results";
const DEFAULT_DATABASE_NAME: &str = "sprint";

/// Errors specific to the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Initial connection to the cluster failed.
    #[error("failed to connect to MongoDB: {source}")]
    Connect {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// Index creation failed during startup.
    #[error("failed to ensure index on `{collection}`: {source}")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A read or write against the collection failed.
    #[error("MongoDB operation failed: {source}")]
    Operation {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// Health ping failed.
    #[error("MongoDB ping failed: {source}")]
    HealthPing {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A stored row could not be mapped back to an entity.
    #[error("invalid document in `{collection}`: {message}")]
    InvalidDocument {
        /// Collection the document came from.
        collection: &'static str,
        /// What was malformed.
        message: String,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Document shape persisted to the results collection.
///
/// Uuids are stored as canonical strings so documents stay readable and the
/// index key is a plain string comparison.
#[derive(Debug, Serialize, Deserialize)]
struct MongoResultDocument {
    session_id: String,
    connection_id: String,
    user_id: Option<String>,
    display_name: String,
    tap_count: u32,
    recorded_at_ms: i64,
}

impl From<SprintResultEntity> for MongoResultDocument {
    fn from(value: SprintResultEntity) -> Self {
        Self {
            session_id: value.session_id.to_string(),
            connection_id: value.connection_id.to_string(),
            user_id: value.user_id.map(|id| id.to_string()),
            display_name: value.display_name,
            tap_count: value.tap_count,
            recorded_at_ms: value.recorded_at_ms as i64,
        }
    }
}

impl TryFrom<MongoResultDocument> for SprintResultEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoResultDocument) -> Result<Self, Self::Error> {
        let parse = |field: &str, raw: &str| {
            Uuid::parse_str(raw).map_err(|err| MongoDaoError::InvalidDocument {
                collection: RESULT_COLLECTION_NAME,
                message: format!("bad uuid in `{field}`: {err}"),
            })
        };

        Ok(Self {
            session_id: parse("session_id", &value.session_id)?,
            connection_id: parse("connection_id", &value.connection_id)?,
            user_id: value
                .user_id
                .as_deref()
                .map(|raw| parse("user_id", raw))
                .transpose()?,
            display_name: value.display_name,
            tap_count: value.tap_count,
            recorded_at_ms: value.recorded_at_ms.max(0) as u64,
        })
    }
}

/// Result store persisting rows to a MongoDB collection.
#[derive(Clone)]
pub struct MongoResultStore {
    client: Client,
    collection: Collection<MongoResultDocument>,
}

impl MongoResultStore {
    /// Establish a connection and ensure the session index is present.
    pub async fn connect(uri: &str, db_name: Option<&str>) -> Result<Self, MongoDaoError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|source| MongoDaoError::Connect { source })?;
        let database = client.database(db_name.unwrap_or(DEFAULT_DATABASE_NAME));
        let collection = database.collection::<MongoResultDocument>(RESULT_COLLECTION_NAME);

        let index = IndexModel::builder()
            .keys(doc! { "session_id": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("result_session_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RESULT_COLLECTION_NAME,
                source,
            })?;

        Ok(Self { client, collection })
    }

    async fn ping(&self) -> Result<(), MongoDaoError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl ResultStore for MongoResultStore {
    fn write_result(&self, row: SprintResultEntity) -> BoxFuture<'static, StorageResult<()>> {
        let collection = self.collection.clone();
        Box::pin(async move {
            collection
                .insert_one(MongoResultDocument::from(row))
                .await
                .map_err(|source| MongoDaoError::Operation { source })?;
            Ok(())
        })
    }

    fn read_results(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SprintResultEntity>>> {
        let collection = self.collection.clone();
        Box::pin(async move {
            let cursor = collection
                .find(doc! { "session_id": session_id.to_string() })
                .sort(doc! { "tap_count": -1 })
                .await
                .map_err(|source| MongoDaoError::Operation { source })?;
            let documents: Vec<MongoResultDocument> = cursor
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::Operation { source })?;

            let rows = documents
                .into_iter()
                .map(SprintResultEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ping().await?;
            Ok(())
        })
    }
}
