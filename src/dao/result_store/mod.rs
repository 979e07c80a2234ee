//! Result store backends and the trait the core talks to.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{models::SprintResultEntity, storage::StorageResult};

/// Abstraction over the persistence layer for sprint results.
///
/// Rows are write-once per player per session; durable rows outlive the
/// in-memory aggregate so late result queries still succeed.
pub trait ResultStore: Send + Sync {
    /// Persist one result row.
    fn write_result(&self, row: SprintResultEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Read every row for a session, tap count descending.
    fn read_results(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SprintResultEntity>>>;
    /// Cheap connectivity probe used by the health endpoint and supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
