//! In-process result store used as the default backend and in tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{models::SprintResultEntity, storage::StorageResult};

use super::ResultStore;

/// Result store keeping rows in a process-local map.
///
/// Rows survive session eviction for the process lifetime, which satisfies the
/// grace-period contract without an external database.
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    rows: Arc<DashMap<Uuid, Vec<SprintResultEntity>>>,
}

impl MemoryResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn write_result(&self, row: SprintResultEntity) -> BoxFuture<'static, StorageResult<()>> {
        let rows = self.rows.clone();
        Box::pin(async move {
            rows.entry(row.session_id).or_default().push(row);
            Ok(())
        })
    }

    fn read_results(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SprintResultEntity>>> {
        let rows = self.rows.clone();
        Box::pin(async move {
            let mut results = rows
                .get(&session_id)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();
            results.sort_by(|a, b| b.tap_count.cmp(&a.tap_count));
            Ok(results)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
