//! Append-only board activity log.

pub mod model;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::store::{BoardStore, Write};
pub use model::{ActivityAction, ActivityEntry};

/// Sink for activity rows
#[async_trait]
pub trait ActivityLogger: Send + Sync {
    async fn append(
        &self,
        action: ActivityAction,
        board_id: &str,
        user_id: &str,
        metadata: Value,
    ) -> Result<ActivityEntry>;
}

/// Logger that writes rows to the board store
pub struct StoreActivityLog {
    store: Arc<dyn BoardStore>,
}

impl StoreActivityLog {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActivityLogger for StoreActivityLog {
    async fn append(
        &self,
        action: ActivityAction,
        board_id: &str,
        user_id: &str,
        metadata: Value,
    ) -> Result<ActivityEntry> {
        let entry = ActivityEntry {
            id: crate::new_id(),
            action,
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            created_at: crate::now_timestamp(),
            metadata,
        };
        self.store.commit(vec![Write::PutActivity(entry.clone())]).await?;
        Ok(entry)
    }
}

/// Most recent entries first, at most `limit`
pub async fn recent_activity(store: &dyn BoardStore, board_id: &str, limit: usize) -> Result<Vec<ActivityEntry>> {
    store.recent_activity(board_id, limit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_recent_activity_newest_first_and_bounded() {
        let store: Arc<dyn BoardStore> = Arc::new(MemoryStore::new());
        let log = StoreActivityLog::new(store.clone());

        for i in 0..3 {
            log.append(ActivityAction::TaskCreated, "b1", "alice", json!({ "n": i }))
                .await
                .unwrap();
        }
        log.append(ActivityAction::ListCreated, "b2", "alice", Value::Null)
            .await
            .unwrap();

        let entries = recent_activity(store.as_ref(), "b1", 2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].metadata, json!({ "n": 2 }));
        assert_eq!(entries[1].metadata, json!({ "n": 1 }));
    }
}
