//! Post-commit side effects: one activity row, one domain event, then an
//! `activity_created` event carrying the row. Each step is isolated; a
//! failure is logged and never reaches the caller.

use serde_json::Value;
use std::sync::Arc;
use taskboard_atoms::activity::{ActivityAction, ActivityEntry, ActivityLogger};
use taskboard_atoms::realtime::Broadcaster;

pub const ACTIVITY_CREATED: &str = "activity_created";

/// What a committed mutation wants the outside world to know
#[derive(Debug, Clone)]
pub struct Emission {
    pub board_id: String,
    pub user_id: String,
    /// `None` when nothing should be logged (board deletion)
    pub action: Option<ActivityAction>,
    /// `None` when nothing but the activity row should be broadcast
    pub event: Option<&'static str>,
    pub payload: Value,
    pub metadata: Value,
}

impl Emission {
    pub fn new(board_id: &str, user_id: &str, action: ActivityAction, event: &'static str, payload: Value) -> Self {
        Self {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            action: Some(action),
            event: Some(event),
            payload,
            metadata: Value::Null,
        }
    }

    /// Activity row only, no domain event
    pub fn log_only(board_id: &str, user_id: &str, action: ActivityAction) -> Self {
        Self {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            action: Some(action),
            event: None,
            payload: Value::Null,
            metadata: Value::Null,
        }
    }

    /// Domain event only, nothing logged
    pub fn event_only(board_id: &str, user_id: &str, event: &'static str, payload: Value) -> Self {
        Self {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            action: None,
            event: Some(event),
            payload,
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone)]
pub struct Effects {
    logger: Arc<dyn ActivityLogger>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Effects {
    pub fn new(logger: Arc<dyn ActivityLogger>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { logger, broadcaster }
    }

    pub async fn emit(&self, emission: Emission) {
        let entry = match emission.action {
            Some(action) => self.log(action, &emission).await,
            None => None,
        };

        if let Some(event) = emission.event {
            self.publish(&emission.board_id, event, &emission.payload).await;
        }

        if let Some(entry) = entry {
            match serde_json::to_value(&entry) {
                Ok(row) => self.publish(&emission.board_id, ACTIVITY_CREATED, &row).await,
                Err(e) => tracing::warn!(side_effect = "broadcast", "Failed to encode activity row: {}", e),
            }
        }
    }

    async fn log(&self, action: ActivityAction, emission: &Emission) -> Option<ActivityEntry> {
        match self
            .logger
            .append(action, &emission.board_id, &emission.user_id, emission.metadata.clone())
            .await
        {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    side_effect = "activity",
                    board_id = %emission.board_id,
                    "Failed to log {}: {}",
                    action,
                    e
                );
                None
            }
        }
    }

    /// Drop a departed member's realtime subscriptions to the board
    pub async fn revoke(&self, board_id: &str, user_id: &str) {
        if let Err(e) = self.broadcaster.revoke(board_id, user_id).await {
            tracing::warn!(
                side_effect = "broadcast",
                board_id = %board_id,
                "Failed to revoke subscriptions of {}: {}",
                user_id,
                e
            );
        }
    }

    async fn publish(&self, board_id: &str, event: &str, payload: &Value) {
        if let Err(e) = self.broadcaster.publish(board_id, event, payload).await {
            tracing::warn!(side_effect = "broadcast", board_id = %board_id, "Failed to publish {}: {}", event, e);
        }
    }
}
