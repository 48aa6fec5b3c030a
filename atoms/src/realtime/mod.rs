//! Board-scoped realtime fan-out. Delivery is fire-and-forget, at most once.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::error::Result;

/// Per-channel buffer; slow receivers lag and drop the oldest events
const CHANNEL_CAPACITY: usize = 256;

/// One event as delivered to subscribers
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelEvent {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish to everyone currently joined to `channel`.
    async fn publish(&self, channel: &str, event: &str, payload: &Value) -> Result<()>;

    /// Stop delivering `channel` to a user who lost access to it. In-process
    /// receivers are owned by their holders, so the default does nothing.
    async fn revoke(&self, _channel: &str, _user_id: &str) -> Result<()> {
        Ok(())
    }
}

/// In-process broadcaster over tokio broadcast channels
#[derive(Debug, Default)]
pub struct LocalBroadcaster {
    channels: RwLock<HashMap<String, broadcast::Sender<ChannelEvent>>>,
}

impl LocalBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a channel. Only events published afterwards are received.
    pub async fn join_channel(&self, channel: &str) -> broadcast::Receiver<ChannelEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: &Value) -> Result<()> {
        let delivered = {
            let channels = self.channels.read().await;
            let Some(sender) = channels.get(channel) else {
                return Ok(());
            };
            sender
                .send(ChannelEvent {
                    channel: channel.to_string(),
                    event: event.to_string(),
                    payload: payload.clone(),
                })
                .unwrap_or(0)
        };
        tracing::debug!("Published {} on {} to {} receivers", event, channel, delivered);

        if delivered == 0 {
            self.drop_if_abandoned(channel).await;
        }
        Ok(())
    }
}

impl LocalBroadcaster {
    /// Forget a channel whose receivers have all gone. Re-checked under the
    /// write lock since someone may have joined in between.
    async fn drop_if_abandoned(&self, channel: &str) {
        let mut channels = self.channels.write().await;
        if channels.get(channel).is_some_and(|s| s.receiver_count() == 0) {
            channels.remove(channel);
            tracing::debug!("Dropped abandoned channel {}", channel);
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_only_joined_channel_receives() {
        let broadcaster = LocalBroadcaster::new();
        let mut board_a = broadcaster.join_channel("a").await;
        let mut board_b = broadcaster.join_channel("b").await;

        broadcaster
            .publish("a", "task_created", &json!({ "id": "t1" }))
            .await
            .unwrap();

        let event = board_a.recv().await.unwrap();
        assert_eq!(event.event, "task_created");
        assert_eq!(event.payload, json!({ "id": "t1" }));
        assert!(board_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_listeners_is_ok() {
        let broadcaster = LocalBroadcaster::new();
        assert!(broadcaster.publish("nobody", "board_deleted", &Value::Null).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_backlog_for_late_joiners() {
        let broadcaster = LocalBroadcaster::new();
        let _early = broadcaster.join_channel("a").await;
        broadcaster.publish("a", "list_created", &Value::Null).await.unwrap();

        let mut late = broadcaster.join_channel("a").await;
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_abandoned_channel_is_forgotten() {
        let broadcaster = LocalBroadcaster::new();
        let receiver = broadcaster.join_channel("a").await;
        let _other = broadcaster.join_channel("b").await;
        drop(receiver);

        broadcaster.publish("a", "board_deleted", &Value::Null).await.unwrap();
        assert_eq!(broadcaster.channel_count().await, 1);

        // Still-joined channels survive a publish
        broadcaster.publish("b", "list_created", &Value::Null).await.unwrap();
        assert_eq!(broadcaster.channel_count().await, 1);
    }
}
