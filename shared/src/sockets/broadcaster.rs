use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use aws_sdk_apigatewaymanagement::Client as ManagementClient;
use futures::future::join_all;
use serde_json::Value;
use taskboard_atoms::realtime::Broadcaster;
use taskboard_atoms::{BoardError, Result};

use super::connections::ConnectionRegistry;
use super::messages::BroadcastMessage;

/// Pushes board events to API Gateway WebSocket connections.
///
/// Channels are board ids. Connections reported gone are pruned from the registry.
#[derive(Clone)]
pub struct ApiGatewayBroadcaster {
    client: ManagementClient,
    connections: ConnectionRegistry,
}

impl ApiGatewayBroadcaster {
    pub fn new(sdk_config: &aws_config::SdkConfig, endpoint: &str, connections: ConnectionRegistry) -> Self {
        let config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config)
            .endpoint_url(endpoint)
            .build();
        Self {
            client: ManagementClient::from_conf(config),
            connections,
        }
    }

    /// Returns whether the connection still exists.
    async fn post(&self, connection_id: &str, body: &[u8]) -> Result<bool> {
        let result = self
            .client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(body.to_vec()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_gone_exception()) => Ok(false),
            Err(e) => Err(BoardError::failed(format!(
                "post_to_connection {} failed: {}",
                connection_id, e
            ))),
        }
    }
}

#[async_trait]
impl Broadcaster for ApiGatewayBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: &Value) -> Result<()> {
        let body = serde_json::to_vec(&BroadcastMessage::new(event, channel, payload))
            .map_err(|e| BoardError::failed(format!("Failed to encode {}: {}", event, e)))?;
        let connection_ids = self.connections.connections_for_board(channel).await?;

        let results = join_all(connection_ids.iter().map(|id| self.post(id, &body))).await;

        let mut failures = 0;
        for (connection_id, result) in connection_ids.iter().zip(results) {
            match result {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("Pruning gone connection {}", connection_id);
                    if let Err(e) = self.connections.remove(connection_id).await {
                        tracing::warn!("Failed to prune connection {}: {}", connection_id, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(BoardError::failed(format!(
                "{} of {} deliveries for {} failed",
                failures,
                connection_ids.len(),
                event
            )));
        }
        Ok(())
    }

    async fn revoke(&self, channel: &str, user_id: &str) -> Result<()> {
        self.connections.leave_user(channel, user_id).await?;
        Ok(())
    }
}
