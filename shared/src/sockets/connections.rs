//! WebSocket connection bookkeeping in the board table.
//!
//! `CONNECTION#cid / CONNECTION` holds the authenticated user. Joining a board
//! writes `BOARD#b / CONNECTION#cid` (fan-out lookup) and `CONNECTION#cid / BOARD#b`
//! (cleanup on disconnect).

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;
use taskboard_atoms::{now_timestamp, BoardError, Result};

const CONNECTION_SK: &str = "CONNECTION";

#[derive(Clone)]
pub struct ConnectionRegistry {
    client: DynamoClient,
    table_name: String,
}

fn connection_pk(connection_id: &str) -> String {
    format!("CONNECTION#{}", connection_id)
}

fn board_pk(board_id: &str) -> String {
    format!("BOARD#{}", board_id)
}

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

impl ConnectionRegistry {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn put(&self, item: HashMap<String, AttributeValue>) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| BoardError::failed(format!("DynamoDB put_item error: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, pk: String, sk: String) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", s(pk))
            .key("SK", s(sk))
            .send()
            .await
            .map_err(|e| BoardError::failed(format!("DynamoDB delete_item error: {}", e)))?;
        Ok(())
    }

    async fn rows(
        &self,
        pk: String,
        prefix: &str,
        projection: &str,
    ) -> Result<Vec<HashMap<String, AttributeValue>>> {
        let mut rows = Vec::new();
        let mut start = None;
        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :prefix)")
                .expression_attribute_values(":pk", s(pk.clone()))
                .expression_attribute_values(":prefix", s(prefix))
                .projection_expression(projection)
                .set_exclusive_start_key(start.take())
                .send()
                .await
                .map_err(|e| BoardError::failed(format!("DynamoDB query error: {}", e)))?;

            rows.extend(result.items().iter().cloned());

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start = Some(key.clone()),
                _ => break,
            }
        }
        Ok(rows)
    }

    async fn sort_keys(&self, pk: String, prefix: &str) -> Result<Vec<String>> {
        let rows = self.rows(pk, prefix, "SK").await?;
        Ok(rows
            .iter()
            .filter_map(|item| item.get("SK").and_then(|v| v.as_s().ok()).cloned())
            .collect())
    }

    /// Record the user behind a freshly opened connection.
    pub async fn register(&self, connection_id: &str, user_id: &str) -> Result<()> {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), s(connection_pk(connection_id)));
        item.insert("SK".to_string(), s(CONNECTION_SK));
        item.insert("user_id".to_string(), s(user_id));
        item.insert("connected_at".to_string(), s(now_timestamp()));
        self.put(item).await?;

        tracing::info!("Registered connection {} for user {}", connection_id, user_id);
        Ok(())
    }

    pub async fn user_for(&self, connection_id: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(connection_pk(connection_id)))
            .key("SK", s(CONNECTION_SK))
            .send()
            .await
            .map_err(|e| BoardError::failed(format!("DynamoDB get_item error: {}", e)))?;

        Ok(result
            .item()
            .and_then(|item| item.get("user_id"))
            .and_then(|v| v.as_s().ok())
            .cloned())
    }

    /// Subscribe a connection to a board's events. Access must already be checked.
    pub async fn join(&self, connection_id: &str, board_id: &str, user_id: &str) -> Result<()> {
        let mut fan_out = HashMap::new();
        fan_out.insert("PK".to_string(), s(board_pk(board_id)));
        fan_out.insert("SK".to_string(), s(connection_pk(connection_id)));
        fan_out.insert("user_id".to_string(), s(user_id));
        self.put(fan_out).await?;

        let mut reverse = HashMap::new();
        reverse.insert("PK".to_string(), s(connection_pk(connection_id)));
        reverse.insert("SK".to_string(), s(board_pk(board_id)));
        self.put(reverse).await?;

        tracing::debug!("Connection {} joined board {}", connection_id, board_id);
        Ok(())
    }

    pub async fn leave(&self, connection_id: &str, board_id: &str) -> Result<()> {
        self.delete(board_pk(board_id), connection_pk(connection_id)).await?;
        self.delete(connection_pk(connection_id), board_pk(board_id)).await
    }

    pub async fn connections_for_board(&self, board_id: &str) -> Result<Vec<String>> {
        let keys = self.sort_keys(board_pk(board_id), "CONNECTION#").await?;
        Ok(keys
            .iter()
            .filter_map(|sk| sk.strip_prefix("CONNECTION#"))
            .map(str::to_string)
            .collect())
    }

    /// Unsubscribe every connection a user holds on a board.
    pub async fn leave_user(&self, board_id: &str, user_id: &str) -> Result<usize> {
        let rows = self.rows(board_pk(board_id), "CONNECTION#", "SK, user_id").await?;
        let connection_ids = connections_of_user(&rows, user_id);
        for connection_id in &connection_ids {
            self.leave(connection_id, board_id).await?;
        }

        if !connection_ids.is_empty() {
            tracing::info!(
                "Dropped {} connection(s) of user {} from board {}",
                connection_ids.len(),
                user_id,
                board_id
            );
        }
        Ok(connection_ids.len())
    }

    /// Drop a connection and every board subscription it holds.
    pub async fn remove(&self, connection_id: &str) -> Result<()> {
        for sk in self.sort_keys(connection_pk(connection_id), "BOARD#").await? {
            if let Some(board_id) = sk.strip_prefix("BOARD#") {
                self.leave(connection_id, board_id).await?;
            }
        }
        self.delete(connection_pk(connection_id), CONNECTION_SK.to_string()).await?;

        tracing::info!("Removed connection {}", connection_id);
        Ok(())
    }
}

/// Connection ids among `BOARD#b / CONNECTION#cid` rows that belong to `user_id`.
fn connections_of_user(rows: &[HashMap<String, AttributeValue>], user_id: &str) -> Vec<String> {
    rows.iter()
        .filter(|item| {
            item.get("user_id")
                .and_then(|v| v.as_s().ok())
                .is_some_and(|owner| owner == user_id)
        })
        .filter_map(|item| item.get("SK").and_then(|v| v.as_s().ok()))
        .filter_map(|sk| sk.strip_prefix("CONNECTION#"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(connection_id: &str, user_id: Option<&str>) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("SK".to_string(), s(connection_pk(connection_id)));
        if let Some(user_id) = user_id {
            item.insert("user_id".to_string(), s(user_id));
        }
        item
    }

    #[test]
    fn test_connections_of_user_picks_only_that_user() {
        let rows = vec![
            row("c1", Some("alice")),
            row("c2", Some("bob")),
            row("c3", Some("alice")),
            row("c4", None),
        ];

        assert_eq!(connections_of_user(&rows, "alice"), vec!["c1", "c3"]);
        assert_eq!(connections_of_user(&rows, "bob"), vec!["c2"]);
        assert!(connections_of_user(&rows, "carol").is_empty());
    }
}
