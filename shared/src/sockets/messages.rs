use serde::{Deserialize, Serialize};

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
pub struct WebSocketMessage {
    pub action: String,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl WebSocketMessage {
    pub fn parsed_action(&self) -> Option<WebSocketAction> {
        serde_json::from_value(serde_json::Value::String(self.action.clone())).ok()
    }

    /// `boardId` carried alongside the action, if any
    pub fn board_id(&self) -> Option<&str> {
        self.data
            .get("boardId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// WebSocket action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSocketAction {
    JoinBoard,
    LeaveBoard,
}

/// Envelope pushed to every connection joined to a board
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage<'a> {
    pub r#type: &'a str,
    pub board_id: &'a str,
    pub payload: &'a serde_json::Value,
}

impl<'a> BroadcastMessage<'a> {
    pub fn new(message_type: &'a str, board_id: &'a str, payload: &'a serde_json::Value) -> Self {
        Self {
            r#type: message_type,
            board_id,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_message() {
        let message: WebSocketMessage =
            serde_json::from_str(r#"{"action":"join_board","boardId":"b-1"}"#).unwrap();
        assert_eq!(message.parsed_action(), Some(WebSocketAction::JoinBoard));
        assert_eq!(message.board_id(), Some("b-1"));
    }

    #[test]
    fn test_unknown_action() {
        let message: WebSocketMessage = serde_json::from_str(r#"{"action":"dance"}"#).unwrap();
        assert_eq!(message.parsed_action(), None);
        assert_eq!(message.board_id(), None);
    }

    #[test]
    fn test_broadcast_envelope_keeps_payload_nested() {
        let payload = json!({"id": "t-1", "type": "task"});
        let body = serde_json::to_value(BroadcastMessage::new("task_created", "b-1", &payload)).unwrap();
        assert_eq!(body["type"], "task_created");
        assert_eq!(body["boardId"], "b-1");
        assert_eq!(body["payload"]["type"], "task");
    }
}
