use serde::{Deserialize, Serialize};

use crate::ordering::Positioned;

/// Ordered column of tasks on a board
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub board_id: String,
    pub title: String,
    /// Dense 1-based rank among the board's lists
    pub position: i64,
    pub created_at: String,
}

impl Positioned for TaskList {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListPayload {
    pub title: String,
    pub board_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameListPayload {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveListPayload {
    pub new_position: i64,
}
