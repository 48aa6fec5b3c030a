use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BoardError;

/// What happened on a board
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    BoardCreated,
    BoardRenamed,
    OwnershipTransferred,
    MemberAdded,
    RoleUpdated,
    MemberRemoved,
    MemberLeft,
    ListCreated,
    ListRenamed,
    ListMoved,
    ListDeleted,
    TaskCreated,
    TaskUpdated,
    TaskMoved,
    TaskDeleted,
    TaskAssigned,
    TaskUnassigned,
    LabelAdded,
    LabelRemoved,
    CommentAdded,
}

impl ActivityAction {
    pub const ALL: [ActivityAction; 20] = [
        ActivityAction::BoardCreated,
        ActivityAction::BoardRenamed,
        ActivityAction::OwnershipTransferred,
        ActivityAction::MemberAdded,
        ActivityAction::RoleUpdated,
        ActivityAction::MemberRemoved,
        ActivityAction::MemberLeft,
        ActivityAction::ListCreated,
        ActivityAction::ListRenamed,
        ActivityAction::ListMoved,
        ActivityAction::ListDeleted,
        ActivityAction::TaskCreated,
        ActivityAction::TaskUpdated,
        ActivityAction::TaskMoved,
        ActivityAction::TaskDeleted,
        ActivityAction::TaskAssigned,
        ActivityAction::TaskUnassigned,
        ActivityAction::LabelAdded,
        ActivityAction::LabelRemoved,
        ActivityAction::CommentAdded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::BoardCreated => "BOARD_CREATED",
            ActivityAction::BoardRenamed => "BOARD_RENAMED",
            ActivityAction::OwnershipTransferred => "OWNERSHIP_TRANSFERRED",
            ActivityAction::MemberAdded => "MEMBER_ADDED",
            ActivityAction::RoleUpdated => "ROLE_UPDATED",
            ActivityAction::MemberRemoved => "MEMBER_REMOVED",
            ActivityAction::MemberLeft => "MEMBER_LEFT",
            ActivityAction::ListCreated => "LIST_CREATED",
            ActivityAction::ListRenamed => "LIST_RENAMED",
            ActivityAction::ListMoved => "LIST_MOVED",
            ActivityAction::ListDeleted => "LIST_DELETED",
            ActivityAction::TaskCreated => "TASK_CREATED",
            ActivityAction::TaskUpdated => "TASK_UPDATED",
            ActivityAction::TaskMoved => "TASK_MOVED",
            ActivityAction::TaskDeleted => "TASK_DELETED",
            ActivityAction::TaskAssigned => "TASK_ASSIGNED",
            ActivityAction::TaskUnassigned => "TASK_UNASSIGNED",
            ActivityAction::LabelAdded => "LABEL_ADDED",
            ActivityAction::LabelRemoved => "LABEL_REMOVED",
            ActivityAction::CommentAdded => "COMMENT_ADDED",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| BoardError::invalid(format!("unknown activity action: {}", s)))
    }
}

/// Immutable activity log row
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub action: ActivityAction,
    pub board_id: String,
    pub user_id: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip_through_from_str() {
        for action in ActivityAction::ALL {
            assert_eq!(action.as_str().parse::<ActivityAction>().unwrap(), action);
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
