use serde::{Deserialize, Deserializer, Serialize};

use crate::ordering::Positioned;

/// Task domain model - a unit of work held by exactly one list
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub list_id: String,
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339, normalised on write
    pub due_date: Option<String>,
    /// Dense 1-based rank inside the owning list
    pub position: i64,
    pub created_at: String,
}

impl Positioned for Task {
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

/// (task, user) assignment link
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignee {
    pub task_id: String,
    pub user_id: String,
    pub assigned_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub list_id: String,
}

/// Partial update. `null` clears description / due date, absence keeps them.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<String>>,
}

impl UpdateTaskPayload {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskPayload {
    pub new_list_id: String,
    pub new_position: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLabelPayload {
    pub name: String,
    pub color: String,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_payload_distinguishes_null_from_absent() {
        let cleared: UpdateTaskPayload =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.due_date, None);

        let empty: UpdateTaskPayload = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
