use crate::error::{BoardError, Result};
use crate::members::model::Role;
use crate::store::BoardStore;

/// Identifiers a request carries. Any combination may be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessRequest {
    pub board_id: Option<String>,
    pub task_id: Option<String>,
    pub list_id: Option<String>,
}

impl AccessRequest {
    pub fn board(board_id: impl Into<String>) -> Self {
        Self {
            board_id: Some(board_id.into()),
            ..Self::default()
        }
    }

    pub fn task(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Self::default()
        }
    }

    pub fn list(list_id: impl Into<String>) -> Self {
        Self {
            list_id: Some(list_id.into()),
            ..Self::default()
        }
    }

    pub fn with_list(mut self, list_id: impl Into<String>) -> Self {
        self.list_id = Some(list_id.into());
        self
    }
}

/// Effective board of a request and the caller's role on it
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    pub board_id: String,
    pub role: Role,
}

/// Derive the board a request targets and the caller's role on it.
///
/// An explicit board id is the baseline. A task id re-derives the board from
/// the task's list, and a list id re-derives it from the list, each
/// overriding what came before. A missing membership is `AccessDenied`,
/// never `NotFound`, so board existence does not leak.
pub async fn resolve(store: &dyn BoardStore, request: &AccessRequest, user_id: &str) -> Result<Access> {
    let mut board_id = request.board_id.clone().filter(|id| !id.is_empty());

    if let Some(task_id) = request.task_id.as_deref().filter(|id| !id.is_empty()) {
        let task = store
            .get_task(task_id)
            .await?
            .ok_or_else(|| BoardError::not_found("task", task_id))?;
        let list = store
            .get_list(&task.list_id)
            .await?
            .ok_or_else(|| BoardError::not_found("list", task.list_id.clone()))?;
        board_id = Some(list.board_id);
    }

    if let Some(list_id) = request.list_id.as_deref().filter(|id| !id.is_empty()) {
        let list = store
            .get_list(list_id)
            .await?
            .ok_or_else(|| BoardError::not_found("list", list_id))?;
        board_id = Some(list.board_id);
    }

    let board_id = board_id.ok_or_else(|| BoardError::invalid("board id could not be determined"))?;

    match store.get_member(&board_id, user_id).await? {
        Some(member) => Ok(Access {
            board_id,
            role: member.role,
        }),
        None => {
            tracing::debug!("User {} has no membership on board {}", user_id, board_id);
            Err(BoardError::AccessDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::model::Board;
    use crate::lists::model::TaskList;
    use crate::members::model::BoardMember;
    use crate::store::{MemoryStore, Write};
    use crate::tasks::model::Task;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let now = crate::now_timestamp();
        let mut writes = Vec::new();
        for (board_id, list_id) in [("b1", "l1"), ("b2", "l2")] {
            writes.push(Write::PutBoard(Board {
                id: board_id.into(),
                title: board_id.into(),
                created_at: now.clone(),
            }));
            writes.push(Write::PutList(TaskList {
                id: list_id.into(),
                board_id: board_id.into(),
                title: list_id.into(),
                position: 1,
                created_at: now.clone(),
            }));
        }
        writes.push(Write::PutTask {
            board_id: "b2".into(),
            task: Task {
                id: "t2".into(),
                list_id: "l2".into(),
                title: "task".into(),
                description: None,
                due_date: None,
                position: 1,
                created_at: now.clone(),
            },
        });
        writes.push(Write::PutMember(BoardMember {
            board_id: "b1".into(),
            user_id: "alice".into(),
            role: Role::Owner,
            joined_at: now.clone(),
        }));
        writes.push(Write::PutMember(BoardMember {
            board_id: "b2".into(),
            user_id: "alice".into(),
            role: Role::Member,
            joined_at: now,
        }));
        store.commit(writes).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_task_alone_yields_its_board() {
        let store = seeded().await;
        let access = resolve(&store, &AccessRequest::task("t2"), "alice").await.unwrap();
        assert_eq!(access.board_id, "b2");
        assert_eq!(access.role, Role::Member);
    }

    #[tokio::test]
    async fn test_list_overrides_mismatched_board() {
        let store = seeded().await;
        let request = AccessRequest::board("b1").with_list("l2");
        let access = resolve(&store, &request, "alice").await.unwrap();
        assert_eq!(access.board_id, "b2");
    }

    #[tokio::test]
    async fn test_no_identifiers_is_invalid() {
        let store = seeded().await;
        let result = resolve(&store, &AccessRequest::default(), "alice").await;
        assert!(matches!(result, Err(BoardError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let store = seeded().await;
        let result = resolve(&store, &AccessRequest::task("nope"), "alice").await;
        assert!(matches!(result, Err(BoardError::NotFound { resource: "task", .. })));
    }

    #[tokio::test]
    async fn test_non_member_is_denied_even_for_missing_board() {
        let store = seeded().await;
        let outsider = resolve(&store, &AccessRequest::board("b1"), "mallory").await;
        assert!(matches!(outsider, Err(BoardError::AccessDenied)));

        let ghost = resolve(&store, &AccessRequest::board("ghost"), "alice").await;
        assert!(matches!(ghost, Err(BoardError::AccessDenied)));
    }
}
