//! Persistence seam for board state.
//!
//! Reads are plain keyed lookups. Every mutation goes through [`BoardStore::commit`],
//! which applies a batch of [`Write`]s atomically: either every write and every
//! condition holds, or nothing changes.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::activity::model::ActivityEntry;
use crate::boards::model::Board;
use crate::comments::model::Comment;
use crate::error::{BoardError, Result};
use crate::lists::model::TaskList;
use crate::members::model::{BoardMember, MemberBoard, Role};
use crate::tasks::model::{Label, Task, TaskAssignee};
use crate::users::model::User;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// A container whose children carry dense positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// The lists of a board
    Board { board_id: String },
    /// The tasks of a list
    List { board_id: String, list_id: String },
}

impl Container {
    pub fn board(board_id: impl Into<String>) -> Self {
        Container::Board {
            board_id: board_id.into(),
        }
    }

    pub fn list(list: &TaskList) -> Self {
        Container::List {
            board_id: list.board_id.clone(),
            list_id: list.id.clone(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Container::Board { board_id } => format!("BOARD#{}", board_id),
            Container::List { list_id, .. } => format!("LIST#{}", list_id),
        }
    }
}

/// Children of a container together with the version they were read at
#[derive(Debug, Clone)]
pub struct Siblings<T> {
    pub version: u64,
    pub items: Vec<T>,
}

/// Field changes for an existing task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
}

/// One conditional mutation inside a commit
#[derive(Debug, Clone)]
pub enum Write {
    /// Container version must still equal `expected`; bumps it
    Guard { container: Container, expected: u64 },
    PutBoard(Board),
    /// Board version must still equal `expected`; marks the board closing and
    /// bumps its version so no further list or task write can commit
    CloseBoard { board_id: String, expected: u64 },
    RenameBoard { board_id: String, title: String },
    /// Fails when the membership already exists
    PutMember(BoardMember),
    /// Fails unless the member currently holds `expected`
    SetRole {
        board_id: String,
        user_id: String,
        role: Role,
        expected: Role,
    },
    /// Fails unless the member currently holds `expected`
    DeleteMember {
        board_id: String,
        user_id: String,
        expected: Role,
    },
    PutList(TaskList),
    RenameList {
        board_id: String,
        list_id: String,
        title: String,
    },
    SetListPosition {
        board_id: String,
        list_id: String,
        position: i64,
    },
    DeleteList { board_id: String, list_id: String },
    PutTask { board_id: String, task: Task },
    UpdateTask {
        list_id: String,
        task_id: String,
        changes: TaskChanges,
    },
    SetTaskPosition {
        list_id: String,
        task_id: String,
        position: i64,
    },
    /// Re-home a task: `task` carries the destination list and position
    RelocateTask { from_list_id: String, task: Task },
    DeleteTask { list_id: String, task_id: String },
    /// Fails when the link already exists
    PutAssignee(TaskAssignee),
    /// Fails when the link is absent
    DeleteAssignee { task_id: String, user_id: String },
    PutLabel(Label),
    /// Fails when the label is absent
    DeleteLabel { task_id: String, label_id: String },
    PutComment(Comment),
    PutActivity(ActivityEntry),
}

impl Write {
    /// Board whose row this write updates directly
    pub fn board_row(&self) -> Option<&str> {
        match self {
            Write::Guard {
                container: Container::Board { board_id },
                ..
            }
            | Write::CloseBoard { board_id, .. }
            | Write::RenameBoard { board_id, .. } => Some(board_id),
            Write::PutBoard(board) => Some(&board.id),
            _ => None,
        }
    }

    /// Board that must be open (present and not closing) for this write to commit
    pub fn requires_open_board(&self) -> Option<&str> {
        match self {
            Write::Guard {
                container: Container::List { board_id, .. },
                ..
            }
            | Write::PutTask { board_id, .. } => Some(board_id),
            Write::PutList(list) => Some(&list.board_id),
            _ => None,
        }
    }

    /// Error reported when this write's condition does not hold.
    pub fn condition_failure(&self) -> BoardError {
        match self {
            Write::Guard { container, .. } => BoardError::Contended {
                container: container.label(),
            },
            Write::PutBoard(board) => BoardError::conflict(format!("board {} already exists", board.id)),
            Write::CloseBoard { board_id, .. } => BoardError::Contended {
                container: Container::board(board_id.clone()).label(),
            },
            Write::RenameBoard { board_id, .. } => BoardError::not_found("board", board_id.clone()),
            Write::PutMember(_) => BoardError::conflict("user is already a member"),
            Write::SetRole { user_id, .. } | Write::DeleteMember { user_id, .. } => {
                BoardError::conflict(format!("membership of {} changed concurrently", user_id))
            }
            Write::PutList(list) => BoardError::conflict(format!("list {} already exists", list.id)),
            Write::RenameList { list_id, .. }
            | Write::SetListPosition { list_id, .. }
            | Write::DeleteList { list_id, .. } => BoardError::not_found("list", list_id.clone()),
            Write::PutTask { task, .. } => BoardError::conflict(format!("task {} already exists", task.id)),
            Write::UpdateTask { task_id, .. }
            | Write::SetTaskPosition { task_id, .. }
            | Write::DeleteTask { task_id, .. } => BoardError::not_found("task", task_id.clone()),
            Write::RelocateTask { task, .. } => BoardError::not_found("task", task.id.clone()),
            Write::PutAssignee(_) => BoardError::conflict("user is already assigned to this task"),
            Write::DeleteAssignee { user_id, .. } => BoardError::not_found("assignee", user_id.clone()),
            Write::PutLabel(label) => BoardError::conflict(format!("label {} already exists", label.id)),
            Write::DeleteLabel { label_id, .. } => BoardError::not_found("label", label_id.clone()),
            Write::PutComment(comment) => {
                BoardError::conflict(format!("comment {} already exists", comment.id))
            }
            Write::PutActivity(entry) => {
                BoardError::conflict(format!("activity {} already exists", entry.id))
            }
        }
    }
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>>;
    async fn boards_for_user(&self, user_id: &str) -> Result<Vec<MemberBoard>>;

    async fn get_member(&self, board_id: &str, user_id: &str) -> Result<Option<BoardMember>>;
    async fn members_for_board(&self, board_id: &str) -> Result<Vec<BoardMember>>;

    async fn get_list(&self, list_id: &str) -> Result<Option<TaskList>>;
    /// Lists of a board with the board's list version. NotFound when the board is gone.
    async fn lists_for_board(&self, board_id: &str) -> Result<Siblings<TaskList>>;

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>>;
    /// Tasks of a list with the list's task version. NotFound when the list is gone.
    async fn tasks_for_list(&self, list_id: &str) -> Result<Siblings<Task>>;

    async fn assignees_for_task(&self, task_id: &str) -> Result<Vec<TaskAssignee>>;
    async fn labels_for_task(&self, task_id: &str) -> Result<Vec<Label>>;
    async fn comments_for_task(&self, task_id: &str) -> Result<Vec<Comment>>;

    /// Most recent first
    async fn recent_activity(&self, board_id: &str, limit: usize) -> Result<Vec<ActivityEntry>>;

    /// Apply every write atomically or none of them.
    async fn commit(&self, writes: Vec<Write>) -> Result<()>;

    /// Remove assignees, labels and comments of a deleted task
    async fn purge_task(&self, task_id: &str) -> Result<()>;
    /// Remove the tasks (and their children) of a deleted list
    async fn purge_list(&self, list_id: &str) -> Result<()>;
    /// Remove a board and everything it owns. The board must be closed first.
    async fn purge_board(&self, board_id: &str) -> Result<()>;
}

/// Re-run `op` while it fails with contention, with linear backoff.
pub async fn retry_on_contention<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::debug!("Retrying after contention (attempt {}): {}", attempt, e);
                sleep(Duration::from_millis(15 * attempt as u64)).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_after_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_on_contention(5, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BoardError::Contended {
                    container: "LIST#x".into(),
                })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_and_keeps_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_on_contention(3, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(BoardError::Contended {
                container: "BOARD#b".into(),
            })
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), "Conflict");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_domain_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_on_contention(5, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(BoardError::AccessDenied)
        })
        .await;

        assert!(matches!(result, Err(BoardError::AccessDenied)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
