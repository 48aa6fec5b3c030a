//! In-process store with the same commit semantics as the DynamoDB one.
//! Used by tests and local runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{BoardStore, Container, Siblings, Write};
use crate::activity::model::ActivityEntry;
use crate::boards::model::Board;
use crate::comments::model::Comment;
use crate::error::{BoardError, Result};
use crate::lists::model::TaskList;
use crate::members::model::{BoardMember, MemberBoard};
use crate::tasks::model::{Label, Task, TaskAssignee};
use crate::users::model::User;

#[derive(Debug, Clone)]
struct BoardRow {
    board: Board,
    lists_version: u64,
    /// Set once deletion has started
    closing: bool,
}

#[derive(Debug, Clone)]
struct ListRow {
    list: TaskList,
    tasks_version: u64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<String, User>,
    boards: HashMap<String, BoardRow>,
    members: BTreeMap<(String, String), BoardMember>,
    lists: HashMap<String, ListRow>,
    tasks: HashMap<String, Task>,
    assignees: BTreeMap<(String, String), TaskAssignee>,
    labels: HashMap<String, Label>,
    comments: Vec<Comment>,
    activity: Vec<ActivityEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user row; signup is handled outside this service.
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id.clone(), user);
    }
}

impl Tables {
    fn apply(&mut self, write: &Write) -> Result<()> {
        if let Some(board_id) = write.requires_open_board() {
            if !self.is_open(board_id) {
                return Err(BoardError::Contended {
                    container: Container::board(board_id).label(),
                });
            }
        }

        let ok = match write {
            Write::Guard { container, expected } => self.bump(container, *expected),
            Write::CloseBoard { board_id, expected } => match self.boards.get_mut(board_id) {
                Some(row) if row.lists_version == *expected => {
                    row.closing = true;
                    row.lists_version += 1;
                    true
                }
                _ => false,
            },
            Write::PutBoard(board) => {
                if self.boards.contains_key(&board.id) {
                    false
                } else {
                    self.boards.insert(
                        board.id.clone(),
                        BoardRow {
                            board: board.clone(),
                            lists_version: 0,
                            closing: false,
                        },
                    );
                    true
                }
            }
            Write::RenameBoard { board_id, title } => match self.boards.get_mut(board_id) {
                Some(row) => {
                    row.board.title = title.clone();
                    true
                }
                None => false,
            },
            Write::PutMember(member) => {
                let key = (member.board_id.clone(), member.user_id.clone());
                if self.members.contains_key(&key) {
                    false
                } else {
                    self.members.insert(key, member.clone());
                    true
                }
            }
            Write::SetRole {
                board_id,
                user_id,
                role,
                expected,
            } => match self.members.get_mut(&(board_id.clone(), user_id.clone())) {
                Some(m) if m.role == *expected => {
                    m.role = *role;
                    true
                }
                _ => false,
            },
            Write::DeleteMember {
                board_id,
                user_id,
                expected,
            } => {
                let key = (board_id.clone(), user_id.clone());
                match self.members.get(&key) {
                    Some(m) if m.role == *expected => {
                        self.members.remove(&key);
                        true
                    }
                    _ => false,
                }
            }
            Write::PutList(list) => {
                if self.lists.contains_key(&list.id) {
                    false
                } else {
                    self.lists.insert(
                        list.id.clone(),
                        ListRow {
                            list: list.clone(),
                            tasks_version: 0,
                        },
                    );
                    true
                }
            }
            Write::RenameList { list_id, title, .. } => match self.lists.get_mut(list_id) {
                Some(row) => {
                    row.list.title = title.clone();
                    true
                }
                None => false,
            },
            Write::SetListPosition {
                list_id, position, ..
            } => match self.lists.get_mut(list_id) {
                Some(row) => {
                    row.list.position = *position;
                    true
                }
                None => false,
            },
            Write::DeleteList { list_id, .. } => self.lists.remove(list_id).is_some(),
            Write::PutTask { task, .. } => {
                if self.tasks.contains_key(&task.id) {
                    false
                } else {
                    self.tasks.insert(task.id.clone(), task.clone());
                    true
                }
            }
            Write::UpdateTask {
                list_id,
                task_id,
                changes,
            } => match self.tasks.get_mut(task_id) {
                Some(task) if &task.list_id == list_id => {
                    if let Some(title) = &changes.title {
                        task.title = title.clone();
                    }
                    if let Some(description) = &changes.description {
                        task.description = description.clone();
                    }
                    if let Some(due_date) = &changes.due_date {
                        task.due_date = due_date.clone();
                    }
                    true
                }
                _ => false,
            },
            Write::SetTaskPosition {
                list_id,
                task_id,
                position,
            } => match self.tasks.get_mut(task_id) {
                Some(task) if &task.list_id == list_id => {
                    task.position = *position;
                    true
                }
                _ => false,
            },
            Write::RelocateTask { from_list_id, task } => match self.tasks.get_mut(&task.id) {
                Some(current) if &current.list_id == from_list_id => {
                    *current = task.clone();
                    true
                }
                _ => false,
            },
            Write::DeleteTask { list_id, task_id } => match self.tasks.get(task_id) {
                Some(task) if &task.list_id == list_id => {
                    self.tasks.remove(task_id);
                    true
                }
                _ => false,
            },
            Write::PutAssignee(link) => {
                let key = (link.task_id.clone(), link.user_id.clone());
                if self.assignees.contains_key(&key) {
                    false
                } else {
                    self.assignees.insert(key, link.clone());
                    true
                }
            }
            Write::DeleteAssignee { task_id, user_id } => self
                .assignees
                .remove(&(task_id.clone(), user_id.clone()))
                .is_some(),
            Write::PutLabel(label) => {
                if self.labels.contains_key(&label.id) {
                    false
                } else {
                    self.labels.insert(label.id.clone(), label.clone());
                    true
                }
            }
            Write::DeleteLabel { task_id, label_id } => match self.labels.get(label_id) {
                Some(label) if &label.task_id == task_id => {
                    self.labels.remove(label_id);
                    true
                }
                _ => false,
            },
            Write::PutComment(comment) => {
                if self.comments.iter().any(|c| c.id == comment.id) {
                    false
                } else {
                    self.comments.push(comment.clone());
                    true
                }
            }
            Write::PutActivity(entry) => {
                if self.activity.iter().any(|e| e.id == entry.id) {
                    false
                } else {
                    self.activity.push(entry.clone());
                    true
                }
            }
        };

        if ok {
            Ok(())
        } else {
            Err(write.condition_failure())
        }
    }

    fn is_open(&self, board_id: &str) -> bool {
        self.boards.get(board_id).is_some_and(|row| !row.closing)
    }

    fn bump(&mut self, container: &Container, expected: u64) -> bool {
        let version = match container {
            Container::Board { board_id } => self
                .boards
                .get_mut(board_id)
                .filter(|r| !r.closing)
                .map(|r| &mut r.lists_version),
            Container::List { list_id, .. } => self.lists.get_mut(list_id).map(|r| &mut r.tasks_version),
        };
        match version {
            Some(v) if *v == expected => {
                *v += 1;
                true
            }
            _ => false,
        }
    }

    fn drop_task_children(&mut self, task_id: &str) {
        self.assignees.retain(|(t, _), _| t != task_id);
        self.labels.retain(|_, l| l.task_id != task_id);
        self.comments.retain(|c| c.task_id != task_id);
    }

    fn drop_list_contents(&mut self, list_id: &str) {
        let task_ids: Vec<String> = self
            .tasks
            .values()
            .filter(|t| t.list_id == list_id)
            .map(|t| t.id.clone())
            .collect();
        for task_id in task_ids {
            self.tasks.remove(&task_id);
            self.drop_task_children(&task_id);
        }
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>> {
        Ok(self
            .tables
            .read()
            .await
            .boards
            .get(board_id)
            .map(|r| r.board.clone()))
    }

    async fn boards_for_user(&self, user_id: &str) -> Result<Vec<MemberBoard>> {
        let tables = self.tables.read().await;
        let mut boards: Vec<MemberBoard> = tables
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                tables.boards.get(&m.board_id).map(|row| MemberBoard {
                    board: row.board.clone(),
                    role: m.role,
                })
            })
            .collect();
        boards.sort_by(|a, b| a.board.created_at.cmp(&b.board.created_at));
        Ok(boards)
    }

    async fn get_member(&self, board_id: &str, user_id: &str) -> Result<Option<BoardMember>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .get(&(board_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn members_for_board(&self, board_id: &str) -> Result<Vec<BoardMember>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .values()
            .filter(|m| m.board_id == board_id)
            .cloned()
            .collect())
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<TaskList>> {
        Ok(self
            .tables
            .read()
            .await
            .lists
            .get(list_id)
            .map(|r| r.list.clone()))
    }

    async fn lists_for_board(&self, board_id: &str) -> Result<Siblings<TaskList>> {
        let tables = self.tables.read().await;
        let row = tables
            .boards
            .get(board_id)
            .ok_or_else(|| BoardError::not_found("board", board_id))?;
        let items = tables
            .lists
            .values()
            .filter(|r| r.list.board_id == board_id)
            .map(|r| r.list.clone())
            .collect();
        Ok(Siblings {
            version: row.lists_version,
            items,
        })
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(task_id).cloned())
    }

    async fn tasks_for_list(&self, list_id: &str) -> Result<Siblings<Task>> {
        let tables = self.tables.read().await;
        let row = tables
            .lists
            .get(list_id)
            .ok_or_else(|| BoardError::not_found("list", list_id))?;
        let items = tables
            .tasks
            .values()
            .filter(|t| t.list_id == list_id)
            .cloned()
            .collect();
        Ok(Siblings {
            version: row.tasks_version,
            items,
        })
    }

    async fn assignees_for_task(&self, task_id: &str) -> Result<Vec<TaskAssignee>> {
        Ok(self
            .tables
            .read()
            .await
            .assignees
            .values()
            .filter(|a| a.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn labels_for_task(&self, task_id: &str) -> Result<Vec<Label>> {
        Ok(self
            .tables
            .read()
            .await
            .labels
            .values()
            .filter(|l| l.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn comments_for_task(&self, task_id: &str) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .tables
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn recent_activity(&self, board_id: &str, limit: usize) -> Result<Vec<ActivityEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ActivityEntry> = tables
            .activity
            .iter()
            .rev()
            .filter(|e| e.board_id == board_id)
            .cloned()
            .collect();
        // Stable: entries sharing a timestamp stay newest-appended first.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        for write in &writes {
            staged.apply(write)?;
        }
        *tables = staged;
        Ok(())
    }

    async fn purge_task(&self, task_id: &str) -> Result<()> {
        self.tables.write().await.drop_task_children(task_id);
        Ok(())
    }

    async fn purge_list(&self, list_id: &str) -> Result<()> {
        self.tables.write().await.drop_list_contents(list_id);
        Ok(())
    }

    async fn purge_board(&self, board_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let list_ids: Vec<String> = tables
            .lists
            .values()
            .filter(|r| r.list.board_id == board_id)
            .map(|r| r.list.id.clone())
            .collect();
        for list_id in list_ids {
            tables.lists.remove(&list_id);
            tables.drop_list_contents(&list_id);
        }
        tables.members.retain(|(b, _), _| b != board_id);
        tables.activity.retain(|e| e.board_id != board_id);
        tables.boards.remove(board_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::model::Role;

    fn board(id: &str) -> Board {
        Board {
            id: id.into(),
            title: "Board".into(),
            created_at: crate::now_timestamp(),
        }
    }

    fn list(id: &str, board_id: &str, position: i64) -> TaskList {
        TaskList {
            id: id.into(),
            board_id: board_id.into(),
            title: id.into(),
            position,
            created_at: crate::now_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.commit(vec![Write::PutBoard(board("b1"))]).await.unwrap();

        let result = store
            .commit(vec![
                Write::PutList(list("l1", "b1", 1)),
                Write::RenameBoard {
                    board_id: "missing".into(),
                    title: "x".into(),
                },
            ])
            .await;

        assert!(matches!(result, Err(BoardError::NotFound { .. })));
        assert!(store.get_list("l1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_guard_is_contention() {
        let store = MemoryStore::new();
        store.commit(vec![Write::PutBoard(board("b1"))]).await.unwrap();

        let guard = Write::Guard {
            container: Container::board("b1"),
            expected: 0,
        };
        store
            .commit(vec![guard.clone(), Write::PutList(list("l1", "b1", 1))])
            .await
            .unwrap();

        let stale = store
            .commit(vec![guard, Write::PutList(list("l2", "b1", 1))])
            .await;
        assert!(matches!(stale, Err(BoardError::Contended { .. })));
        assert_eq!(store.lists_for_board("b1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_set_role_checks_expected_role() {
        let store = MemoryStore::new();
        store
            .commit(vec![
                Write::PutBoard(board("b1")),
                Write::PutMember(BoardMember {
                    board_id: "b1".into(),
                    user_id: "u1".into(),
                    role: Role::Member,
                    joined_at: crate::now_timestamp(),
                }),
            ])
            .await
            .unwrap();

        let result = store
            .commit(vec![Write::SetRole {
                board_id: "b1".into(),
                user_id: "u1".into(),
                role: Role::Admin,
                expected: Role::Owner,
            }])
            .await;
        assert!(matches!(result, Err(BoardError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_purge_board_removes_everything() {
        let store = MemoryStore::new();
        store
            .commit(vec![
                Write::PutBoard(board("b1")),
                Write::PutList(list("l1", "b1", 1)),
            ])
            .await
            .unwrap();

        store.purge_board("b1").await.unwrap();

        assert!(store.get_board("b1").await.unwrap().is_none());
        assert!(store.get_list("l1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_board_rejects_list_and_task_writes() {
        let store = MemoryStore::new();
        store
            .commit(vec![
                Write::PutBoard(board("b1")),
                Write::PutList(list("l1", "b1", 1)),
            ])
            .await
            .unwrap();
        let l1 = store.get_list("l1").await.unwrap().unwrap();
        // Versions read before the board is closed
        let lists_version = store.lists_for_board("b1").await.unwrap().version;
        let tasks_version = store.tasks_for_list("l1").await.unwrap().version;

        store
            .commit(vec![Write::CloseBoard {
                board_id: "b1".into(),
                expected: lists_version,
            }])
            .await
            .unwrap();

        let late_list = store
            .commit(vec![
                Write::Guard {
                    container: Container::board("b1"),
                    expected: lists_version + 1,
                },
                Write::PutList(list("l2", "b1", 2)),
            ])
            .await;
        assert!(matches!(late_list, Err(BoardError::Contended { .. })));

        let late_task = store
            .commit(vec![Write::Guard {
                container: Container::list(&l1),
                expected: tasks_version,
            }])
            .await;
        assert!(matches!(late_task, Err(BoardError::Contended { .. })));
        assert!(store.get_list("l2").await.unwrap().is_none());
    }
}
