//! Every board operation runs the same sequence: resolve the caller's board
//! and role, gate the role, run the domain service (re-reading and retrying on
//! container contention) under a timeout, then fire side effects.

use futures::future::try_join_all;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use taskboard_atoms::access::{self, Access, AccessRequest, Operation};
use taskboard_atoms::activity::{self, ActivityAction, ActivityEntry};
use taskboard_atoms::boards::{self, CreateBoardPayload, RenameBoardPayload};
use taskboard_atoms::comments::{self, Comment, CreateCommentPayload};
use taskboard_atoms::lists::{self, CreateListPayload, MoveListPayload, RenameListPayload, TaskList};
use taskboard_atoms::members::{self, BoardMember, MemberBoard, UpdateRolePayload};
use taskboard_atoms::store::{retry_on_contention, BoardStore};
use taskboard_atoms::tasks::{
    self, CreateLabelPayload, CreateTaskPayload, Label, MoveTaskPayload, Task, TaskAssignee, UpdateTaskPayload,
};
use taskboard_atoms::{BoardError, Result};

use crate::effects::{Effects, Emission};
use crate::types::{BoardDetail, ListWithTasks, TaskCard};

/// Limits applied to every orchestrated operation
#[derive(Debug, Clone)]
pub struct Settings {
    pub operation_timeout: Duration,
    /// Attempts per operation when a container changed under us
    pub max_attempts: u32,
    pub activity_page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_millis(10_000),
            max_attempts: 5,
            activity_page_size: 50,
        }
    }
}

#[derive(Clone)]
pub struct BoardOrchestrator {
    store: Arc<dyn BoardStore>,
    effects: Effects,
    settings: Settings,
}

impl BoardOrchestrator {
    pub fn new(store: Arc<dyn BoardStore>, effects: Effects, settings: Settings) -> Self {
        Self {
            store,
            effects,
            settings,
        }
    }

    pub fn store(&self) -> &dyn BoardStore {
        self.store.as_ref()
    }

    /// Resolve then gate. Nothing is written when this fails.
    pub async fn authorize(&self, request: &AccessRequest, user_id: &str, op: Operation) -> Result<Access> {
        let access = access::resolve(self.store.as_ref(), request, user_id).await?;
        access::authorize(access.role, op.allowed_roles())?;
        Ok(access)
    }

    /// Run `fut` under the operation timeout. Expiry is an operation failure.
    async fn bounded<T, F>(&self, name: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match tokio::time::timeout(self.settings.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BoardError::failed(format!("{} timed out", name))),
        };
        match &result {
            Err(e @ BoardError::OperationFailed(_)) => tracing::error!("{} failed: {}", name, e),
            Err(e) => tracing::debug!("{} rejected: {}", name, e),
            Ok(_) => {}
        }
        result
    }

    // ========== BOARDS ==========

    pub async fn create_board(&self, user_id: &str, payload: CreateBoardPayload) -> Result<MemberBoard> {
        let store = self.store.as_ref();
        let created = self
            .bounded("create_board", boards::create_board(store, user_id, &payload.title))
            .await?;

        self.effects
            .emit(
                Emission::log_only(&created.board.id, user_id, ActivityAction::BoardCreated)
                    .with_metadata(json!({ "title": created.board.title })),
            )
            .await;
        Ok(created)
    }

    pub async fn my_boards(&self, user_id: &str) -> Result<Vec<MemberBoard>> {
        self.bounded("my_boards", boards::boards_for_user(self.store.as_ref(), user_id))
            .await
    }

    pub async fn get_board(&self, user_id: &str, board_id: &str) -> Result<BoardDetail> {
        self.bounded("get_board", async {
            let access = self
                .authorize(&AccessRequest::board(board_id), user_id, Operation::ReadBoard)
                .await?;
            let store = self.store.as_ref();
            let (board, members) = futures::try_join!(
                boards::get_board(store, &access.board_id),
                members::members_for_board(store, &access.board_id),
            )?;
            Ok(BoardDetail {
                board,
                role: access.role,
                members,
            })
        })
        .await
    }

    pub async fn rename_board(&self, user_id: &str, board_id: &str, payload: RenameBoardPayload) -> Result<boards::Board> {
        let board = self
            .bounded("rename_board", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::RenameBoard)
                    .await?;
                boards::rename_board(self.store.as_ref(), &access.board_id, user_id, &payload.title).await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board.id, user_id, ActivityAction::BoardRenamed, "board_renamed", json!(board))
                    .with_metadata(json!({ "title": board.title })),
            )
            .await;
        Ok(board)
    }

    /// Deletion cascades the activity log away, so only the event is sent.
    pub async fn delete_board(&self, user_id: &str, board_id: &str) -> Result<()> {
        let board = self
            .bounded("delete_board", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::DeleteBoard)
                    .await?;
                let store = self.store.as_ref();
                let board_id = access.board_id.as_str();
                retry_on_contention(self.settings.max_attempts, move || {
                    boards::delete_board(store, board_id, user_id)
                })
                .await
            })
            .await?;

        self.effects
            .emit(Emission::event_only(
                &board.id,
                user_id,
                "board_deleted",
                json!({ "boardId": board.id }),
            ))
            .await;
        Ok(())
    }

    // ========== MEMBERS ==========

    pub async fn members(&self, user_id: &str, board_id: &str) -> Result<Vec<BoardMember>> {
        self.bounded("members", async {
            let access = self
                .authorize(&AccessRequest::board(board_id), user_id, Operation::ReadBoard)
                .await?;
            members::members_for_board(self.store.as_ref(), &access.board_id).await
        })
        .await
    }

    pub async fn add_member(&self, user_id: &str, board_id: &str, target_id: &str) -> Result<BoardMember> {
        let member = self
            .bounded("add_member", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::AddMember)
                    .await?;
                members::add_member(self.store.as_ref(), &access.board_id, target_id).await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&member.board_id, user_id, ActivityAction::MemberAdded, "member_added", json!(member))
                    .with_metadata(json!({ "userId": member.user_id, "role": member.role })),
            )
            .await;
        Ok(member)
    }

    pub async fn update_role(
        &self,
        user_id: &str,
        board_id: &str,
        target_id: &str,
        payload: UpdateRolePayload,
    ) -> Result<BoardMember> {
        let member = self
            .bounded("update_role", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::UpdateRole)
                    .await?;
                members::update_role(self.store.as_ref(), &access.board_id, user_id, target_id, &payload.role).await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&member.board_id, user_id, ActivityAction::RoleUpdated, "role_updated", json!(member))
                    .with_metadata(json!({ "userId": member.user_id, "role": member.role })),
            )
            .await;
        Ok(member)
    }

    pub async fn remove_member(&self, user_id: &str, board_id: &str, target_id: &str) -> Result<()> {
        let member = self
            .bounded("remove_member", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::RemoveMember)
                    .await?;
                members::remove_member(self.store.as_ref(), &access.board_id, target_id).await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(
                    &member.board_id,
                    user_id,
                    ActivityAction::MemberRemoved,
                    "member_removed",
                    json!({ "boardId": member.board_id, "userId": member.user_id }),
                )
                .with_metadata(json!({ "userId": member.user_id })),
            )
            .await;
        self.effects.revoke(&member.board_id, &member.user_id).await;
        Ok(())
    }

    pub async fn leave_board(&self, user_id: &str, board_id: &str) -> Result<()> {
        let member = self
            .bounded("leave_board", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::LeaveBoard)
                    .await?;
                members::leave_board(self.store.as_ref(), &access.board_id, user_id).await
            })
            .await?;

        self.effects
            .emit(Emission::new(
                &member.board_id,
                user_id,
                ActivityAction::MemberLeft,
                "member_left",
                json!({ "boardId": member.board_id, "userId": member.user_id }),
            ))
            .await;
        self.effects.revoke(&member.board_id, &member.user_id).await;
        Ok(())
    }

    pub async fn transfer_ownership(
        &self,
        user_id: &str,
        board_id: &str,
        target_id: &str,
    ) -> Result<members::OwnershipTransfer> {
        let transfer = self
            .bounded("transfer_ownership", async {
                let access = self
                    .authorize(&AccessRequest::board(board_id), user_id, Operation::TransferOwnership)
                    .await?;
                members::transfer_ownership(self.store.as_ref(), &access.board_id, user_id, target_id).await
            })
            .await?;

        let board_id = transfer.new_owner.board_id.clone();
        self.effects
            .emit(
                Emission::new(
                    &board_id,
                    user_id,
                    ActivityAction::OwnershipTransferred,
                    "ownership_transferred",
                    json!({
                        "boardId": board_id,
                        "previousOwnerId": transfer.previous_owner.user_id,
                        "newOwnerId": transfer.new_owner.user_id,
                    }),
                )
                .with_metadata(json!({
                    "from": transfer.previous_owner.user_id,
                    "to": transfer.new_owner.user_id,
                })),
            )
            .await;
        Ok(transfer)
    }

    // ========== LISTS ==========

    /// Lists of a board in order, each with its ordered tasks
    pub async fn lists_with_tasks(&self, user_id: &str, board_id: &str) -> Result<Vec<ListWithTasks>> {
        self.bounded("lists_with_tasks", async {
            let access = self
                .authorize(&AccessRequest::board(board_id), user_id, Operation::ReadBoard)
                .await?;
            let store = self.store.as_ref();
            let lists = lists::lists_for_board(store, &access.board_id).await?;
            try_join_all(lists.into_iter().map(|list| async move {
                let tasks = tasks::tasks_for_list(store, &list.id).await?;
                let cards = try_join_all(tasks.into_iter().map(|task| task_card(store, task))).await?;
                Ok::<_, BoardError>(ListWithTasks { list, tasks: cards })
            }))
            .await
        })
        .await
    }

    pub async fn create_list(&self, user_id: &str, payload: CreateListPayload) -> Result<TaskList> {
        let list = self
            .bounded("create_list", async {
                let access = self
                    .authorize(&AccessRequest::board(&payload.board_id), user_id, Operation::CreateList)
                    .await?;
                let store = self.store.as_ref();
                let board_id = access.board_id.as_str();
                let title = payload.title.as_str();
                retry_on_contention(self.settings.max_attempts, move || {
                    lists::create_list(store, board_id, title)
                })
                .await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&list.board_id, user_id, ActivityAction::ListCreated, "list_created", json!(list))
                    .with_metadata(json!({ "listId": list.id, "title": list.title })),
            )
            .await;
        Ok(list)
    }

    pub async fn rename_list(&self, user_id: &str, list_id: &str, payload: RenameListPayload) -> Result<TaskList> {
        let list = self
            .bounded("rename_list", async {
                self.authorize(&AccessRequest::list(list_id), user_id, Operation::RenameList)
                    .await?;
                lists::rename_list(self.store.as_ref(), list_id, &payload.title).await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&list.board_id, user_id, ActivityAction::ListRenamed, "list_updated", json!(list))
                    .with_metadata(json!({ "listId": list.id, "title": list.title })),
            )
            .await;
        Ok(list)
    }

    pub async fn move_list(&self, user_id: &str, list_id: &str, payload: MoveListPayload) -> Result<TaskList> {
        let lists::ListMove { list, from_position } = self
            .bounded("move_list", async {
                self.authorize(&AccessRequest::list(list_id), user_id, Operation::MoveList)
                    .await?;
                let store = self.store.as_ref();
                let new_position = payload.new_position;
                retry_on_contention(self.settings.max_attempts, move || {
                    lists::move_list(store, list_id, new_position)
                })
                .await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&list.board_id, user_id, ActivityAction::ListMoved, "list_moved", json!(list))
                    .with_metadata(json!({
                        "listId": list.id,
                        "fromPosition": from_position,
                        "toPosition": list.position,
                    })),
            )
            .await;
        Ok(list)
    }

    pub async fn delete_list(&self, user_id: &str, list_id: &str) -> Result<()> {
        let list = self
            .bounded("delete_list", async {
                self.authorize(&AccessRequest::list(list_id), user_id, Operation::DeleteList)
                    .await?;
                let store = self.store.as_ref();
                retry_on_contention(self.settings.max_attempts, move || lists::delete_list(store, list_id)).await
            })
            .await?;

        self.effects
            .emit(
                Emission::new(
                    &list.board_id,
                    user_id,
                    ActivityAction::ListDeleted,
                    "list_deleted",
                    json!({ "listId": list.id, "boardId": list.board_id }),
                )
                .with_metadata(json!({ "listId": list.id, "title": list.title })),
            )
            .await;
        Ok(())
    }

    // ========== TASKS ==========

    pub async fn create_task(&self, user_id: &str, payload: CreateTaskPayload) -> Result<Task> {
        let (task, board_id) = self
            .bounded("create_task", async {
                let access = self
                    .authorize(&AccessRequest::list(&payload.list_id), user_id, Operation::CreateTask)
                    .await?;
                let store = self.store.as_ref();
                let payload = &payload;
                let task = retry_on_contention(self.settings.max_attempts, move || {
                    tasks::create_task(store, payload.clone())
                })
                .await?;
                Ok((task, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::TaskCreated, "task_created", json!(task))
                    .with_metadata(json!({ "taskId": task.id, "listId": task.list_id, "title": task.title })),
            )
            .await;
        Ok(task)
    }

    pub async fn get_task(&self, user_id: &str, task_id: &str) -> Result<TaskCard> {
        self.bounded("get_task", async {
            self.authorize(&AccessRequest::task(task_id), user_id, Operation::ReadBoard)
                .await?;
            let store = self.store.as_ref();
            let task = tasks::get_task(store, task_id).await?;
            task_card(store, task).await
        })
        .await
    }

    pub async fn update_task(&self, user_id: &str, task_id: &str, payload: UpdateTaskPayload) -> Result<Task> {
        let (task, board_id) = self
            .bounded("update_task", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::UpdateTask)
                    .await?;
                let task = tasks::update_task(self.store.as_ref(), task_id, payload).await?;
                Ok((task, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::TaskUpdated, "task_updated", json!(task))
                    .with_metadata(json!({ "taskId": task.id, "title": task.title })),
            )
            .await;
        Ok(task)
    }

    /// The caller is authorized against the task's current board; the
    /// destination list must belong to that same board.
    pub async fn move_task(&self, user_id: &str, task_id: &str, payload: MoveTaskPayload) -> Result<Task> {
        let (moved, board_id) = self
            .bounded("move_task", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::MoveTask)
                    .await?;
                let store = self.store.as_ref();
                let new_list_id = payload.new_list_id.as_str();
                let new_position = payload.new_position;
                let moved = retry_on_contention(self.settings.max_attempts, move || {
                    tasks::move_task(store, task_id, new_list_id, new_position)
                })
                .await?;
                Ok((moved, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::TaskMoved, "task_moved", json!(moved.task))
                    .with_metadata(json!({
                        "taskId": moved.task.id,
                        "fromListId": moved.from_list_id,
                        "toListId": moved.task.list_id,
                        "fromPosition": moved.from_position,
                        "toPosition": moved.task.position,
                    })),
            )
            .await;
        Ok(moved.task)
    }

    pub async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<()> {
        let (task, board_id) = self
            .bounded("delete_task", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::DeleteTask)
                    .await?;
                let store = self.store.as_ref();
                let task =
                    retry_on_contention(self.settings.max_attempts, move || tasks::delete_task(store, task_id)).await?;
                Ok((task, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(
                    &board_id,
                    user_id,
                    ActivityAction::TaskDeleted,
                    "task_deleted",
                    json!({ "taskId": task.id, "listId": task.list_id }),
                )
                .with_metadata(json!({ "taskId": task.id, "title": task.title })),
            )
            .await;
        Ok(())
    }

    pub async fn assign_user(&self, user_id: &str, task_id: &str, assignee_id: &str) -> Result<TaskAssignee> {
        let (link, board_id) = self
            .bounded("assign_user", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::AssignTask)
                    .await?;
                let link = tasks::assign_user(self.store.as_ref(), &access.board_id, task_id, assignee_id).await?;
                Ok((link, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::TaskAssigned, "task_assigned", json!(link))
                    .with_metadata(json!({ "taskId": link.task_id, "userId": link.user_id })),
            )
            .await;
        Ok(link)
    }

    pub async fn unassign_user(&self, user_id: &str, task_id: &str, assignee_id: &str) -> Result<()> {
        let board_id = self
            .bounded("unassign_user", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::UnassignTask)
                    .await?;
                tasks::unassign_user(self.store.as_ref(), task_id, assignee_id).await?;
                Ok(access.board_id)
            })
            .await?;

        let link = json!({ "taskId": task_id, "userId": assignee_id });
        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::TaskUnassigned, "task_unassigned", link.clone())
                    .with_metadata(link),
            )
            .await;
        Ok(())
    }

    pub async fn add_label(&self, user_id: &str, task_id: &str, payload: CreateLabelPayload) -> Result<Label> {
        let (label, board_id) = self
            .bounded("add_label", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::AddLabel)
                    .await?;
                let label = tasks::add_label(self.store.as_ref(), task_id, payload).await?;
                Ok((label, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::LabelAdded, "label_added", json!(label))
                    .with_metadata(json!({ "taskId": label.task_id, "name": label.name })),
            )
            .await;
        Ok(label)
    }

    pub async fn remove_label(&self, user_id: &str, task_id: &str, label_id: &str) -> Result<()> {
        let board_id = self
            .bounded("remove_label", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::RemoveLabel)
                    .await?;
                tasks::remove_label(self.store.as_ref(), task_id, label_id).await?;
                Ok(access.board_id)
            })
            .await?;

        let removed = json!({ "taskId": task_id, "labelId": label_id });
        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::LabelRemoved, "label_removed", removed.clone())
                    .with_metadata(removed),
            )
            .await;
        Ok(())
    }

    // ========== COMMENTS ==========

    pub async fn comments(&self, user_id: &str, task_id: &str) -> Result<Vec<Comment>> {
        self.bounded("comments", async {
            self.authorize(&AccessRequest::task(task_id), user_id, Operation::ReadBoard)
                .await?;
            comments::comments_for_task(self.store.as_ref(), task_id).await
        })
        .await
    }

    pub async fn add_comment(&self, user_id: &str, task_id: &str, payload: CreateCommentPayload) -> Result<Comment> {
        let (comment, board_id) = self
            .bounded("add_comment", async {
                let access = self
                    .authorize(&AccessRequest::task(task_id), user_id, Operation::AddComment)
                    .await?;
                let comment = comments::add_comment(self.store.as_ref(), task_id, user_id, &payload.content).await?;
                Ok((comment, access.board_id))
            })
            .await?;

        self.effects
            .emit(
                Emission::new(&board_id, user_id, ActivityAction::CommentAdded, "comment_added", json!(comment))
                    .with_metadata(json!({ "taskId": comment.task_id, "commentId": comment.id })),
            )
            .await;
        Ok(comment)
    }

    // ========== ACTIVITY ==========

    /// Most recent first. `limit` is clamped to the configured page size.
    pub async fn recent_activity(&self, user_id: &str, board_id: &str, limit: Option<usize>) -> Result<Vec<ActivityEntry>> {
        let page = self.settings.activity_page_size;
        let limit = limit.unwrap_or(page).clamp(1, page.max(1));
        self.bounded("recent_activity", async {
            let access = self
                .authorize(&AccessRequest::board(board_id), user_id, Operation::ReadBoard)
                .await?;
            activity::recent_activity(self.store.as_ref(), &access.board_id, limit).await
        })
        .await
    }

    /// Membership check for realtime subscriptions
    pub async fn join_board(&self, user_id: &str, board_id: &str) -> Result<Access> {
        self.bounded(
            "join_board",
            self.authorize(&AccessRequest::board(board_id), user_id, Operation::ReadBoard),
        )
        .await
    }
}

async fn task_card(store: &dyn BoardStore, task: Task) -> Result<TaskCard> {
    let (assignees, labels) = futures::try_join!(store.assignees_for_task(&task.id), store.labels_for_task(&task.id))?;
    Ok(TaskCard {
        task,
        assignees,
        labels,
    })
}
