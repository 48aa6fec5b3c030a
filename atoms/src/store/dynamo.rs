//! Single-table DynamoDB store.
//!
//! Key layout:
//!
//! | PK              | SK                          | row                              |
//! |-----------------|-----------------------------|----------------------------------|
//! | `BOARD#b`       | `BOARD`                     | board, `lists_version`           |
//! | `BOARD#b`       | `MEMBER#u`                  | membership                       |
//! | `USER#u`        | `BOARD#b`                   | membership (reverse lookup)      |
//! | `BOARD#b`       | `LIST#l`                    | list, `tasks_version`            |
//! | `LIST#l`        | `LIST`                      | list index (owning board)        |
//! | `LIST#l`        | `TASK#t`                    | task                             |
//! | `TASK#t`        | `TASK`                      | task index (owning list, board)  |
//! | `TASK#t`        | `ASSIGNEE#u` / `LABEL#id` / `COMMENT#c` | task children        |
//! | `BOARD#b`       | `ACTIVITY#{created_at}#{id}`| activity entry                   |
//! | `USER#u`        | `USER#u`                    | user profile                     |
//!
//! Every [`Write`] expands to one or more transaction items; a cancelled
//! transaction is mapped back to the write whose condition failed.

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeValue, ConditionCheck, Delete, DeleteRequest, Put, TransactWriteItem, Update,
    WriteRequest,
};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::{BTreeSet, HashMap};
use tokio::time::{sleep, Duration};

use super::{BoardStore, Container, Siblings, TaskChanges, Write};
use crate::activity::model::{ActivityAction, ActivityEntry};
use crate::boards::model::Board;
use crate::comments::model::Comment;
use crate::error::{BoardError, Result};
use crate::lists::model::TaskList;
use crate::members::model::{BoardMember, MemberBoard, Role};
use crate::tasks::model::{Label, Task, TaskAssignee};
use crate::users::model::User;

type Item = HashMap<String, AttributeValue>;

/// Hard limit of items in one DynamoDB transaction
const MAX_TRANSACT_ITEMS: usize = 100;
const BATCH_SIZE: usize = 25;

const MAX_BATCH_ATTEMPTS: u64 = 5;

const EXISTS: &str = "attribute_exists(PK)";
const NOT_EXISTS: &str = "attribute_not_exists(PK)";

#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.to_string()))
            .key("SK", AttributeValue::S(sk.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| BoardError::failed(format!("DynamoDB get_item error: {}", e)))?;

        Ok(result.item().cloned())
    }

    /// All rows under `pk`, optionally restricted to an SK prefix. Follows pagination.
    async fn query(&self, pk: &str, sk_prefix: Option<&str>) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .consistent_read(true)
                .set_exclusive_start_key(start.take());

            request = match sk_prefix {
                Some(prefix) => request
                    .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                    .expression_attribute_values(":sk_prefix", AttributeValue::S(prefix.to_string())),
                None => request.key_condition_expression("PK = :pk"),
            };

            let result = request
                .send()
                .await
                .map_err(|e| BoardError::failed(format!("DynamoDB query error: {}", e)))?;

            items.extend(result.items().iter().cloned());

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn list_version(&self, board_id: &str, list_id: &str) -> Result<u64> {
        let item = self
            .get(&board_pk(board_id), &format!("LIST#{}", list_id))
            .await?
            .ok_or_else(|| BoardError::not_found("list", list_id))?;
        Ok(attr_u64(&item, "tasks_version"))
    }

    /// Owning board of a list, via its index row
    async fn list_board(&self, list_id: &str) -> Result<Option<String>> {
        Ok(self
            .get(&list_pk(list_id), "LIST")
            .await?
            .map(|item| attr_s(&item, "board_id")))
    }

    fn put(&self, item: Item, condition: Option<&str>) -> Result<TransactWriteItem> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .set_condition_expression(condition.map(str::to_string))
            .build()
            .map_err(|e| BoardError::failed(format!("Failed to build put: {}", e)))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn update(
        &self,
        pk: String,
        sk: String,
        expression: String,
        condition: Option<&str>,
        names: &[(&str, &str)],
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<TransactWriteItem> {
        let mut builder = Update::builder()
            .table_name(&self.table_name)
            .set_key(Some(key(pk, sk)))
            .update_expression(expression)
            .set_condition_expression(condition.map(str::to_string));
        for (placeholder, name) in names {
            builder = builder.expression_attribute_names(*placeholder, *name);
        }
        for (placeholder, value) in values {
            builder = builder.expression_attribute_values(placeholder, value);
        }
        let update = builder
            .build()
            .map_err(|e| BoardError::failed(format!("Failed to build update: {}", e)))?;
        Ok(TransactWriteItem::builder().update(update).build())
    }

    fn delete(&self, pk: String, sk: String, condition: Option<&str>) -> Result<TransactWriteItem> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(key(pk, sk)))
            .set_condition_expression(condition.map(str::to_string))
            .build()
            .map_err(|e| BoardError::failed(format!("Failed to build delete: {}", e)))?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    fn delete_with_role(&self, pk: String, sk: String, expected: Role) -> Result<TransactWriteItem> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(key(pk, sk)))
            .condition_expression("#role = :expected")
            .expression_attribute_names("#role", "role")
            .expression_attribute_values(":expected", AttributeValue::S(expected.as_str().to_string()))
            .build()
            .map_err(|e| BoardError::failed(format!("Failed to build delete: {}", e)))?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    /// Fails the transaction once the board is gone or closing
    fn check_open(&self, board_id: &str) -> Result<TransactWriteItem> {
        let check = ConditionCheck::builder()
            .table_name(&self.table_name)
            .set_key(Some(key(board_pk(board_id), "BOARD".to_string())))
            .condition_expression("attribute_exists(PK) AND attribute_not_exists(closing)")
            .build()
            .map_err(|e| BoardError::failed(format!("Failed to build condition check: {}", e)))?;
        Ok(TransactWriteItem::builder().condition_check(check).build())
    }

    fn check_exists(&self, pk: String, sk: String) -> Result<TransactWriteItem> {
        let check = ConditionCheck::builder()
            .table_name(&self.table_name)
            .set_key(Some(key(pk, sk)))
            .condition_expression(EXISTS)
            .build()
            .map_err(|e| BoardError::failed(format!("Failed to build condition check: {}", e)))?;
        Ok(TransactWriteItem::builder().condition_check(check).build())
    }

    /// Expand one write into its transaction items
    fn transact_items(&self, write: &Write) -> Result<Vec<TransactWriteItem>> {
        let items = match write {
            Write::Guard { container, expected } => {
                let (pk, sk, field, condition) = match container {
                    Container::Board { board_id } => (
                        board_pk(board_id),
                        "BOARD".to_string(),
                        "lists_version",
                        "attribute_exists(PK) AND attribute_not_exists(closing) AND #version = :expected",
                    ),
                    Container::List { board_id, list_id } => (
                        board_pk(board_id),
                        format!("LIST#{}", list_id),
                        "tasks_version",
                        "attribute_exists(PK) AND #version = :expected",
                    ),
                };
                vec![self.update(
                    pk,
                    sk,
                    "SET #version = #version + :one".to_string(),
                    Some(condition),
                    &[("#version", field)],
                    vec![
                        (":one", AttributeValue::N("1".to_string())),
                        (":expected", AttributeValue::N(expected.to_string())),
                    ],
                )?]
            }
            Write::PutBoard(board) => vec![self.put(board_item(board), Some(NOT_EXISTS))?],
            Write::CloseBoard { board_id, expected } => vec![self.update(
                board_pk(board_id),
                "BOARD".to_string(),
                "SET #version = #version + :one, closing = :closing".to_string(),
                Some("attribute_exists(PK) AND #version = :expected"),
                &[("#version", "lists_version")],
                vec![
                    (":one", AttributeValue::N("1".to_string())),
                    (":expected", AttributeValue::N(expected.to_string())),
                    (":closing", AttributeValue::Bool(true)),
                ],
            )?],
            Write::RenameBoard { board_id, title } => vec![self.update(
                board_pk(board_id),
                "BOARD".to_string(),
                "SET #title = :title".to_string(),
                Some(EXISTS),
                &[("#title", "title")],
                vec![(":title", AttributeValue::S(title.clone()))],
            )?],
            Write::PutMember(member) => {
                let (row, reverse) = member_items(member);
                vec![self.put(row, Some(NOT_EXISTS))?, self.put(reverse, None)?]
            }
            Write::SetRole {
                board_id,
                user_id,
                role,
                expected,
            } => vec![
                self.update(
                    board_pk(board_id),
                    format!("MEMBER#{}", user_id),
                    "SET #role = :role".to_string(),
                    Some("#role = :expected"),
                    &[("#role", "role")],
                    vec![
                        (":role", AttributeValue::S(role.as_str().to_string())),
                        (":expected", AttributeValue::S(expected.as_str().to_string())),
                    ],
                )?,
                self.update(
                    user_pk(user_id),
                    format!("BOARD#{}", board_id),
                    "SET #role = :role".to_string(),
                    None,
                    &[("#role", "role")],
                    vec![(":role", AttributeValue::S(role.as_str().to_string()))],
                )?,
            ],
            Write::DeleteMember {
                board_id,
                user_id,
                expected,
            } => vec![
                self.delete_with_role(board_pk(board_id), format!("MEMBER#{}", user_id), *expected)?,
                self.delete(user_pk(user_id), format!("BOARD#{}", board_id), None)?,
            ],
            Write::PutList(list) => {
                let (row, index) = list_items(list);
                vec![self.put(row, Some(NOT_EXISTS))?, self.put(index, None)?]
            }
            Write::RenameList {
                board_id,
                list_id,
                title,
            } => vec![self.update(
                board_pk(board_id),
                format!("LIST#{}", list_id),
                "SET #title = :title".to_string(),
                Some(EXISTS),
                &[("#title", "title")],
                vec![(":title", AttributeValue::S(title.clone()))],
            )?],
            Write::SetListPosition {
                board_id,
                list_id,
                position,
            } => vec![self.update(
                board_pk(board_id),
                format!("LIST#{}", list_id),
                "SET #position = :position".to_string(),
                Some(EXISTS),
                &[("#position", "position")],
                vec![(":position", AttributeValue::N(position.to_string()))],
            )?],
            Write::DeleteList { board_id, list_id } => vec![
                self.delete(board_pk(board_id), format!("LIST#{}", list_id), Some(EXISTS))?,
                self.delete(list_pk(list_id), "LIST".to_string(), None)?,
            ],
            Write::PutTask { board_id, task } => {
                let index = task_index_item(&task.id, &task.list_id, board_id);
                vec![self.put(task_item(task), Some(NOT_EXISTS))?, self.put(index, None)?]
            }
            Write::UpdateTask {
                list_id,
                task_id,
                changes,
            } => vec![self.update_task(list_id, task_id, changes)?],
            Write::SetTaskPosition {
                list_id,
                task_id,
                position,
            } => vec![self.update(
                list_pk(list_id),
                format!("TASK#{}", task_id),
                "SET #position = :position".to_string(),
                Some(EXISTS),
                &[("#position", "position")],
                vec![(":position", AttributeValue::N(position.to_string()))],
            )?],
            Write::RelocateTask { from_list_id, task } => vec![
                self.delete(list_pk(from_list_id), format!("TASK#{}", task.id), Some(EXISTS))?,
                self.put(task_item(task), None)?,
                self.update(
                    task_pk(&task.id),
                    "TASK".to_string(),
                    "SET list_id = :list_id".to_string(),
                    None,
                    &[],
                    vec![(":list_id", AttributeValue::S(task.list_id.clone()))],
                )?,
            ],
            Write::DeleteTask { list_id, task_id } => vec![
                self.delete(list_pk(list_id), format!("TASK#{}", task_id), Some(EXISTS))?,
                self.delete(task_pk(task_id), "TASK".to_string(), None)?,
            ],
            Write::PutAssignee(link) => vec![self.put(assignee_item(link), Some(NOT_EXISTS))?],
            Write::DeleteAssignee { task_id, user_id } => {
                vec![self.delete(task_pk(task_id), format!("ASSIGNEE#{}", user_id), Some(EXISTS))?]
            }
            Write::PutLabel(label) => vec![self.put(label_item(label), Some(NOT_EXISTS))?],
            Write::DeleteLabel { task_id, label_id } => {
                vec![self.delete(task_pk(task_id), format!("LABEL#{}", label_id), Some(EXISTS))?]
            }
            Write::PutComment(comment) => vec![self.put(comment_item(comment), Some(NOT_EXISTS))?],
            Write::PutActivity(entry) => vec![self.put(activity_item(entry)?, Some(NOT_EXISTS))?],
        };
        Ok(items)
    }

    fn update_task(&self, list_id: &str, task_id: &str, changes: &TaskChanges) -> Result<TransactWriteItem> {
        let mut sets = Vec::new();
        let mut removes = Vec::new();
        let mut names: Vec<(&str, &str)> = Vec::new();
        let mut values = Vec::new();

        if let Some(title) = &changes.title {
            sets.push("#title = :title");
            names.push(("#title", "title"));
            values.push((":title", AttributeValue::S(title.clone())));
        }
        match &changes.description {
            Some(Some(description)) => {
                sets.push("#description = :description");
                names.push(("#description", "description"));
                values.push((":description", AttributeValue::S(description.clone())));
            }
            Some(None) => {
                removes.push("#description");
                names.push(("#description", "description"));
            }
            None => {}
        }
        match &changes.due_date {
            Some(Some(due_date)) => {
                sets.push("#due_date = :due_date");
                names.push(("#due_date", "due_date"));
                values.push((":due_date", AttributeValue::S(due_date.clone())));
            }
            Some(None) => {
                removes.push("#due_date");
                names.push(("#due_date", "due_date"));
            }
            None => {}
        }

        if sets.is_empty() && removes.is_empty() {
            return self.check_exists(list_pk(list_id), format!("TASK#{}", task_id));
        }

        let mut expression = String::new();
        if !sets.is_empty() {
            expression.push_str(&format!("SET {}", sets.join(", ")));
        }
        if !removes.is_empty() {
            if !expression.is_empty() {
                expression.push(' ');
            }
            expression.push_str(&format!("REMOVE {}", removes.join(", ")));
        }

        self.update(
            list_pk(list_id),
            format!("TASK#{}", task_id),
            expression,
            Some(EXISTS),
            &names,
            values,
        )
    }

    /// Batch delete keys (25 per request, unprocessed items retried with backoff)
    async fn batch_delete(&self, keys: &[Item]) -> Result<()> {
        for chunk in keys.chunks(BATCH_SIZE) {
            let mut write_reqs = Vec::with_capacity(chunk.len());
            for k in chunk {
                let request = DeleteRequest::builder()
                    .set_key(Some(k.clone()))
                    .build()
                    .map_err(|e| BoardError::failed(format!("Failed to build delete request: {}", e)))?;
                write_reqs.push(WriteRequest::builder().delete_request(request).build());
            }

            let mut pending = write_reqs;
            let mut attempt = 0;
            loop {
                attempt += 1;
                let result = self
                    .client
                    .batch_write_item()
                    .request_items(&self.table_name, pending)
                    .send()
                    .await
                    .map_err(|e| BoardError::failed(format!("DynamoDB batch_write_item error: {}", e)))?;

                pending = result
                    .unprocessed_items()
                    .and_then(|m| m.get(&self.table_name))
                    .cloned()
                    .unwrap_or_default();

                if !another_batch_round(attempt, pending.len())? {
                    break;
                }
                sleep(Duration::from_millis(100 * attempt)).await;
            }
        }
        Ok(())
    }

    /// Keys of a task's children plus its index row
    async fn task_child_keys(&self, task_id: &str, keys: &mut Vec<Item>) -> Result<()> {
        let pk = task_pk(task_id);
        for item in self.query(&pk, None).await? {
            let sk = attr_s(&item, "SK");
            keys.push(key(pk.clone(), sk));
        }
        Ok(())
    }

    async fn list_content_keys(&self, list_id: &str, keys: &mut Vec<Item>) -> Result<()> {
        let pk = list_pk(list_id);
        for item in self.query(&pk, None).await? {
            let sk = attr_s(&item, "SK");
            if let Some(task_id) = sk.strip_prefix("TASK#") {
                self.task_child_keys(task_id, keys).await?;
            }
            keys.push(key(pk.clone(), sk));
        }
        Ok(())
    }
}

#[async_trait]
impl BoardStore for DynamoStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let pk = user_pk(user_id);
        Ok(self.get(&pk, &pk).await?.map(|item| User {
            id: user_id.to_string(),
            name: attr_s(&item, "user_name"),
            email: attr_s(&item, "user_email"),
        }))
    }

    async fn get_board(&self, board_id: &str) -> Result<Option<Board>> {
        Ok(self
            .get(&board_pk(board_id), "BOARD")
            .await?
            .map(|item| board_from(board_id, &item)))
    }

    async fn boards_for_user(&self, user_id: &str) -> Result<Vec<MemberBoard>> {
        let mut boards = Vec::new();
        for item in self.query(&user_pk(user_id), Some("BOARD#")).await? {
            let sk = attr_s(&item, "SK");
            let Some(board_id) = sk.strip_prefix("BOARD#") else {
                continue;
            };
            let role = attr_role(&item)?;
            if let Some(board) = self.get_board(board_id).await? {
                boards.push(MemberBoard { board, role });
            }
        }
        boards.sort_by(|a, b| a.board.created_at.cmp(&b.board.created_at));
        Ok(boards)
    }

    async fn get_member(&self, board_id: &str, user_id: &str) -> Result<Option<BoardMember>> {
        match self.get(&board_pk(board_id), &format!("MEMBER#{}", user_id)).await? {
            Some(item) => Ok(Some(member_from(board_id, user_id, &item)?)),
            None => Ok(None),
        }
    }

    async fn members_for_board(&self, board_id: &str) -> Result<Vec<BoardMember>> {
        let mut members = Vec::new();
        for item in self.query(&board_pk(board_id), Some("MEMBER#")).await? {
            let sk = attr_s(&item, "SK");
            if let Some(user_id) = sk.strip_prefix("MEMBER#") {
                members.push(member_from(board_id, user_id, &item)?);
            }
        }
        Ok(members)
    }

    async fn get_list(&self, list_id: &str) -> Result<Option<TaskList>> {
        let Some(board_id) = self.list_board(list_id).await? else {
            return Ok(None);
        };
        Ok(self
            .get(&board_pk(&board_id), &format!("LIST#{}", list_id))
            .await?
            .map(|item| list_from(&board_id, list_id, &item)))
    }

    async fn lists_for_board(&self, board_id: &str) -> Result<Siblings<TaskList>> {
        // Version first: anything committed after it fails the guard.
        let board = self
            .get(&board_pk(board_id), "BOARD")
            .await?
            .ok_or_else(|| BoardError::not_found("board", board_id))?;
        let version = attr_u64(&board, "lists_version");

        let mut items = Vec::new();
        for item in self.query(&board_pk(board_id), Some("LIST#")).await? {
            let sk = attr_s(&item, "SK");
            if let Some(list_id) = sk.strip_prefix("LIST#") {
                items.push(list_from(board_id, list_id, &item));
            }
        }
        Ok(Siblings { version, items })
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let Some(index) = self.get(&task_pk(task_id), "TASK").await? else {
            return Ok(None);
        };
        let list_id = attr_s(&index, "list_id");
        Ok(self
            .get(&list_pk(&list_id), &format!("TASK#{}", task_id))
            .await?
            .map(|item| task_from(&list_id, task_id, &item)))
    }

    async fn tasks_for_list(&self, list_id: &str) -> Result<Siblings<Task>> {
        let board_id = self
            .list_board(list_id)
            .await?
            .ok_or_else(|| BoardError::not_found("list", list_id))?;
        let version = self.list_version(&board_id, list_id).await?;

        let mut items = Vec::new();
        for item in self.query(&list_pk(list_id), Some("TASK#")).await? {
            let sk = attr_s(&item, "SK");
            if let Some(task_id) = sk.strip_prefix("TASK#") {
                items.push(task_from(list_id, task_id, &item));
            }
        }
        Ok(Siblings { version, items })
    }

    async fn assignees_for_task(&self, task_id: &str) -> Result<Vec<TaskAssignee>> {
        let mut assignees = Vec::new();
        for item in self.query(&task_pk(task_id), Some("ASSIGNEE#")).await? {
            let sk = attr_s(&item, "SK");
            if let Some(user_id) = sk.strip_prefix("ASSIGNEE#") {
                assignees.push(TaskAssignee {
                    task_id: task_id.to_string(),
                    user_id: user_id.to_string(),
                    assigned_at: attr_s(&item, "assigned_at"),
                });
            }
        }
        Ok(assignees)
    }

    async fn labels_for_task(&self, task_id: &str) -> Result<Vec<Label>> {
        let mut labels = Vec::new();
        for item in self.query(&task_pk(task_id), Some("LABEL#")).await? {
            let sk = attr_s(&item, "SK");
            if let Some(label_id) = sk.strip_prefix("LABEL#") {
                labels.push(Label {
                    id: label_id.to_string(),
                    task_id: task_id.to_string(),
                    name: attr_s(&item, "name"),
                    color: attr_s(&item, "color"),
                });
            }
        }
        Ok(labels)
    }

    async fn comments_for_task(&self, task_id: &str) -> Result<Vec<Comment>> {
        let mut comments = Vec::new();
        for item in self.query(&task_pk(task_id), Some("COMMENT#")).await? {
            let sk = attr_s(&item, "SK");
            if let Some(comment_id) = sk.strip_prefix("COMMENT#") {
                comments.push(Comment {
                    id: comment_id.to_string(),
                    task_id: task_id.to_string(),
                    user_id: attr_s(&item, "user_id"),
                    content: attr_s(&item, "content"),
                    created_at: attr_s(&item, "created_at"),
                });
            }
        }
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn recent_activity(&self, board_id: &str, limit: usize) -> Result<Vec<ActivityEntry>> {
        let mut entries = Vec::new();
        let mut start: Option<Item> = None;

        while entries.len() < limit {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(board_pk(board_id)))
                .expression_attribute_values(":sk_prefix", AttributeValue::S("ACTIVITY#".to_string()))
                .scan_index_forward(false)
                .limit((limit - entries.len()).min(i32::MAX as usize) as i32)
                .set_exclusive_start_key(start.take())
                .send()
                .await
                .map_err(|e| BoardError::failed(format!("DynamoDB query error: {}", e)))?;

            for item in result.items() {
                entries.push(activity_from(board_id, item)?);
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start = Some(key.clone()),
                _ => break,
            }
        }

        entries.truncate(limit);
        Ok(entries)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut owners = Vec::new();
        let mut items = Vec::new();
        for (idx, write) in writes.iter().enumerate() {
            for item in self.transact_items(write)? {
                owners.push(Owner::Write(idx));
                items.push(item);
            }
        }
        for board_id in open_board_checks(&writes) {
            items.push(self.check_open(&board_id)?);
            owners.push(Owner::OpenBoard(board_id));
        }

        if items.is_empty() {
            return Ok(());
        }
        if items.len() > MAX_TRANSACT_ITEMS {
            return Err(BoardError::failed(format!(
                "transaction of {} items exceeds the limit of {}",
                items.len(),
                MAX_TRANSACT_ITEMS
            )));
        }

        let err = match self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        match err.as_service_error() {
            Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => {
                for (i, reason) in cancelled.cancellation_reasons().iter().enumerate() {
                    match reason.code() {
                        Some("ConditionalCheckFailed") => match owners.get(i) {
                            Some(Owner::Write(idx)) => {
                                if let Some(write) = writes.get(*idx) {
                                    return Err(write.condition_failure());
                                }
                            }
                            Some(Owner::OpenBoard(board_id)) => {
                                return Err(BoardError::Contended {
                                    container: Container::board(board_id.clone()).label(),
                                });
                            }
                            None => {}
                        },
                        Some("TransactionConflict") => {
                            return Err(BoardError::Contended {
                                container: "transaction".to_string(),
                            });
                        }
                        _ => {}
                    }
                }
                Err(BoardError::failed(format!("transaction cancelled: {}", err)))
            }
            _ => Err(BoardError::failed(format!(
                "DynamoDB transact_write_items error: {}",
                err
            ))),
        }
    }

    async fn purge_task(&self, task_id: &str) -> Result<()> {
        let mut keys = Vec::new();
        self.task_child_keys(task_id, &mut keys).await?;
        self.batch_delete(&keys).await
    }

    async fn purge_list(&self, list_id: &str) -> Result<()> {
        let mut keys = Vec::new();
        self.list_content_keys(list_id, &mut keys).await?;
        self.batch_delete(&keys).await
    }

    async fn purge_board(&self, board_id: &str) -> Result<()> {
        let pk = board_pk(board_id);
        let mut keys = Vec::new();

        for item in self.query(&pk, None).await? {
            let sk = attr_s(&item, "SK");
            if let Some(list_id) = sk.strip_prefix("LIST#") {
                self.list_content_keys(list_id, &mut keys).await?;
                keys.push(key(list_pk(list_id), "LIST".to_string()));
            } else if let Some(user_id) = sk.strip_prefix("MEMBER#") {
                keys.push(key(user_pk(user_id), format!("BOARD#{}", board_id)));
            } else if let Some(connection_id) = sk.strip_prefix("CONNECTION#") {
                keys.push(key(format!("CONNECTION#{}", connection_id), format!("BOARD#{}", board_id)));
            } else if sk == "BOARD" {
                continue;
            }
            keys.push(key(pk.clone(), sk));
        }

        tracing::info!("Purging {} items for board {}", keys.len() + 1, board_id);
        self.batch_delete(&keys).await?;
        // Board row goes last so an interrupted purge leaves it closed, not orphaned
        self.batch_delete(&[key(pk, "BOARD".to_string())]).await
    }
}

/// Which commit item a cancellation reason points at
enum Owner {
    Write(usize),
    OpenBoard(String),
}

/// Boards that must still be open for `writes` to commit, skipping boards whose
/// row the batch already updates (one transaction may touch an item only once).
fn open_board_checks(writes: &[Write]) -> Vec<String> {
    let touched: BTreeSet<&str> = writes.iter().filter_map(Write::board_row).collect();
    writes
        .iter()
        .filter_map(Write::requires_open_board)
        .filter(|board_id| !touched.contains(board_id))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Whether to send another BatchWriteItem round for `left` unprocessed deletes.
/// Running out of attempts with work left is an error.
fn another_batch_round(attempt: u64, left: usize) -> Result<bool> {
    if left == 0 {
        return Ok(false);
    }
    if attempt < MAX_BATCH_ATTEMPTS {
        return Ok(true);
    }
    tracing::error!("Giving up on {} unprocessed deletes after {} attempts", left, attempt);
    Err(BoardError::failed(format!(
        "{} deletes left unprocessed after {} attempts",
        left, attempt
    )))
}

fn board_pk(board_id: &str) -> String {
    format!("BOARD#{}", board_id)
}

fn list_pk(list_id: &str) -> String {
    format!("LIST#{}", list_id)
}

fn task_pk(task_id: &str) -> String {
    format!("TASK#{}", task_id)
}

fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

fn key(pk: String, sk: String) -> Item {
    let mut key = HashMap::new();
    key.insert("PK".to_string(), AttributeValue::S(pk));
    key.insert("SK".to_string(), AttributeValue::S(sk));
    key
}

fn attr_s(item: &Item, name: &str) -> String {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn attr_opt(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn attr_i64(item: &Item, name: &str) -> i64 {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn attr_u64(item: &Item, name: &str) -> u64 {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn attr_role(item: &Item) -> Result<Role> {
    attr_s(item, "role")
        .parse()
        .map_err(|_| BoardError::failed("stored membership has an unknown role"))
}

fn board_item(board: &Board) -> Item {
    let mut item = key(board_pk(&board.id), "BOARD".to_string());
    item.insert("title".to_string(), AttributeValue::S(board.title.clone()));
    item.insert("created_at".to_string(), AttributeValue::S(board.created_at.clone()));
    item.insert("lists_version".to_string(), AttributeValue::N("0".to_string()));
    item
}

fn board_from(board_id: &str, item: &Item) -> Board {
    Board {
        id: board_id.to_string(),
        title: attr_s(item, "title"),
        created_at: attr_s(item, "created_at"),
    }
}

fn member_items(member: &BoardMember) -> (Item, Item) {
    let role = AttributeValue::S(member.role.as_str().to_string());
    let joined = AttributeValue::S(member.joined_at.clone());

    let mut row = key(board_pk(&member.board_id), format!("MEMBER#{}", member.user_id));
    row.insert("role".to_string(), role.clone());
    row.insert("joined_at".to_string(), joined.clone());

    let mut reverse = key(user_pk(&member.user_id), format!("BOARD#{}", member.board_id));
    reverse.insert("role".to_string(), role);
    reverse.insert("joined_at".to_string(), joined);

    (row, reverse)
}

fn member_from(board_id: &str, user_id: &str, item: &Item) -> Result<BoardMember> {
    Ok(BoardMember {
        board_id: board_id.to_string(),
        user_id: user_id.to_string(),
        role: attr_role(item)?,
        joined_at: attr_s(item, "joined_at"),
    })
}

fn list_items(list: &TaskList) -> (Item, Item) {
    let mut row = key(board_pk(&list.board_id), format!("LIST#{}", list.id));
    row.insert("title".to_string(), AttributeValue::S(list.title.clone()));
    row.insert("position".to_string(), AttributeValue::N(list.position.to_string()));
    row.insert("created_at".to_string(), AttributeValue::S(list.created_at.clone()));
    row.insert("tasks_version".to_string(), AttributeValue::N("0".to_string()));

    let mut index = key(list_pk(&list.id), "LIST".to_string());
    index.insert("board_id".to_string(), AttributeValue::S(list.board_id.clone()));

    (row, index)
}

fn list_from(board_id: &str, list_id: &str, item: &Item) -> TaskList {
    TaskList {
        id: list_id.to_string(),
        board_id: board_id.to_string(),
        title: attr_s(item, "title"),
        position: attr_i64(item, "position"),
        created_at: attr_s(item, "created_at"),
    }
}

fn task_item(task: &Task) -> Item {
    let mut item = key(list_pk(&task.list_id), format!("TASK#{}", task.id));
    item.insert("title".to_string(), AttributeValue::S(task.title.clone()));
    item.insert("position".to_string(), AttributeValue::N(task.position.to_string()));
    item.insert("created_at".to_string(), AttributeValue::S(task.created_at.clone()));
    if let Some(description) = &task.description {
        item.insert("description".to_string(), AttributeValue::S(description.clone()));
    }
    if let Some(due_date) = &task.due_date {
        item.insert("due_date".to_string(), AttributeValue::S(due_date.clone()));
    }
    item
}

fn task_index_item(task_id: &str, list_id: &str, board_id: &str) -> Item {
    let mut item = key(task_pk(task_id), "TASK".to_string());
    item.insert("list_id".to_string(), AttributeValue::S(list_id.to_string()));
    item.insert("board_id".to_string(), AttributeValue::S(board_id.to_string()));
    item
}

fn task_from(list_id: &str, task_id: &str, item: &Item) -> Task {
    Task {
        id: task_id.to_string(),
        list_id: list_id.to_string(),
        title: attr_s(item, "title"),
        description: attr_opt(item, "description"),
        due_date: attr_opt(item, "due_date"),
        position: attr_i64(item, "position"),
        created_at: attr_s(item, "created_at"),
    }
}

fn assignee_item(link: &TaskAssignee) -> Item {
    let mut item = key(task_pk(&link.task_id), format!("ASSIGNEE#{}", link.user_id));
    item.insert("assigned_at".to_string(), AttributeValue::S(link.assigned_at.clone()));
    item
}

fn label_item(label: &Label) -> Item {
    let mut item = key(task_pk(&label.task_id), format!("LABEL#{}", label.id));
    item.insert("name".to_string(), AttributeValue::S(label.name.clone()));
    item.insert("color".to_string(), AttributeValue::S(label.color.clone()));
    item
}

fn comment_item(comment: &Comment) -> Item {
    let mut item = key(task_pk(&comment.task_id), format!("COMMENT#{}", comment.id));
    item.insert("user_id".to_string(), AttributeValue::S(comment.user_id.clone()));
    item.insert("content".to_string(), AttributeValue::S(comment.content.clone()));
    item.insert("created_at".to_string(), AttributeValue::S(comment.created_at.clone()));
    item
}

fn activity_item(entry: &ActivityEntry) -> Result<Item> {
    let metadata = serde_json::to_string(&entry.metadata)
        .map_err(|e| BoardError::failed(format!("Failed to encode activity metadata: {}", e)))?;
    let mut item = key(
        board_pk(&entry.board_id),
        format!("ACTIVITY#{}#{}", entry.created_at, entry.id),
    );
    item.insert("id".to_string(), AttributeValue::S(entry.id.clone()));
    item.insert("action".to_string(), AttributeValue::S(entry.action.as_str().to_string()));
    item.insert("user_id".to_string(), AttributeValue::S(entry.user_id.clone()));
    item.insert("created_at".to_string(), AttributeValue::S(entry.created_at.clone()));
    item.insert("metadata".to_string(), AttributeValue::S(metadata));
    Ok(item)
}

fn activity_from(board_id: &str, item: &Item) -> Result<ActivityEntry> {
    let action: ActivityAction = attr_s(item, "action")
        .parse()
        .map_err(|_| BoardError::failed("stored activity has an unknown action"))?;
    let metadata = match attr_opt(item, "metadata") {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| BoardError::failed(format!("Failed to decode activity metadata: {}", e)))?,
        None => serde_json::Value::Null,
    };
    Ok(ActivityEntry {
        id: attr_s(item, "id"),
        action,
        board_id: board_id.to_string(),
        user_id: attr_s(item, "user_id"),
        created_at: attr_s(item, "created_at"),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_guard(board_id: &str, list_id: &str) -> Write {
        Write::Guard {
            container: Container::List {
                board_id: board_id.into(),
                list_id: list_id.into(),
            },
            expected: 3,
        }
    }

    #[test]
    fn test_open_board_checks_once_per_board() {
        let writes = vec![list_guard("b1", "l1"), list_guard("b1", "l2")];
        assert_eq!(open_board_checks(&writes), vec!["b1".to_string()]);
    }

    #[test]
    fn test_open_board_checks_skip_touched_board_row() {
        let writes = vec![
            Write::Guard {
                container: Container::board("b1"),
                expected: 0,
            },
            list_guard("b1", "l1"),
            list_guard("b2", "l9"),
        ];
        assert_eq!(open_board_checks(&writes), vec!["b2".to_string()]);
    }

    #[test]
    fn test_batch_rounds_fail_when_attempts_run_out() {
        assert!(!another_batch_round(1, 0).unwrap());
        assert!(another_batch_round(1, 3).unwrap());
        assert!(another_batch_round(MAX_BATCH_ATTEMPTS - 1, 3).unwrap());

        let exhausted = another_batch_round(MAX_BATCH_ATTEMPTS, 3);
        assert!(matches!(exhausted, Err(BoardError::OperationFailed(_))));
    }

    #[test]
    fn test_task_item_omits_absent_optionals() {
        let task = Task {
            id: "t1".into(),
            list_id: "l1".into(),
            title: "Write docs".into(),
            description: None,
            due_date: Some("2026-03-01".into()),
            position: 2,
            created_at: "2026-01-01T00:00:00.000000Z".into(),
        };
        let item = task_item(&task);

        assert_eq!(attr_s(&item, "PK"), "LIST#l1");
        assert_eq!(attr_s(&item, "SK"), "TASK#t1");
        assert!(!item.contains_key("description"));
        assert_eq!(task_from("l1", "t1", &item), task);
    }

    #[test]
    fn test_activity_sort_key_orders_by_time() {
        let entry = ActivityEntry {
            id: "a1".into(),
            action: ActivityAction::TaskMoved,
            board_id: "b1".into(),
            user_id: "u1".into(),
            created_at: "2026-01-01T00:00:00.000000Z".into(),
            metadata: serde_json::json!({"taskId": "t1"}),
        };
        let item = activity_item(&entry).unwrap();

        assert_eq!(attr_s(&item, "SK"), "ACTIVITY#2026-01-01T00:00:00.000000Z#a1");
        assert_eq!(activity_from("b1", &item).unwrap(), entry);
    }

    #[test]
    fn test_member_rows_share_role() {
        let member = BoardMember {
            board_id: "b1".into(),
            user_id: "u1".into(),
            role: Role::Admin,
            joined_at: "2026-01-01T00:00:00.000000Z".into(),
        };
        let (row, reverse) = member_items(&member);

        assert_eq!(attr_s(&row, "SK"), "MEMBER#u1");
        assert_eq!(attr_s(&reverse, "PK"), "USER#u1");
        assert_eq!(member_from("b1", "u1", &row).unwrap(), member);
        assert_eq!(attr_role(&reverse).unwrap(), Role::Admin);
    }
}
