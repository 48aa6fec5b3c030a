use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::model::{CreateLabelPayload, CreateTaskPayload, Label, Task, TaskAssignee, UpdateTaskPayload};
use crate::error::{BoardError, Result};
use crate::lists::model::TaskList;
use crate::ordering::{self, Reposition};
use crate::store::{BoardStore, Container, Siblings, TaskChanges, Write};

/// Where a moved task came from and where it landed
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMove {
    pub task: Task,
    pub from_list_id: String,
    pub from_position: i64,
}

pub async fn get_task(store: &dyn BoardStore, task_id: &str) -> Result<Task> {
    store
        .get_task(task_id)
        .await?
        .ok_or_else(|| BoardError::not_found("task", task_id))
}

async fn get_list(store: &dyn BoardStore, list_id: &str) -> Result<TaskList> {
    store
        .get_list(list_id)
        .await?
        .ok_or_else(|| BoardError::not_found("list", list_id))
}

/// Position of `task_id` in a fresh snapshot of `list`. A task that is no
/// longer there was moved or deleted after it was read, so re-read and retry.
fn position_in(siblings: &Siblings<Task>, list: &TaskList, task_id: &str) -> Result<i64> {
    siblings
        .items
        .iter()
        .find(|t| t.id == task_id)
        .map(|t| t.position)
        .ok_or_else(|| BoardError::Contended {
            container: Container::list(list).label(),
        })
}

/// Tasks of a list in display order
pub async fn tasks_for_list(store: &dyn BoardStore, list_id: &str) -> Result<Vec<Task>> {
    let mut tasks = store.tasks_for_list(list_id).await?.items;
    ordering::sort_positioned(&mut tasks);
    Ok(tasks)
}

/// Accept RFC 3339 or a bare `YYYY-MM-DD`; store RFC 3339 in UTC. Blank clears.
pub fn normalize_due_date(raw: &str) -> Result<Option<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(Some(midnight.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
    }
    Err(BoardError::invalid(format!("dueDate is not a valid date: {}", raw)))
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Append a task at the tail of its list
pub async fn create_task(store: &dyn BoardStore, payload: CreateTaskPayload) -> Result<Task> {
    let title = crate::clean_title("title", &payload.title)?;
    let due_date = match payload.due_date.as_deref() {
        Some(raw) => normalize_due_date(raw)?,
        None => None,
    };

    let list = get_list(store, &payload.list_id).await?;
    let siblings = store.tasks_for_list(&list.id).await?;

    let task = Task {
        id: crate::new_id(),
        list_id: list.id.clone(),
        title,
        description: clean_description(payload.description),
        due_date,
        position: ordering::append_position(&ordering::slots(&siblings.items)),
        created_at: crate::now_timestamp(),
    };

    store
        .commit(vec![
            Write::Guard {
                container: Container::list(&list),
                expected: siblings.version,
            },
            Write::PutTask {
                board_id: list.board_id.clone(),
                task: task.clone(),
            },
        ])
        .await?;
    Ok(task)
}

pub async fn update_task(store: &dyn BoardStore, task_id: &str, payload: UpdateTaskPayload) -> Result<Task> {
    if payload.is_empty() {
        return Err(BoardError::invalid("nothing to update"));
    }

    let changes = TaskChanges {
        title: payload
            .title
            .as_deref()
            .map(|t| crate::clean_title("title", t))
            .transpose()?,
        description: payload.description.map(clean_description),
        due_date: match payload.due_date {
            Some(Some(raw)) => Some(normalize_due_date(&raw)?),
            Some(None) => Some(None),
            None => None,
        },
    };

    let mut task = get_task(store, task_id).await?;
    store
        .commit(vec![Write::UpdateTask {
            list_id: task.list_id.clone(),
            task_id: task.id.clone(),
            changes: changes.clone(),
        }])
        .await?;

    if let Some(title) = changes.title {
        task.title = title;
    }
    if let Some(description) = changes.description {
        task.description = description;
    }
    if let Some(due_date) = changes.due_date {
        task.due_date = due_date;
    }
    Ok(task)
}

/// Move a task within its list or into another list of the same board.
pub async fn move_task(
    store: &dyn BoardStore,
    task_id: &str,
    new_list_id: &str,
    new_position: i64,
) -> Result<TaskMove> {
    let mut task = get_task(store, task_id).await?;
    let from_list_id = task.list_id.clone();

    if new_list_id == from_list_id {
        let list = get_list(store, &from_list_id).await?;
        let siblings = store.tasks_for_list(&from_list_id).await?;
        let from_position = position_in(&siblings, &list, task_id)?;
        let plan = ordering::plan_move_within(&ordering::slots(&siblings.items), task_id, new_position)?;

        if !plan.is_empty() {
            let mut writes = vec![Write::Guard {
                container: Container::list(&list),
                expected: siblings.version,
            }];
            writes.extend(task_positions(&from_list_id, &plan));
            store.commit(writes).await?;
        }

        task.position = new_position;
        return Ok(TaskMove {
            task,
            from_list_id,
            from_position,
        });
    }

    let source = get_list(store, &from_list_id).await?;
    let target = get_list(store, new_list_id).await?;
    if source.board_id != target.board_id {
        return Err(BoardError::invalid("target list belongs to a different board"));
    }

    let source_siblings = store.tasks_for_list(&source.id).await?;
    let target_siblings = store.tasks_for_list(&target.id).await?;
    let from_position = position_in(&source_siblings, &source, task_id)?;
    let plan = ordering::plan_move_across(
        &ordering::slots(&source_siblings.items),
        &ordering::slots(&target_siblings.items),
        task_id,
        new_position,
    )?;

    task.list_id = target.id.clone();
    task.position = plan.moved.to;

    let mut writes = vec![
        Write::Guard {
            container: Container::list(&source),
            expected: source_siblings.version,
        },
        Write::Guard {
            container: Container::list(&target),
            expected: target_siblings.version,
        },
    ];
    writes.extend(task_positions(&source.id, &plan.source));
    writes.extend(task_positions(&target.id, &plan.target));
    writes.push(Write::RelocateTask {
        from_list_id: from_list_id.clone(),
        task: task.clone(),
    });
    store.commit(writes).await?;

    Ok(TaskMove {
        task,
        from_list_id,
        from_position,
    })
}

/// Delete a task, close the gap in its list and drop its children
pub async fn delete_task(store: &dyn BoardStore, task_id: &str) -> Result<Task> {
    let task = get_task(store, task_id).await?;
    let list = get_list(store, &task.list_id).await?;
    let siblings = store.tasks_for_list(&list.id).await?;
    position_in(&siblings, &list, task_id)?;
    let plan = ordering::plan_remove(&ordering::slots(&siblings.items), task_id)?;

    let mut writes = vec![
        Write::Guard {
            container: Container::list(&list),
            expected: siblings.version,
        },
        Write::DeleteTask {
            list_id: list.id.clone(),
            task_id: task.id.clone(),
        },
    ];
    writes.extend(task_positions(&list.id, &plan));
    store.commit(writes).await?;

    store.purge_task(task_id).await?;
    Ok(task)
}

/// Assign a board member to a task
pub async fn assign_user(store: &dyn BoardStore, board_id: &str, task_id: &str, user_id: &str) -> Result<TaskAssignee> {
    let task = get_task(store, task_id).await?;
    if store.get_member(board_id, user_id).await?.is_none() {
        return Err(BoardError::invalid("assignee must be a member of the board"));
    }

    let link = TaskAssignee {
        task_id: task.id,
        user_id: user_id.to_string(),
        assigned_at: crate::now_timestamp(),
    };
    store.commit(vec![Write::PutAssignee(link.clone())]).await?;
    Ok(link)
}

pub async fn unassign_user(store: &dyn BoardStore, task_id: &str, user_id: &str) -> Result<()> {
    store
        .commit(vec![Write::DeleteAssignee {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
        }])
        .await
}

pub async fn add_label(store: &dyn BoardStore, task_id: &str, payload: CreateLabelPayload) -> Result<Label> {
    let name = crate::clean_title("name", &payload.name)?;
    let color = crate::clean_title("color", &payload.color)?;
    let task = get_task(store, task_id).await?;

    let label = Label {
        id: crate::new_id(),
        task_id: task.id,
        name,
        color,
    };
    store.commit(vec![Write::PutLabel(label.clone())]).await?;
    Ok(label)
}

pub async fn remove_label(store: &dyn BoardStore, task_id: &str, label_id: &str) -> Result<()> {
    store
        .commit(vec![Write::DeleteLabel {
            task_id: task_id.to_string(),
            label_id: label_id.to_string(),
        }])
        .await
}

fn task_positions<'a>(list_id: &'a str, plan: &'a [Reposition]) -> impl Iterator<Item = Write> + 'a {
    plan.iter().map(move |step| Write::SetTaskPosition {
        list_id: list_id.to_string(),
        task_id: step.id.clone(),
        position: step.to,
    })
}
