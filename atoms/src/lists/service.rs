use super::model::TaskList;
use crate::error::{BoardError, Result};
use crate::ordering::{self, Reposition};
use crate::store::{BoardStore, Container, Siblings, Write};

/// Where a moved list sat before the move
#[derive(Debug, Clone, PartialEq)]
pub struct ListMove {
    pub list: TaskList,
    pub from_position: i64,
}

/// Position of `list_id` in a fresh snapshot of its board's lists. A list that
/// is no longer there was deleted after it was read, so re-read and retry.
fn position_in(siblings: &Siblings<TaskList>, board_id: &str, list_id: &str) -> Result<i64> {
    siblings
        .items
        .iter()
        .find(|l| l.id == list_id)
        .map(|l| l.position)
        .ok_or_else(|| BoardError::Contended {
            container: Container::board(board_id).label(),
        })
}

pub async fn get_list(store: &dyn BoardStore, list_id: &str) -> Result<TaskList> {
    store
        .get_list(list_id)
        .await?
        .ok_or_else(|| BoardError::not_found("list", list_id))
}

/// Lists of a board in display order
pub async fn lists_for_board(store: &dyn BoardStore, board_id: &str) -> Result<Vec<TaskList>> {
    let mut lists = store.lists_for_board(board_id).await?.items;
    ordering::sort_positioned(&mut lists);
    Ok(lists)
}

/// Append a list at the tail of the board
pub async fn create_list(store: &dyn BoardStore, board_id: &str, title: &str) -> Result<TaskList> {
    let title = crate::clean_title("title", title)?;
    let siblings = store.lists_for_board(board_id).await?;

    let list = TaskList {
        id: crate::new_id(),
        board_id: board_id.to_string(),
        title,
        position: ordering::append_position(&ordering::slots(&siblings.items)),
        created_at: crate::now_timestamp(),
    };

    store
        .commit(vec![
            Write::Guard {
                container: Container::board(board_id),
                expected: siblings.version,
            },
            Write::PutList(list.clone()),
        ])
        .await?;
    Ok(list)
}

pub async fn rename_list(store: &dyn BoardStore, list_id: &str, title: &str) -> Result<TaskList> {
    let title = crate::clean_title("title", title)?;
    let mut list = get_list(store, list_id).await?;

    store
        .commit(vec![Write::RenameList {
            board_id: list.board_id.clone(),
            list_id: list.id.clone(),
            title: title.clone(),
        }])
        .await?;

    list.title = title;
    Ok(list)
}

/// Rotate a list to `new_position` among its board's lists.
pub async fn move_list(store: &dyn BoardStore, list_id: &str, new_position: i64) -> Result<ListMove> {
    let mut list = get_list(store, list_id).await?;
    let siblings = store.lists_for_board(&list.board_id).await?;
    let from_position = position_in(&siblings, &list.board_id, list_id)?;

    let plan = ordering::plan_move_within(&ordering::slots(&siblings.items), list_id, new_position)?;
    if plan.is_empty() {
        list.position = from_position;
        return Ok(ListMove { list, from_position });
    }

    let mut writes = vec![Write::Guard {
        container: Container::board(&list.board_id),
        expected: siblings.version,
    }];
    writes.extend(list_positions(&list.board_id, &plan));
    store.commit(writes).await?;

    list.position = new_position;
    Ok(ListMove { list, from_position })
}

/// Delete a list, close the gap it leaves and cascade to its tasks
pub async fn delete_list(store: &dyn BoardStore, list_id: &str) -> Result<TaskList> {
    let list = get_list(store, list_id).await?;
    let siblings = store.lists_for_board(&list.board_id).await?;
    position_in(&siblings, &list.board_id, list_id)?;
    let plan = ordering::plan_remove(&ordering::slots(&siblings.items), list_id)?;

    let mut writes = vec![
        Write::Guard {
            container: Container::board(&list.board_id),
            expected: siblings.version,
        },
        Write::DeleteList {
            board_id: list.board_id.clone(),
            list_id: list.id.clone(),
        },
    ];
    writes.extend(list_positions(&list.board_id, &plan));
    store.commit(writes).await?;

    store.purge_list(list_id).await?;
    Ok(list)
}

fn list_positions<'a>(board_id: &'a str, plan: &'a [Reposition]) -> impl Iterator<Item = Write> + 'a {
    plan.iter().map(move |step| Write::SetListPosition {
        board_id: board_id.to_string(),
        list_id: step.id.clone(),
        position: step.to,
    })
}
