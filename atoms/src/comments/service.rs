use super::model::Comment;
use crate::error::{BoardError, Result};
use crate::store::{BoardStore, Write};

pub async fn add_comment(store: &dyn BoardStore, task_id: &str, user_id: &str, content: &str) -> Result<Comment> {
    let content = content.trim();
    if content.is_empty() {
        return Err(BoardError::invalid("content must not be empty"));
    }
    if store.get_task(task_id).await?.is_none() {
        return Err(BoardError::not_found("task", task_id));
    }

    let comment = Comment {
        id: crate::new_id(),
        task_id: task_id.to_string(),
        user_id: user_id.to_string(),
        content: content.to_string(),
        created_at: crate::now_timestamp(),
    };
    store.commit(vec![Write::PutComment(comment.clone())]).await?;
    Ok(comment)
}

/// Comments of a task, oldest first
pub async fn comments_for_task(store: &dyn BoardStore, task_id: &str) -> Result<Vec<Comment>> {
    store.comments_for_task(task_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::service::create_board;
    use crate::lists::service::create_list;
    use crate::store::MemoryStore;
    use crate::tasks::model::CreateTaskPayload;
    use crate::tasks::service::create_task;

    #[tokio::test]
    async fn test_comments_keep_order() {
        let store = MemoryStore::new();
        let board = create_board(&store, "alice", "Board").await.unwrap().board;
        let list = create_list(&store, &board.id, "Todo").await.unwrap();
        let task = create_task(
            &store,
            CreateTaskPayload {
                title: "a".into(),
                description: None,
                due_date: None,
                list_id: list.id,
            },
        )
        .await
        .unwrap();

        add_comment(&store, &task.id, "alice", "first").await.unwrap();
        add_comment(&store, &task.id, "alice", " second ").await.unwrap();

        let contents: Vec<String> = comments_for_task(&store, &task.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);

        let blank = add_comment(&store, &task.id, "alice", "  ").await;
        assert!(matches!(blank, Err(BoardError::InvalidRequest(_))));
    }
}
