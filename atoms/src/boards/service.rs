use super::model::Board;
use crate::error::{BoardError, Result};
use crate::members::model::{BoardMember, MemberBoard, Role};
use crate::store::{BoardStore, Write};

/// Create a board with the creator as its only OWNER
pub async fn create_board(store: &dyn BoardStore, user_id: &str, title: &str) -> Result<MemberBoard> {
    let title = crate::clean_title("title", title)?;
    let now = crate::now_timestamp();
    let board = Board {
        id: crate::new_id(),
        title,
        created_at: now.clone(),
    };

    store
        .commit(vec![
            Write::PutBoard(board.clone()),
            Write::PutMember(BoardMember {
                board_id: board.id.clone(),
                user_id: user_id.to_string(),
                role: Role::Owner,
                joined_at: now,
            }),
        ])
        .await?;

    tracing::info!("Created board {} for user {}", board.id, user_id);
    Ok(MemberBoard {
        board,
        role: Role::Owner,
    })
}

/// Boards the user belongs to, oldest first, with the user's role
pub async fn boards_for_user(store: &dyn BoardStore, user_id: &str) -> Result<Vec<MemberBoard>> {
    store.boards_for_user(user_id).await
}

pub async fn get_board(store: &dyn BoardStore, board_id: &str) -> Result<Board> {
    store
        .get_board(board_id)
        .await?
        .ok_or_else(|| BoardError::not_found("board", board_id))
}

pub async fn rename_board(store: &dyn BoardStore, board_id: &str, user_id: &str, title: &str) -> Result<Board> {
    let title = crate::clean_title("title", title)?;
    ensure_owner(store, board_id, user_id).await?;

    let mut board = get_board(store, board_id).await?;
    store
        .commit(vec![Write::RenameBoard {
            board_id: board_id.to_string(),
            title: title.clone(),
        }])
        .await?;

    board.title = title;
    Ok(board)
}

/// Delete a board and cascade to everything it owns.
///
/// The board is closed first so list and task writes racing the purge fail
/// instead of leaving rows behind.
pub async fn delete_board(store: &dyn BoardStore, board_id: &str, user_id: &str) -> Result<Board> {
    ensure_owner(store, board_id, user_id).await?;
    let board = get_board(store, board_id).await?;
    let lists = store.lists_for_board(board_id).await?;
    store
        .commit(vec![Write::CloseBoard {
            board_id: board_id.to_string(),
            expected: lists.version,
        }])
        .await?;
    store.purge_board(board_id).await?;
    tracing::info!("Deleted board {}", board_id);
    Ok(board)
}

/// Owner check kept inside the service so it holds whatever the caller gated on
async fn ensure_owner(store: &dyn BoardStore, board_id: &str, user_id: &str) -> Result<()> {
    match store.get_member(board_id, user_id).await? {
        Some(member) if member.role == Role::Owner => Ok(()),
        Some(_) => Err(BoardError::InsufficientPermissions),
        None => Err(BoardError::AccessDenied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_creator_becomes_owner() {
        let store = MemoryStore::new();
        let created = create_board(&store, "alice", "  Roadmap ").await.unwrap();

        assert_eq!(created.board.title, "Roadmap");
        let member = store.get_member(&created.board.id, "alice").await.unwrap().unwrap();
        assert_eq!(member.role, Role::Owner);

        let mine = boards_for_user(&store, "alice").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].role, Role::Owner);
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let store = MemoryStore::new();
        let result = create_board(&store, "alice", "   ").await;
        assert!(matches!(result, Err(BoardError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_rename_requires_owner_in_service() {
        let store = MemoryStore::new();
        let created = create_board(&store, "alice", "Roadmap").await.unwrap();
        let board_id = created.board.id;
        store
            .commit(vec![Write::PutMember(BoardMember {
                board_id: board_id.clone(),
                user_id: "bob".into(),
                role: Role::Admin,
                joined_at: crate::now_timestamp(),
            })])
            .await
            .unwrap();

        let denied = rename_board(&store, &board_id, "bob", "Mine now").await;
        assert!(matches!(denied, Err(BoardError::InsufficientPermissions)));

        let renamed = rename_board(&store, &board_id, "alice", "Q3").await.unwrap();
        assert_eq!(renamed.title, "Q3");
    }

    #[tokio::test]
    async fn test_delete_cascades_memberships() {
        let store = MemoryStore::new();
        let created = create_board(&store, "alice", "Roadmap").await.unwrap();

        delete_board(&store, &created.board.id, "alice").await.unwrap();

        assert!(store.get_board(&created.board.id).await.unwrap().is_none());
        assert!(boards_for_user(&store, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_created_from_stale_read_cannot_outlive_board() {
        let store = MemoryStore::new();
        let board_id = create_board(&store, "alice", "Roadmap").await.unwrap().board.id;
        let before = store.lists_for_board(&board_id).await.unwrap().version;

        delete_board(&store, &board_id, "alice").await.unwrap();

        let late = store
            .commit(vec![
                Write::Guard {
                    container: crate::store::Container::board(board_id.clone()),
                    expected: before,
                },
                Write::PutList(crate::lists::model::TaskList {
                    id: "late".into(),
                    board_id: board_id.clone(),
                    title: "Late".into(),
                    position: 1,
                    created_at: crate::now_timestamp(),
                }),
            ])
            .await;
        assert!(late.is_err());
        assert!(store.get_list("late").await.unwrap().is_none());
    }
}
