use super::model::{BoardMember, Role};
use crate::error::{BoardError, Result};
use crate::store::{BoardStore, Write};

/// Outcome of an ownership transfer: both rows after the swap
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipTransfer {
    pub previous_owner: BoardMember,
    pub new_owner: BoardMember,
}

pub async fn members_for_board(store: &dyn BoardStore, board_id: &str) -> Result<Vec<BoardMember>> {
    let mut members = store.members_for_board(board_id).await?;
    members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.user_id.cmp(&b.user_id)));
    Ok(members)
}

async fn get_member(store: &dyn BoardStore, board_id: &str, user_id: &str) -> Result<BoardMember> {
    store
        .get_member(board_id, user_id)
        .await?
        .ok_or_else(|| BoardError::not_found("member", user_id))
}

/// Add an existing user to a board. New members always join as MEMBER.
pub async fn add_member(store: &dyn BoardStore, board_id: &str, user_id: &str) -> Result<BoardMember> {
    if store.get_user(user_id).await?.is_none() {
        return Err(BoardError::not_found("user", user_id));
    }
    if store.get_member(board_id, user_id).await?.is_some() {
        return Err(BoardError::conflict("user is already a member"));
    }

    let member = BoardMember {
        board_id: board_id.to_string(),
        user_id: user_id.to_string(),
        role: Role::Member,
        joined_at: crate::now_timestamp(),
    };
    store.commit(vec![Write::PutMember(member.clone())]).await?;
    Ok(member)
}

/// Change a member's role to ADMIN or MEMBER.
pub async fn update_role(
    store: &dyn BoardStore,
    board_id: &str,
    caller_id: &str,
    target_id: &str,
    role: &str,
) -> Result<BoardMember> {
    let role: Role = role.parse()?;
    if role == Role::Owner {
        return Err(BoardError::invalid("role must be ADMIN or MEMBER; use ownership transfer"));
    }
    if caller_id == target_id {
        return Err(BoardError::conflict("cannot change your own role"));
    }

    let mut target = get_member(store, board_id, target_id).await?;
    if target.role == Role::Owner {
        return Err(BoardError::conflict("cannot change the owner's role"));
    }

    store
        .commit(vec![Write::SetRole {
            board_id: board_id.to_string(),
            user_id: target_id.to_string(),
            role,
            expected: target.role,
        }])
        .await?;

    target.role = role;
    Ok(target)
}

pub async fn remove_member(store: &dyn BoardStore, board_id: &str, target_id: &str) -> Result<BoardMember> {
    let target = get_member(store, board_id, target_id).await?;
    if target.role == Role::Owner {
        return Err(BoardError::conflict("cannot remove the board owner"));
    }

    store
        .commit(vec![Write::DeleteMember {
            board_id: board_id.to_string(),
            user_id: target_id.to_string(),
            expected: target.role,
        }])
        .await?;
    Ok(target)
}

pub async fn leave_board(store: &dyn BoardStore, board_id: &str, user_id: &str) -> Result<BoardMember> {
    let member = get_member(store, board_id, user_id).await?;
    if member.role == Role::Owner {
        return Err(BoardError::conflict("the owner cannot leave; transfer ownership first"));
    }

    store
        .commit(vec![Write::DeleteMember {
            board_id: board_id.to_string(),
            user_id: user_id.to_string(),
            expected: member.role,
        }])
        .await?;
    Ok(member)
}

/// Demote the current owner to ADMIN and promote `target_id` in one commit.
///
/// Both role changes are conditioned on the roles just read, so two racing
/// transfers cannot both succeed.
pub async fn transfer_ownership(
    store: &dyn BoardStore,
    board_id: &str,
    owner_id: &str,
    target_id: &str,
) -> Result<OwnershipTransfer> {
    if owner_id == target_id {
        return Err(BoardError::conflict("you already own this board"));
    }

    let mut owner = get_member(store, board_id, owner_id).await?;
    if owner.role != Role::Owner {
        return Err(BoardError::InsufficientPermissions);
    }
    let mut target = get_member(store, board_id, target_id).await?;

    store
        .commit(vec![
            Write::SetRole {
                board_id: board_id.to_string(),
                user_id: owner_id.to_string(),
                role: Role::Admin,
                expected: Role::Owner,
            },
            Write::SetRole {
                board_id: board_id.to_string(),
                user_id: target_id.to_string(),
                role: Role::Owner,
                expected: target.role,
            },
        ])
        .await?;

    owner.role = Role::Admin;
    target.role = Role::Owner;
    Ok(OwnershipTransfer {
        previous_owner: owner,
        new_owner: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::service::create_board;
    use crate::store::MemoryStore;
    use crate::users::model::User;

    async fn board_with(store: &MemoryStore, users: &[&str]) -> String {
        for id in ["alice"].iter().chain(users.iter()) {
            store
                .insert_user(User {
                    id: id.to_string(),
                    name: id.to_string(),
                    email: format!("{}@example.com", id),
                })
                .await;
        }
        let board = create_board(store, "alice", "Board").await.unwrap().board;
        for user in users {
            add_member(store, &board.id, user).await.unwrap();
        }
        board.id
    }

    fn owners(members: &[BoardMember]) -> Vec<&str> {
        members
            .iter()
            .filter(|m| m.role == Role::Owner)
            .map(|m| m.user_id.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_add_member_rules() {
        let store = MemoryStore::new();
        let board_id = board_with(&store, &["bob"]).await;

        let bob = store.get_member(&board_id, "bob").await.unwrap().unwrap();
        assert_eq!(bob.role, Role::Member);

        let again = add_member(&store, &board_id, "bob").await;
        assert!(matches!(again, Err(BoardError::Conflict(_))));

        let ghost = add_member(&store, &board_id, "ghost").await;
        assert!(matches!(ghost, Err(BoardError::NotFound { resource: "user", .. })));
    }

    #[tokio::test]
    async fn test_update_role_rejections() {
        let store = MemoryStore::new();
        let board_id = board_with(&store, &["bob"]).await;

        let owner_role = update_role(&store, &board_id, "alice", "bob", "OWNER").await;
        assert!(matches!(owner_role, Err(BoardError::InvalidRequest(_))));

        let bogus = update_role(&store, &board_id, "alice", "bob", "SUPERUSER").await;
        assert!(matches!(bogus, Err(BoardError::InvalidRequest(_))));

        let own = update_role(&store, &board_id, "alice", "alice", "ADMIN").await;
        assert!(matches!(own, Err(BoardError::Conflict(_))));

        let promoted = update_role(&store, &board_id, "alice", "bob", "ADMIN").await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let on_owner = update_role(&store, &board_id, "bob", "alice", "MEMBER").await;
        assert!(matches!(on_owner, Err(BoardError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed_or_leave() {
        let store = MemoryStore::new();
        let board_id = board_with(&store, &["bob"]).await;

        assert!(matches!(
            remove_member(&store, &board_id, "alice").await,
            Err(BoardError::Conflict(_))
        ));
        assert!(matches!(
            leave_board(&store, &board_id, "alice").await,
            Err(BoardError::Conflict(_))
        ));

        leave_board(&store, &board_id, "bob").await.unwrap();
        assert!(store.get_member(&board_id, "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transfer_leaves_exactly_one_owner() {
        let store = MemoryStore::new();
        let board_id = board_with(&store, &["bob"]).await;

        let transfer = transfer_ownership(&store, &board_id, "alice", "bob").await.unwrap();
        assert_eq!(transfer.previous_owner.role, Role::Admin);
        assert_eq!(transfer.new_owner.role, Role::Owner);

        let members = members_for_board(&store, &board_id).await.unwrap();
        assert_eq!(owners(&members), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_transfer_to_self_or_stranger_rejected() {
        let store = MemoryStore::new();
        let board_id = board_with(&store, &[]).await;

        assert!(matches!(
            transfer_ownership(&store, &board_id, "alice", "alice").await,
            Err(BoardError::Conflict(_))
        ));
        assert!(matches!(
            transfer_ownership(&store, &board_id, "alice", "carol").await,
            Err(BoardError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_transfers_never_make_two_owners() {
        let store = MemoryStore::new();
        let board_id = board_with(&store, &["bob", "carol"]).await;

        let (first, second) = tokio::join!(
            transfer_ownership(&store, &board_id, "alice", "bob"),
            transfer_ownership(&store, &board_id, "alice", "carol"),
        );
        assert!(first.is_ok() != second.is_ok());

        let members = members_for_board(&store, &board_id).await.unwrap();
        assert_eq!(owners(&members).len(), 1);
    }
}
