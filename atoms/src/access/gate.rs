use crate::error::{BoardError, Result};
use crate::members::model::Role;

const OWNER: &[Role] = &[Role::Owner];
const MANAGERS: &[Role] = &[Role::Owner, Role::Admin];
const ANY_MEMBER: &[Role] = &[Role::Owner, Role::Admin, Role::Member];

/// Every operation a caller can attempt on a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReadBoard,
    RenameBoard,
    DeleteBoard,
    TransferOwnership,
    UpdateRole,
    AddMember,
    RemoveMember,
    LeaveBoard,
    CreateList,
    RenameList,
    MoveList,
    DeleteList,
    CreateTask,
    UpdateTask,
    DeleteTask,
    MoveTask,
    AssignTask,
    UnassignTask,
    AddLabel,
    RemoveLabel,
    AddComment,
}

impl Operation {
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Operation::RenameBoard
            | Operation::DeleteBoard
            | Operation::TransferOwnership
            | Operation::UpdateRole => OWNER,
            Operation::AddMember
            | Operation::RemoveMember
            | Operation::CreateList
            | Operation::RenameList
            | Operation::MoveList
            | Operation::DeleteList
            | Operation::CreateTask
            | Operation::UpdateTask
            | Operation::DeleteTask
            | Operation::AddLabel
            | Operation::RemoveLabel => MANAGERS,
            Operation::ReadBoard
            | Operation::LeaveBoard
            | Operation::MoveTask
            | Operation::AssignTask
            | Operation::UnassignTask
            | Operation::AddComment => ANY_MEMBER,
        }
    }
}

/// Pure set-membership check. Roles are never ranked against each other.
pub fn authorize(role: Role, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(BoardError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_cannot_manage_lists() {
        assert!(matches!(
            authorize(Role::Member, Operation::DeleteList.allowed_roles()),
            Err(BoardError::InsufficientPermissions)
        ));
        assert!(authorize(Role::Admin, Operation::DeleteList.allowed_roles()).is_ok());
    }

    #[test]
    fn test_owner_only_operations() {
        for op in [
            Operation::RenameBoard,
            Operation::DeleteBoard,
            Operation::TransferOwnership,
            Operation::UpdateRole,
        ] {
            assert!(authorize(Role::Owner, op.allowed_roles()).is_ok());
            assert!(authorize(Role::Admin, op.allowed_roles()).is_err());
            assert!(authorize(Role::Member, op.allowed_roles()).is_err());
        }
    }

    #[test]
    fn test_any_member_may_move_and_comment() {
        for role in [Role::Owner, Role::Admin, Role::Member] {
            assert!(authorize(role, Operation::MoveTask.allowed_roles()).is_ok());
            assert!(authorize(role, Operation::AddComment.allowed_roles()).is_ok());
        }
    }

    #[test]
    fn test_empty_allowed_set_rejects_everyone() {
        assert!(authorize(Role::Owner, &[]).is_err());
    }
}
