use serde::Serialize;
use taskboard_atoms::boards::Board;
use taskboard_atoms::lists::TaskList;
use taskboard_atoms::members::{BoardMember, Role};
use taskboard_atoms::tasks::{Label, Task, TaskAssignee};

/// A board with its members, as seen by the caller
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardDetail {
    #[serde(flatten)]
    pub board: Board,
    pub role: Role,
    pub members: Vec<BoardMember>,
}

/// A task joined with its assignees and labels
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCard {
    #[serde(flatten)]
    pub task: Task,
    pub assignees: Vec<TaskAssignee>,
    pub labels: Vec<Label>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListWithTasks {
    #[serde(flatten)]
    pub list: TaskList,
    pub tasks: Vec<TaskCard>,
}
