
// Re-export model types and service functions
pub mod model;
pub mod service;

pub use model::{
    CreateLabelPayload, CreateTaskPayload, Label, MoveTaskPayload, Task, TaskAssignee, UpdateTaskPayload,
};
pub use service::*;
