
// Re-export model types and service functions
pub mod model;
pub mod service;

pub use model::{CreateListPayload, MoveListPayload, RenameListPayload, TaskList};
pub use service::*;
