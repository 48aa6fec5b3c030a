
// Re-export model types and service functions
pub mod model;
pub mod service;

pub use model::{BoardMember, MemberBoard, Role, UpdateRolePayload};
pub use service::*;
