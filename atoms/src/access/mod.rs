//! Who may act on a board: resolve the effective board and role, then gate
//! the role against an operation's allowed set.

pub mod gate;
pub mod resolver;

pub use gate::{authorize, Operation};
pub use resolver::{resolve, Access, AccessRequest};
