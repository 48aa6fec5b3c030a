use serde::{Deserialize, Serialize};

/// Registered user. Signup lives elsewhere; boards only read these rows.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}
