use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBoardPayload {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameBoardPayload {
    pub title: String,
}
