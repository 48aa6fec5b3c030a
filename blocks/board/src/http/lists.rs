use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::orchestrator::BoardOrchestrator;
use crate::response::{parse, respond, respond_empty};

/// GET /boards/{bid}/lists - lists with their tasks, assignees and labels
pub async fn board_lists(orchestrator: &BoardOrchestrator, user_id: &str, board_id: &str) -> Result<Response<Body>, Error> {
    respond(orchestrator.lists_with_tasks(user_id, board_id).await, StatusCode::OK)
}

/// POST /lists
pub async fn create_list(orchestrator: &BoardOrchestrator, user_id: &str, body: &[u8]) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.create_list(user_id, parse(body)?).await }.await;
    respond(result, StatusCode::CREATED)
}

/// PATCH /lists/{lid}
pub async fn rename_list(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    list_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.rename_list(user_id, list_id, parse(body)?).await }.await;
    respond(result, StatusCode::OK)
}

/// PUT /lists/{lid}/move
pub async fn move_list(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    list_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.move_list(user_id, list_id, parse(body)?).await }.await;
    respond(result, StatusCode::OK)
}

/// DELETE /lists/{lid}
pub async fn delete_list(orchestrator: &BoardOrchestrator, user_id: &str, list_id: &str) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.delete_list(user_id, list_id).await)
}
