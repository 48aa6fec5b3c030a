use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::orchestrator::BoardOrchestrator;
use crate::response::{parse, respond, respond_empty};

/// POST /boards
pub async fn create_board(orchestrator: &BoardOrchestrator, user_id: &str, body: &[u8]) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.create_board(user_id, parse(body)?).await }.await;
    respond(result, StatusCode::CREATED)
}

/// GET /boards
pub async fn list_boards(orchestrator: &BoardOrchestrator, user_id: &str) -> Result<Response<Body>, Error> {
    respond(orchestrator.my_boards(user_id).await, StatusCode::OK)
}

/// GET /boards/{id}
pub async fn get_board(orchestrator: &BoardOrchestrator, user_id: &str, board_id: &str) -> Result<Response<Body>, Error> {
    respond(orchestrator.get_board(user_id, board_id).await, StatusCode::OK)
}

/// PATCH /boards/{id}
pub async fn rename_board(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    board_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.rename_board(user_id, board_id, parse(body)?).await }.await;
    respond(result, StatusCode::OK)
}

/// DELETE /boards/{id}
pub async fn delete_board(orchestrator: &BoardOrchestrator, user_id: &str, board_id: &str) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.delete_board(user_id, board_id).await)
}
