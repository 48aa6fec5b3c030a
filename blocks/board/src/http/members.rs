use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::orchestrator::BoardOrchestrator;
use crate::response::{parse, respond, respond_empty};

/// GET /boards/{bid}/members
pub async fn list_members(orchestrator: &BoardOrchestrator, user_id: &str, board_id: &str) -> Result<Response<Body>, Error> {
    respond(orchestrator.members(user_id, board_id).await, StatusCode::OK)
}

/// POST /boards/{bid}/members/{uid}
pub async fn add_member(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    board_id: &str,
    target_id: &str,
) -> Result<Response<Body>, Error> {
    respond(orchestrator.add_member(user_id, board_id, target_id).await, StatusCode::CREATED)
}

/// PUT /boards/{bid}/members/{uid}/role
pub async fn update_role(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    board_id: &str,
    target_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.update_role(user_id, board_id, target_id, parse(body)?).await }.await;
    respond(result, StatusCode::OK)
}

/// DELETE /boards/{bid}/members/{uid}
pub async fn remove_member(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    board_id: &str,
    target_id: &str,
) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.remove_member(user_id, board_id, target_id).await)
}

/// DELETE /boards/{bid}/leave
pub async fn leave_board(orchestrator: &BoardOrchestrator, user_id: &str, board_id: &str) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.leave_board(user_id, board_id).await)
}

/// PUT /boards/{bid}/transfer/{uid}
pub async fn transfer_ownership(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    board_id: &str,
    target_id: &str,
) -> Result<Response<Body>, Error> {
    let result = orchestrator
        .transfer_ownership(user_id, board_id, target_id)
        .await
        .map(|transfer| vec![transfer.previous_owner, transfer.new_owner]);
    respond(result, StatusCode::OK)
}
