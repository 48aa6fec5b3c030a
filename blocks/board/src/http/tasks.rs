use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::orchestrator::BoardOrchestrator;
use crate::response::{parse, respond, respond_empty};

/// POST /tasks
pub async fn create_task(orchestrator: &BoardOrchestrator, user_id: &str, body: &[u8]) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.create_task(user_id, parse(body)?).await }.await;
    respond(result, StatusCode::CREATED)
}

/// GET /tasks/{tid}
pub async fn get_task(orchestrator: &BoardOrchestrator, user_id: &str, task_id: &str) -> Result<Response<Body>, Error> {
    respond(orchestrator.get_task(user_id, task_id).await, StatusCode::OK)
}

/// PATCH /tasks/{tid}
pub async fn update_task(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.update_task(user_id, task_id, parse(body)?).await }.await;
    respond(result, StatusCode::OK)
}

/// PUT /tasks/{tid}/move
pub async fn move_task(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.move_task(user_id, task_id, parse(body)?).await }.await;
    respond(result, StatusCode::OK)
}

/// DELETE /tasks/{tid}
pub async fn delete_task(orchestrator: &BoardOrchestrator, user_id: &str, task_id: &str) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.delete_task(user_id, task_id).await)
}

/// POST /tasks/{tid}/assignees/{uid}
pub async fn assign_user(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    assignee_id: &str,
) -> Result<Response<Body>, Error> {
    respond(orchestrator.assign_user(user_id, task_id, assignee_id).await, StatusCode::CREATED)
}

/// DELETE /tasks/{tid}/assignees/{uid}
pub async fn unassign_user(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    assignee_id: &str,
) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.unassign_user(user_id, task_id, assignee_id).await)
}

/// POST /tasks/{tid}/labels
pub async fn add_label(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.add_label(user_id, task_id, parse(body)?).await }.await;
    respond(result, StatusCode::CREATED)
}

/// DELETE /tasks/{tid}/labels/{id}
pub async fn remove_label(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    label_id: &str,
) -> Result<Response<Body>, Error> {
    respond_empty(orchestrator.remove_label(user_id, task_id, label_id).await)
}

/// GET /tasks/{tid}/comments
pub async fn list_comments(orchestrator: &BoardOrchestrator, user_id: &str, task_id: &str) -> Result<Response<Body>, Error> {
    respond(orchestrator.comments(user_id, task_id).await, StatusCode::OK)
}

/// POST /tasks/{tid}/comments
pub async fn add_comment(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    task_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let result = async { orchestrator.add_comment(user_id, task_id, parse(body)?).await }.await;
    respond(result, StatusCode::CREATED)
}
