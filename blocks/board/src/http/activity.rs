use lambda_http::{http::StatusCode, Body, Error, Response};
use taskboard_atoms::BoardError;

use crate::orchestrator::BoardOrchestrator;
use crate::response::respond;

/// GET /boards/{bid}/activity?limit=N
pub async fn recent_activity(
    orchestrator: &BoardOrchestrator,
    user_id: &str,
    board_id: &str,
    limit: Option<&str>,
) -> Result<Response<Body>, Error> {
    let result = async {
        let limit = limit
            .map(|raw| {
                raw.parse::<usize>()
                    .map_err(|_| BoardError::invalid(format!("limit must be a positive integer: {}", raw)))
            })
            .transpose()?;
        orchestrator.recent_activity(user_id, board_id, limit).await
    }
    .await;
    respond(result, StatusCode::OK)
}
