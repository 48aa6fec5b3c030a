use aws_lambda_events::apigw::{ApiGatewayProxyResponse, ApiGatewayWebsocketProxyRequest};
use aws_lambda_events::encodings::Body;
use board_block::response::status_for;
use lambda_runtime::{Error, LambdaEvent};
use std::sync::Arc;
use taskboard_atoms::BoardError;
use taskboard_shared::sockets::{WebSocketAction, WebSocketMessage};
use taskboard_shared::AppState;

fn reply(status: u16, body: serde_json::Value) -> ApiGatewayProxyResponse {
    ApiGatewayProxyResponse {
        status_code: status as i64,
        body: Some(Body::Text(body.to_string())),
        ..Default::default()
    }
}

fn reject(err: &BoardError) -> ApiGatewayProxyResponse {
    if let BoardError::OperationFailed(_) = err {
        tracing::error!("Socket request failed: {}", err);
    } else {
        tracing::debug!("Socket request rejected: {}", err);
    }
    reply(
        status_for(err).as_u16(),
        serde_json::json!({"error": err.kind(), "message": err.to_string()}),
    )
}

/// User id supplied by the authorizer on `$connect`, header first then query string
fn connecting_user(request: &ApiGatewayWebsocketProxyRequest) -> Option<String> {
    request
        .headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.query_string_parameters.first("userId").map(str::to_string))
        .filter(|s| !s.trim().is_empty())
}

pub(crate) async fn function_handler(
    event: LambdaEvent<ApiGatewayWebsocketProxyRequest>,
    state: Arc<AppState>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let request = event.payload;
    let route = request.request_context.route_key.clone().unwrap_or_default();
    let Some(connection_id) = request.request_context.connection_id.clone() else {
        return Ok(reply(400, serde_json::json!({"error": "InvalidRequest", "message": "missing connection id"})));
    };
    tracing::info!("Socket lambda invoked - Route: {} Connection: {}", route, connection_id);

    let connections = &state.connections;

    let response = match route.as_str() {
        "$connect" => match connecting_user(&request) {
            Some(user_id) => match connections.register(&connection_id, &user_id).await {
                Ok(()) => reply(200, serde_json::json!({"connected": true})),
                Err(e) => reject(&e),
            },
            None => reply(401, serde_json::json!({"error": "Unauthorized"})),
        },
        "$disconnect" => match connections.remove(&connection_id).await {
            Ok(()) => reply(200, serde_json::json!({"disconnected": true})),
            Err(e) => reject(&e),
        },
        _ => match handle_message(&state, &connection_id, request.body.as_deref()).await {
            Ok(body) => reply(200, body),
            Err(e) => reject(&e),
        },
    };

    Ok(response)
}

async fn handle_message(
    state: &AppState,
    connection_id: &str,
    body: Option<&str>,
) -> taskboard_atoms::Result<serde_json::Value> {
    let message: WebSocketMessage = serde_json::from_str(body.unwrap_or_default())?;
    let action = message
        .parsed_action()
        .ok_or_else(|| BoardError::invalid(format!("unknown action: {}", message.action)))?;
    let board_id = message
        .board_id()
        .ok_or_else(|| BoardError::invalid("boardId is required"))?;

    let user_id = state
        .connections
        .user_for(connection_id)
        .await?
        .ok_or(BoardError::AccessDenied)?;

    match action {
        WebSocketAction::JoinBoard => {
            let access = state.orchestrator.join_board(&user_id, board_id).await?;
            state.connections.join(connection_id, board_id, &user_id).await?;
            Ok(serde_json::json!({"joined": access.board_id, "role": access.role}))
        }
        WebSocketAction::LeaveBoard => {
            state.connections.leave(connection_id, board_id).await?;
            Ok(serde_json::json!({"left": board_id}))
        }
    }
}
