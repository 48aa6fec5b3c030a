use board_block::http::{activity, boards, lists, members, tasks};
use board_block::response::{not_found, unauthorized};
use lambda_http::http::header::HeaderValue;
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::sync::Arc;
use taskboard_shared::AppState;

/// Header set by the upstream authorizer
const USER_HEADER: &str = "X-User-Id";

fn with_cors_headers(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,X-User-Id"),
    );
    resp
}

fn user_id(event: &Request) -> Option<String> {
    event
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Routes board, list and task requests to the board block
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    tracing::info!("API lambda invoked - Method: {} Path: {}", method, path);

    if *method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp));
    }

    let Some(user_id) = user_id(&event) else {
        tracing::debug!("Rejecting request without {}", USER_HEADER);
        return unauthorized().map(with_cors_headers);
    };
    let user_id = user_id.as_str();

    let orchestrator = &state.orchestrator;
    let body = event.body().as_ref();
    let query = event.query_string_parameters();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let resp = match (method, parts.as_slice()) {
        // --- BOARDS ---
        (&Method::POST, ["boards"]) => boards::create_board(orchestrator, user_id, body).await,
        (&Method::GET, ["boards"]) => boards::list_boards(orchestrator, user_id).await,
        (&Method::GET, ["boards", board_id]) => boards::get_board(orchestrator, user_id, board_id).await,
        (&Method::PATCH, ["boards", board_id]) => {
            boards::rename_board(orchestrator, user_id, board_id, body).await
        }
        (&Method::DELETE, ["boards", board_id]) => boards::delete_board(orchestrator, user_id, board_id).await,
        (&Method::PUT, ["boards", board_id, "transfer", target_id]) => {
            members::transfer_ownership(orchestrator, user_id, board_id, target_id).await
        }

        // --- MEMBERS ---
        (&Method::GET, ["boards", board_id, "members"]) => {
            members::list_members(orchestrator, user_id, board_id).await
        }
        (&Method::POST, ["boards", board_id, "members", target_id]) => {
            members::add_member(orchestrator, user_id, board_id, target_id).await
        }
        (&Method::PUT, ["boards", board_id, "members", target_id, "role"]) => {
            members::update_role(orchestrator, user_id, board_id, target_id, body).await
        }
        (&Method::DELETE, ["boards", board_id, "members", target_id]) => {
            members::remove_member(orchestrator, user_id, board_id, target_id).await
        }
        (&Method::DELETE, ["boards", board_id, "leave"]) => {
            members::leave_board(orchestrator, user_id, board_id).await
        }

        // --- BOARD CONTENT ---
        (&Method::GET, ["boards", board_id, "lists"]) => lists::board_lists(orchestrator, user_id, board_id).await,
        (&Method::GET, ["boards", board_id, "activity"]) => {
            activity::recent_activity(orchestrator, user_id, board_id, query.first("limit")).await
        }

        // --- LISTS ---
        (&Method::POST, ["lists"]) => lists::create_list(orchestrator, user_id, body).await,
        (&Method::PATCH, ["lists", list_id]) => lists::rename_list(orchestrator, user_id, list_id, body).await,
        (&Method::PUT, ["lists", list_id, "move"]) => lists::move_list(orchestrator, user_id, list_id, body).await,
        (&Method::DELETE, ["lists", list_id]) => lists::delete_list(orchestrator, user_id, list_id).await,

        // --- TASKS ---
        (&Method::POST, ["tasks"]) => tasks::create_task(orchestrator, user_id, body).await,
        (&Method::GET, ["tasks", task_id]) => tasks::get_task(orchestrator, user_id, task_id).await,
        (&Method::PATCH, ["tasks", task_id]) => tasks::update_task(orchestrator, user_id, task_id, body).await,
        (&Method::PUT, ["tasks", task_id, "move"]) => tasks::move_task(orchestrator, user_id, task_id, body).await,
        (&Method::DELETE, ["tasks", task_id]) => tasks::delete_task(orchestrator, user_id, task_id).await,
        (&Method::POST, ["tasks", task_id, "assignees", assignee_id]) => {
            tasks::assign_user(orchestrator, user_id, task_id, assignee_id).await
        }
        (&Method::DELETE, ["tasks", task_id, "assignees", assignee_id]) => {
            tasks::unassign_user(orchestrator, user_id, task_id, assignee_id).await
        }
        (&Method::POST, ["tasks", task_id, "labels"]) => tasks::add_label(orchestrator, user_id, task_id, body).await,
        (&Method::DELETE, ["tasks", task_id, "labels", label_id]) => {
            tasks::remove_label(orchestrator, user_id, task_id, label_id).await
        }
        (&Method::GET, ["tasks", task_id, "comments"]) => tasks::list_comments(orchestrator, user_id, task_id).await,
        (&Method::POST, ["tasks", task_id, "comments"]) => {
            tasks::add_comment(orchestrator, user_id, task_id, body).await
        }

        _ => not_found(),
    };

    resp.map(with_cors_headers)
}
