//! JSON response helpers shared by every handler.

use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use taskboard_atoms::BoardError;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

pub fn status_for(err: &BoardError) -> StatusCode {
    match err {
        BoardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        BoardError::NotFound { .. } => StatusCode::NOT_FOUND,
        BoardError::AccessDenied | BoardError::InsufficientPermissions => StatusCode::FORBIDDEN,
        BoardError::Conflict(_) | BoardError::Contended { .. } => StatusCode::CONFLICT,
        BoardError::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Decode a JSON request body. An empty body is an invalid request.
pub fn parse<T: DeserializeOwned>(body: &[u8]) -> taskboard_atoms::Result<T> {
    if body.is_empty() {
        return Err(BoardError::invalid("request body is required"));
    }
    Ok(serde_json::from_slice(body)?)
}

pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn error(err: &BoardError) -> Result<Response<Body>, Error> {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    json(
        status,
        &ErrorResponse {
            error: err.kind().to_string(),
            message: err.to_string(),
        },
    )
}

/// Serialize a result: the value with `status`, or the mapped error.
pub fn respond<T: Serialize>(result: taskboard_atoms::Result<T>, status: StatusCode) -> Result<Response<Body>, Error> {
    match result {
        Ok(value) => json(status, &value),
        Err(e) => error(&e),
    }
}

pub fn respond_empty(result: taskboard_atoms::Result<()>) -> Result<Response<Body>, Error> {
    match result {
        Ok(()) => no_content(),
        Err(e) => error(&e),
    }
}

pub fn not_found() -> Result<Response<Body>, Error> {
    json(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: "NotFound".to_string(),
            message: "route not found".to_string(),
        },
    )
}

pub fn unauthorized() -> Result<Response<Body>, Error> {
    json(
        StatusCode::UNAUTHORIZED,
        &ErrorResponse {
            error: "Unauthorized".to_string(),
            message: "missing X-User-Id header".to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        assert_eq!(status_for(&BoardError::invalid("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&BoardError::not_found("task", "t")), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&BoardError::AccessDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&BoardError::InsufficientPermissions), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&BoardError::Contended { container: "LIST#l".into() }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&BoardError::failed("boom")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_shape() {
        let resp = error(&BoardError::conflict("user is already a member")).unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "Conflict");
        assert_eq!(body["message"], "conflict: user is already a member");
    }

    #[test]
    fn test_empty_body_is_invalid() {
        let result: taskboard_atoms::Result<serde_json::Value> = parse(b"");
        assert!(matches!(result, Err(BoardError::InvalidRequest(_))));
    }
}
