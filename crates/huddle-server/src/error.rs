use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use huddle_shared::ChatError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Missing or empty x-user-id header")]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Chat(e) => match e {
                ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                ChatError::NotFound(_) => StatusCode::NOT_FOUND,
                ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
                ChatError::AlreadyExists(_) | ChatError::AlreadyMember { .. } => {
                    StatusCode::CONFLICT
                }
                ChatError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ServerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Chat(ChatError::Unavailable(detail)) => {
                tracing::error!(error = %detail, "Store unavailable");
                "Service unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use huddle_shared::{GroupId, UserId};

    use super::*;

    #[test]
    fn chat_errors_map_to_statuses() {
        let cases = [
            (ChatError::invalid("x"), StatusCode::BAD_REQUEST),
            (ChatError::not_found("x"), StatusCode::NOT_FOUND),
            (ChatError::forbidden("x"), StatusCode::FORBIDDEN),
            (ChatError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (
                ChatError::AlreadyMember {
                    group: GroupId::new(),
                    user: UserId::from("u4"),
                },
                StatusCode::CONFLICT,
            ),
            (
                ChatError::Unavailable("disk".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_caller_is_unauthorized() {
        let response = ServerError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bad_request_keeps_the_error_body() {
        let err = ServerError::BadRequest("Failed to parse the request body".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Invalid request: Failed to parse the request body"
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
