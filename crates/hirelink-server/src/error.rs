use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use hirelink_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServerError::Authorization(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => ServerError::Validation(msg),
            StoreError::Authorization(msg) => ServerError::Authorization(msg),
            StoreError::NotFound => ServerError::NotFound("Message not found".into()),
            StoreError::UserNotFound => ServerError::NotFound("User not found".into()),
            StoreError::JobNotFound => ServerError::NotFound("Job not found".into()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Internals stay out of the response body.
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(
            ServerError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Authentication("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::Authorization("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn store_errors_map_onto_http_statuses() {
        let e: ServerError = StoreError::Validation("bad".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ServerError = StoreError::UserNotFound.into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e: ServerError = StoreError::Authorization("no".into()).into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
    }
}
