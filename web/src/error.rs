//! Error types for web handlers.
//!
//! Every failure leaves a handler as `{ "error": "<message>" }` with a status
//! chosen by kind: 400 for bad input, 401 without a session, 404 for missing
//! rows, 500 for everything else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nomadhub_core::context::Unauthorized;
use nomadhub_core::error::{ActionError, DEFAULT_ERROR_MESSAGE};
use nomadhub_runtime::QueryError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Hub>, AppError> {
///     let hub = find(id).await?.ok_or_else(|| AppError::not_found("Hub not found"))?;
///     Ok(Json(hub))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, Unauthorized.to_string())
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500 Internal Server Error. An empty message becomes the default one.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, DEFAULT_ERROR_MESSAGE)
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }

    /// 503 Service Unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Status code of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(status = %self.status, message = %self.message, "Internal server error"),
            }
        }

        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(DEFAULT_ERROR_MESSAGE).with_source(err)
    }
}

impl From<Unauthorized> for AppError {
    fn from(_: Unauthorized) -> Self {
        Self::unauthorized()
    }
}

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        if err.is_unauthorized() {
            return Self::unauthorized();
        }
        let message = err.user_message();
        match err {
            ActionError::Validation(_) => Self::bad_request(message),
            ActionError::Operation(_) => Self::internal(message),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Unauthorized(_) => Self::unauthorized(),
            QueryError::Persistence(error) => Self::internal(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomadhub_core::repository::PersistenceError;
    use nomadhub_core::schema::ValidationError;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[400] Invalid input");
    }

    #[test]
    fn test_validation_maps_to_bad_request_with_first_issue() {
        let err = AppError::from(ActionError::from(ValidationError::single("name", "name is required")));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "name is required");
    }

    #[test]
    fn test_unauthorized_action_maps_to_401() {
        let err = AppError::from(ActionError::from(Unauthorized));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Unauthorized");
    }

    #[test]
    fn test_failure_worded_unauthorized_stays_500() {
        let err = AppError::from(ActionError::from(PersistenceError::Database("Unauthorized".to_string())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Unauthorized");
    }

    #[test]
    fn test_operation_failure_maps_to_500() {
        let err = AppError::from(ActionError::operation("duplicate key"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "duplicate key");
    }

    #[test]
    fn test_empty_persistence_message_uses_default() {
        let err = AppError::from(QueryError::Persistence(PersistenceError::Database(String::new())));
        assert_eq!(err.message(), DEFAULT_ERROR_MESSAGE);
    }
}
