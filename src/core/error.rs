use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Business rule or state transition violations
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor is not allowed to act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors (failed transactions, corrupt rows)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Storage and wiring details stay in the logs
        let message = if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Notification(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl AppError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Database(_) => "database",
            AppError::Notification(_) => "notification",
            AppError::Configuration(_) => "configuration",
            AppError::Json(_) => "invalid_json",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        AppError::Notification(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
