use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Failure categories surfaced to the user when a recommendation flow fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    AuthFailed,
    InvalidResponse,
    /// A catalog miss. Never surfaced as an error, only degrades enrichment.
    NotFound,
    Offline,
    Unknown,
}

impl ErrorKind {
    /// Message shown inline when a generation fails after all retries
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => {
                "Too many requests right now. Please wait a moment and try again."
            }
            ErrorKind::AuthFailed => {
                "The recommendation service rejected our credentials. Please try again later."
            }
            ErrorKind::InvalidResponse => {
                "We couldn't understand the recommendations we received. Please try again."
            }
            ErrorKind::NotFound => "Nothing matched that request.",
            ErrorKind::Offline => "You appear to be offline. Showing cached content where possible.",
            ErrorKind::Unknown => "Something went wrong while generating recommendations.",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Offline => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::AuthFailed | ErrorKind::InvalidResponse | ErrorKind::Unknown => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

/// Error produced by the language-model pipeline once retries are exhausted
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct GenerationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Offline: {0}")]
    Offline(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classifies a reqwest failure, treating connection failures as offline
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AppError::Offline(err.to_string())
        } else {
            AppError::HttpClient(err)
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, AppError::Offline(_))
            || matches!(self, AppError::Generation(e) if e.kind == ErrorKind::Offline)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Generation(e) => (e.kind.status(), e.kind, e.kind.user_message().to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorKind::NotFound, msg.clone()),
            AppError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, ErrorKind::Unknown, msg.clone())
            }
            AppError::Offline(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Offline,
                ErrorKind::Offline.user_message().to_string(),
            ),
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, ErrorKind::Unknown, msg.clone()),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, ErrorKind::Unknown, self.to_string()),
            AppError::Cache(_) | AppError::Storage(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Unknown,
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_status_mapping() {
        let response =
            AppError::Generation(GenerationError::new(ErrorKind::RateLimited, "429")).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response =
            AppError::Generation(GenerationError::invalid_response("bad json")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_offline_detection() {
        let err = AppError::Generation(GenerationError::new(ErrorKind::Offline, "down"));
        assert!(err.is_offline());
        assert!(AppError::Offline("no route".to_string()).is_offline());
        assert!(!AppError::NotFound("x".to_string()).is_offline());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidResponse).unwrap();
        assert_eq!(json, r#""invalid_response""#);
    }
}
