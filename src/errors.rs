use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// The CRM command-line tool failed, timed out, or returned garbage.
    ExternalApiError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            AppError::WithContext { source, .. } => source.status_code(),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Body is `{"error": ..., "timestamp": ...}`. Not-found and bad-request
    /// messages reach the client verbatim; upstream failures are logged and
    /// replaced by a generic message.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("CRM CLI error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Falha ao consultar o CRM".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (**source).clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
            "timestamp": Local::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ExternalApiError(format!("Invalid JSON from CRM CLI: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_source_status() {
        let err: Result<(), AppError> = Err(AppError::NotFound("Deal 42 não encontrado".into()));
        let err = err.context("fetching deal").unwrap_err();

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "fetching deal: Not found: Deal 42 não encontrado"
        );
    }

    #[test]
    fn external_errors_map_to_bad_gateway() {
        let response = AppError::ExternalApiError("hs exited with 1".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn invalid_cli_json_maps_to_bad_gateway() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = AppError::from(parse_err);

        assert!(matches!(err, AppError::ExternalApiError(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        let wrapped: Result<(), AppError> = Err(err);
        let response = wrapped.context("listing deals").unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn with_context_is_lazy_on_success() {
        let ok: Result<u8, AppError> = Ok(1);
        let value = ok
            .with_context(|| panic!("context must not be built on success"))
            .unwrap();
        assert_eq!(value, 1);
    }
}
