use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("External error: {0}")]
    External(String),
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM features are disabled")]
    Disabled,
    #[error("Rate limited by LLM provider")]
    RateLimited,
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Errors after which it makes sense to try the fallback model once.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited | LlmError::QuotaExceeded(_) | LlmError::ApiError(_)
        )
    }
}

/// Contract violations when calling the concentration analyzer.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("threshold must be a finite, non-negative percentage (got {0})")]
    InvalidThreshold(f64),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg).into_response(),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            AppError::Llm(LlmError::RateLimited) => {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (StatusCode::TOO_MANY_REQUESTS, headers, "Rate limited").into_response()
            },
            AppError::External(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::Llm(LlmError::Disabled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "AI extraction is not configured").into_response()
            },
            AppError::Llm(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(value: AnalysisError) -> Self {
        AppError::Validation(value.to_string())
    }
}
