use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Principal used when no access token is configured.
pub const DEBUG_PRINCIPAL: &str = "debug_user";

/// Per-request authorization decision, built fresh for every request.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub request_id: Uuid,
    pub principal: String,
}

/// Decide whether a request may proceed given the configured token and the
/// `Authorization` header it carried.
pub fn authorize(expected_token: Option<&str>, authorization: Option<&str>) -> Result<String, AppError> {
    let Some(expected) = expected_token else {
        return Ok(DEBUG_PRINCIPAL.to_string());
    };

    let presented = authorization
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if token == expected => Ok("token".to_string()),
        _ => Err(AppError::Unauthorized),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AccessContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let principal = authorize(state.config.access_token.as_deref(), header).map_err(|e| {
            warn!("Rejected unauthorized request to {}", parts.uri.path());
            e
        })?;

        Ok(AccessContext {
            request_id: Uuid::new_v4(),
            principal,
        })
    }
}
