use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use log::{error, warn};
use serde_json::json;

use crate::domain::errors::GuardianError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Domain error on its way out of a handler
#[derive(Debug)]
pub struct ApiError(pub GuardianError);

impl From<GuardianError> for ApiError {
    fn from(error: GuardianError) -> Self {
        ApiError(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GuardianError::Validation(_) => StatusCode::BAD_REQUEST,
            GuardianError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GuardianError::Forbidden(_) => StatusCode::FORBIDDEN,
            GuardianError::NotFound { .. } => StatusCode::NOT_FOUND,
            GuardianError::AlreadyDecided(_)
            | GuardianError::AlreadyVoted { .. }
            | GuardianError::StaleVersion { .. } => StatusCode::CONFLICT,
            GuardianError::SafetyInvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GuardianError::ChallengeCooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuardianError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GuardianError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            GuardianError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            GuardianError::Storage(e) => {
                error!("Storage failure: {:#}", e);
                "Internal storage error".to_string()
            }
            other => {
                warn!("Request failed with {}: {}", other.code(), other);
                other.to_string()
            }
        };

        let mut body = json!({
            "error": message,
            "code": self.0.code(),
        });
        if let GuardianError::ChallengeCooldown { retry_after_secs } = &self.0 {
            body["retry_after_secs"] = json!(retry_after_secs);
        }
        (status, Json(body)).into_response()
    }
}
