//! Request-header extractors for the acting guardian and step-up proof.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::domain::errors::GuardianError;
use crate::domain::models::ActorContext;
use crate::io::rest::errors::ApiError;

pub const GUARDIAN_ID_HEADER: &str = "x-guardian-id";
pub const STEP_UP_PROOF_HEADER: &str = "x-step-up-proof";

/// The authenticated guardian making the request
#[derive(Debug, Clone)]
pub struct Actor(pub ActorContext);

/// Id of the step-up proof presented for a guarded mutation
#[derive(Debug, Clone)]
pub struct StepUpProofId(pub String);

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts, GUARDIAN_ID_HEADER)
            .map(|id| Actor(ActorContext::guardian(id)))
            .ok_or_else(|| ApiError(GuardianError::auth(format!("Missing {} header", GUARDIAN_ID_HEADER))))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StepUpProofId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts, STEP_UP_PROOF_HEADER)
            .map(StepUpProofId)
            .ok_or_else(|| ApiError(GuardianError::auth("Missing step-up proof")))
    }
}
