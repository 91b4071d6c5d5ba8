//! # REST API for Step-Up Authentication
//!
//! Guardians obtain a single-use proof here before calling a guarded route.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use log::info;
use serde::Deserialize;
use shared::{
    ChallengeTicket, PasswordStepUpRequest, SendChallengeRequest, StepUpAttemptsResponse, StepUpProof,
    StepUpRequest, StepUpRequirement, VerifyChallengeRequest,
};

use crate::io::rest::{Actor, ApiResult};
use crate::AppState;

/// Create the step-up API router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/require", post(require_step_up))
        .route("/password", post(verify_password))
        .route("/challenges", post(send_challenge))
        .route("/challenges/:challenge_id/verify", post(verify_challenge))
        .route("/proofs/:proof_id", delete(cancel_proof))
        .route("/attempts", get(list_attempts))
}

#[derive(Debug, Deserialize)]
pub struct AttemptsParams {
    pub limit: Option<u32>,
}

/// Describe what the guardian must do before `operation`
pub async fn require_step_up(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<StepUpRequest>,
) -> Json<StepUpRequirement> {
    info!("POST /api/step-up/require - {} for {}", request.operation, actor.guardian_id);
    Json(state.step_up_service.require_step_up(&actor, request.operation))
}

pub async fn verify_password(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<PasswordStepUpRequest>,
) -> ApiResult<Json<StepUpProof>> {
    // the secret itself is never logged
    info!("POST /api/step-up/password - {} for {}", request.operation, actor.guardian_id);
    let proof = state
        .step_up_service
        .verify_password(&actor, request.operation, &request.secret)
        .await?;
    Ok(Json(proof))
}

pub async fn send_challenge(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<SendChallengeRequest>,
) -> ApiResult<(StatusCode, Json<ChallengeTicket>)> {
    info!("POST /api/step-up/challenges - {} for {}", request.channel, actor.guardian_id);
    let ticket = state.step_up_service.send_challenge(&actor, request.channel).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn verify_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<String>,
    Actor(actor): Actor,
    Json(request): Json<VerifyChallengeRequest>,
) -> ApiResult<Json<StepUpProof>> {
    info!("POST /api/step-up/challenges/{}/verify - {}", challenge_id, request.operation);
    let proof = state
        .step_up_service
        .verify_challenge(&actor, request.operation, &challenge_id, &request.code)
        .await?;
    Ok(Json(proof))
}

pub async fn cancel_proof(
    State(state): State<AppState>,
    Path(proof_id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    info!("DELETE /api/step-up/proofs/{}", proof_id);
    state.step_up_service.cancel(&actor, &proof_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Step-up attempt history of the calling guardian
pub async fn list_attempts(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(params): Query<AttemptsParams>,
) -> ApiResult<Json<StepUpAttemptsResponse>> {
    info!("GET /api/step-up/attempts - guardian {}", actor.guardian_id);
    let attempts = state
        .step_up_service
        .recent_attempts(Some(&actor.guardian_id), params.limit)
        .await?;
    let stats = state.step_up_service.attempt_stats(Some(&actor.guardian_id)).await?;
    Ok(Json(StepUpAttemptsResponse { attempts, stats }))
}
