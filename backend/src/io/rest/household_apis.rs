//! # REST API for the Household
//!
//! Invitations, removals, approval mode and primary transfer all require a
//! step-up proof. Reading the household and accepting an invitation do not.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use log::info;
use shared::{
    HouseholdResponse, InviteMemberRequest, MemberResponse, RemoveMemberQuery, SetApprovalModeRequest,
    SetPrimaryGuardianRequest,
};

use crate::domain::commands::household::RemoveMemberCommand;
use crate::io::rest::mappers::household_mapper::HouseholdMapper;
use crate::io::rest::{Actor, ApiResult, StepUpProofId};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_household))
        .route("/members", post(invite_member))
        .route("/members/:member_id", delete(remove_member))
        .route("/members/:member_id/accept", post(accept_invite))
        .route("/approval-mode", put(set_approval_mode))
        .route("/primary", put(set_primary))
}

pub async fn get_household(State(state): State<AppState>) -> ApiResult<Json<HouseholdResponse>> {
    info!("GET /api/household");
    let household = state.household_service.household().await?;
    Ok(Json(HouseholdMapper::to_household_response(household)))
}

pub async fn invite_member(
    State(state): State<AppState>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<InviteMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    info!("POST /api/household/members - {} by {}", request.name, actor.guardian_id);
    let member = state
        .household_service
        .invite(&actor, &proof_id, HouseholdMapper::to_invite_command(request))
        .await?;
    let message = format!("Invitation sent to {}", member.name);
    Ok((StatusCode::CREATED, Json(HouseholdMapper::to_member_response(member, message))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Query(params): Query<RemoveMemberQuery>,
) -> ApiResult<Json<MemberResponse>> {
    info!("DELETE /api/household/members/{} by {}", member_id, actor.guardian_id);
    let command = RemoveMemberCommand {
        member_id,
        allow_last_emergency_contact: params.allow_last_emergency_contact,
    };
    let member = state.household_service.remove(&actor, &proof_id, command).await?;
    let message = format!("{} removed", member.name);
    Ok(Json(HouseholdMapper::to_member_response(member, message)))
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> ApiResult<Json<MemberResponse>> {
    info!("POST /api/household/members/{}/accept", member_id);
    let member = state.household_service.accept_invite(&member_id).await?;
    let message = format!("Welcome, {}", member.name);
    Ok(Json(HouseholdMapper::to_member_response(member, message)))
}

pub async fn set_approval_mode(
    State(state): State<AppState>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<SetApprovalModeRequest>,
) -> ApiResult<Json<HouseholdResponse>> {
    info!("PUT /api/household/approval-mode - {} by {}", request.mode, actor.guardian_id);
    let household = state
        .household_service
        .set_approval_mode(&actor, &proof_id, request.mode)
        .await?;
    Ok(Json(HouseholdMapper::to_household_response(household)))
}

pub async fn set_primary(
    State(state): State<AppState>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<SetPrimaryGuardianRequest>,
) -> ApiResult<Json<HouseholdResponse>> {
    info!("PUT /api/household/primary - {} by {}", request.member_id, actor.guardian_id);
    let household = state
        .household_service
        .set_primary(&actor, &proof_id, &request.member_id)
        .await?;
    Ok(Json(HouseholdMapper::to_household_response(household)))
}
