//! # REST API for Child Profiles
//!
//! Creation and linking are open to any guardian; every policy change needs a
//! step-up proof bound to the child.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use shared::{
    ApplyTemplateRequest, ChildActionOutcome, ChildActionRequest, ChildListResponse, ChildOverview, ChildProfile,
    ChildResponse, CreateChildRequest, LinkChildRequest, RecordConsentRequest,
};

use crate::domain::commands::children::{ApplyTemplateCommand, RecordConsentCommand, UpdatePolicyCommand};
use crate::domain::models::PolicyPatch;
use crate::io::rest::mappers::child_mapper::ChildMapper;
use crate::io::rest::{Actor, ApiResult, StepUpProofId};
use crate::AppState;

/// Create a router for child related APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_children).post(create_child))
        .route("/link", post(link_child))
        .route("/:child_id", get(get_child))
        .route("/:child_id/policy", put(update_policy))
        .route("/:child_id/template", post(apply_template))
        .route("/:child_id/consent", post(record_consent))
        .route("/:child_id/actions", post(submit_action))
        .route("/:child_id/overview", get(get_overview))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePolicyRequest {
    pub patch: PolicyPatch,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

pub async fn list_children(State(state): State<AppState>) -> ApiResult<Json<ChildListResponse>> {
    info!("GET /api/children");
    let children = state.child_service.list_children().await?;
    Ok(Json(ChildListResponse { children }))
}

pub async fn create_child(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateChildRequest>,
) -> ApiResult<(StatusCode, Json<ChildResponse>)> {
    info!("POST /api/children - {} by {}", request.name, actor.guardian_id);
    let child = state
        .child_service
        .create_child(&actor, ChildMapper::to_create_command(request))
        .await?;
    let message = format!("{} added", child.name);
    Ok((StatusCode::CREATED, Json(ChildMapper::to_child_response(child, message))))
}

pub async fn link_child(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<LinkChildRequest>,
) -> ApiResult<(StatusCode, Json<ChildResponse>)> {
    info!("POST /api/children/link - {} by {}", request.account_ref, actor.guardian_id);
    let child = state
        .child_service
        .link_child(&actor, ChildMapper::to_link_command(request))
        .await?;
    let message = format!("{} linked", child.name);
    Ok((StatusCode::CREATED, Json(ChildMapper::to_child_response(child, message))))
}

pub async fn get_child(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
) -> ApiResult<Json<ChildProfile>> {
    info!("GET /api/children/{}", child_id);
    Ok(Json(state.child_service.get_child(&child_id).await?))
}

pub async fn update_policy(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<UpdatePolicyRequest>,
) -> ApiResult<Json<ChildResponse>> {
    info!("PUT /api/children/{}/policy - {:?}", child_id, request.patch.sections());
    let command = UpdatePolicyCommand {
        patch: request.patch,
        expected_version: request.expected_version,
        audit: None,
    };
    let child = state
        .child_service
        .update_policy(&actor, &proof_id, &child_id, command)
        .await?;
    Ok(Json(ChildMapper::to_child_response(child, "Policy updated")))
}

pub async fn apply_template(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<ApplyTemplateRequest>,
) -> ApiResult<Json<ChildResponse>> {
    info!("POST /api/children/{}/template - {}", child_id, request.template);
    let command = ApplyTemplateCommand {
        template: request.template,
        expected_version: request.expected_version,
    };
    let child = state
        .child_service
        .apply_template(&actor, &proof_id, &child_id, command)
        .await?;
    let message = format!("Applied {} template", child.template);
    Ok(Json(ChildMapper::to_child_response(child, message)))
}

pub async fn record_consent(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<RecordConsentRequest>,
) -> ApiResult<Json<ChildResponse>> {
    info!("POST /api/children/{}/consent - version {}", child_id, request.consent_version);
    let command = RecordConsentCommand {
        consent_version: request.consent_version,
    };
    let child = state
        .child_service
        .record_consent(&actor, &proof_id, &child_id, command)
        .await?;
    Ok(Json(ChildMapper::to_child_response(child, "Consent recorded")))
}

/// Evaluate an action the child wants to take
pub async fn submit_action(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
    Json(request): Json<ChildActionRequest>,
) -> ApiResult<Json<ChildActionOutcome>> {
    info!("POST /api/children/{}/actions - {:?} '{}'", child_id, request.kind, request.title);
    let outcome = state
        .approval_service
        .submit_child_action(&child_id, ChildMapper::to_child_action(request))
        .await?;
    Ok(Json(outcome))
}

pub async fn get_overview(
    State(state): State<AppState>,
    Path(child_id): Path<String>,
) -> ApiResult<Json<ChildOverview>> {
    info!("GET /api/children/{}/overview", child_id);
    Ok(Json(state.query_service.child_overview(&child_id).await?))
}
