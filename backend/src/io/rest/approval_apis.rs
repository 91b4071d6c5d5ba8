//! # REST API for Pending Approvals
//!
//! Approvals are raised directly or by a child action that needs sign-off.
//! Deciding one is a guarded operation scoped to the approval id.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use shared::{
    ApprovalListResponse, ApprovalResponse, ApprovalStatus, CreateApprovalRequest, DecideApprovalRequest,
    PendingApproval,
};

use crate::domain::commands::approvals::ApprovalListQuery;
use crate::io::rest::mappers::approval_mapper::ApprovalMapper;
use crate::io::rest::{Actor, ApiResult, StepUpProofId};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_approvals).post(create_approval))
        .route("/:approval_id", get(get_approval))
        .route("/:approval_id/decision", post(decide_approval))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalListParams {
    pub child_id: Option<String>,
    pub status: Option<ApprovalStatus>,
}

pub async fn list_approvals(
    State(state): State<AppState>,
    Query(params): Query<ApprovalListParams>,
) -> ApiResult<Json<ApprovalListResponse>> {
    info!("GET /api/approvals - child={:?} status={:?}", params.child_id, params.status);
    let approvals = state
        .approval_service
        .list_approvals(ApprovalListQuery {
            child_id: params.child_id,
            status: params.status,
        })
        .await?;
    Ok(Json(ApprovalListResponse { approvals }))
}

pub async fn create_approval(
    State(state): State<AppState>,
    Json(request): Json<CreateApprovalRequest>,
) -> ApiResult<(StatusCode, Json<ApprovalResponse>)> {
    info!("POST /api/approvals - '{}' for {}", request.title, request.child_id);
    let approval = state
        .approval_service
        .create_approval(ApprovalMapper::to_create_command(request))
        .await?;
    Ok((StatusCode::CREATED, Json(ApprovalMapper::to_approval_response(approval))))
}

pub async fn get_approval(
    State(state): State<AppState>,
    Path(approval_id): Path<String>,
) -> ApiResult<Json<PendingApproval>> {
    info!("GET /api/approvals/{}", approval_id);
    Ok(Json(state.approval_service.get_approval(&approval_id).await?))
}

pub async fn decide_approval(
    State(state): State<AppState>,
    Path(approval_id): Path<String>,
    Actor(actor): Actor,
    StepUpProofId(proof_id): StepUpProofId,
    Json(request): Json<DecideApprovalRequest>,
) -> ApiResult<Json<ApprovalResponse>> {
    info!(
        "POST /api/approvals/{}/decision - {:?} by {}",
        approval_id, request.decision, actor.guardian_id
    );
    let approval = state
        .approval_service
        .decide(&actor, &proof_id, &approval_id, request.decision)
        .await?;
    Ok(Json(ApprovalMapper::to_approval_response(approval)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{TestEngine, PRIMARY_ID};
    use crate::io::rest::test_helpers::{read_json, request};
    use axum::http::Method;
    use serde_json::{json, Value};
    use shared::GuardedOperation;
    use tower::util::ServiceExt;

    fn app(engine: &TestEngine) -> Router {
        router().with_state(engine.state.clone())
    }

    fn approval_body(child_id: &str, amount: i64) -> Value {
        json!({
            "child_id": child_id,
            "kind": "Purchase",
            "title": "Bike helmet",
            "amount": amount,
            "currency": null,
            "reason": "Requires guardian approval",
            "vendor": "CycleShop",
            "detail": null
        })
    }

    #[tokio::test]
    async fn test_create_list_and_get() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;

        let response = app(&engine)
            .oneshot(request(Method::POST, "/", None, None, Some(approval_body(&child.id, 4_500))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: ApprovalResponse = read_json(response).await;
        assert_eq!(created.approval.status, ApprovalStatus::Pending);
        assert_eq!(created.approval.currency, "USD");

        let uri = format!("/?child_id={}&status=Pending", child.id);
        let response = app(&engine)
            .oneshot(request(Method::GET, &uri, None, None, None))
            .await
            .unwrap();
        let list: ApprovalListResponse = read_json(response).await;
        assert_eq!(list.approvals.len(), 1);

        let response = app(&engine)
            .oneshot(request(Method::GET, "/?status=Approved", None, None, None))
            .await
            .unwrap();
        let list: ApprovalListResponse = read_json(response).await;
        assert!(list.approvals.is_empty());

        let uri = format!("/{}", created.approval.id);
        let response = app(&engine)
            .oneshot(request(Method::GET, &uri, None, None, None))
            .await
            .unwrap();
        let fetched: PendingApproval = read_json(response).await;
        assert_eq!(fetched.id, created.approval.id);
    }

    #[tokio::test]
    async fn test_negative_amount_is_rejected() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let response = app(&engine)
            .oneshot(request(Method::POST, "/", None, None, Some(approval_body(&child.id, -1))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_decision_needs_proof_and_is_final() {
        let engine = TestEngine::new().await;
        let child = engine.create_child("Ann").await;
        let created = engine
            .state
            .approval_service
            .create_approval(ApprovalMapper::to_create_command(
                serde_json::from_value(approval_body(&child.id, 4_500)).unwrap(),
            ))
            .await
            .unwrap();
        let uri = format!("/{}/decision", created.id);
        let body = json!({ "decision": "Approve" });

        let response = app(&engine)
            .oneshot(request(Method::POST, &uri, Some(PRIMARY_ID), Some("proof::bogus"), Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let op = GuardedOperation::DecideApproval { approval_id: created.id.clone() };
        let proof = engine.password_proof(op.clone()).await;
        let response = app(&engine)
            .oneshot(request(Method::POST, &uri, Some(PRIMARY_ID), Some(&proof), Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let decided: ApprovalResponse = read_json(response).await;
        assert_eq!(decided.approval.status, ApprovalStatus::Approved);
        assert_eq!(decided.approval.decided_by.as_deref(), Some(PRIMARY_ID));

        let proof = engine.password_proof(op).await;
        let response = app(&engine)
            .oneshot(request(Method::POST, &uri, Some(PRIMARY_ID), Some(&proof), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let error: Value = read_json(response).await;
        assert_eq!(error["code"], "ALREADY_DECIDED");
    }
}
