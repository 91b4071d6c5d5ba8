//! # REST API for Read-only Views
//!
//! Mounted at the API root: `/activity` and `/summary`.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use log::info;
use shared::{ActivityListRequest, ActivityListResponse, PolicySummary};

use crate::domain::commands::activity::ActivityQuery;
use crate::io::rest::ApiResult;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activity", get(list_activity))
        .route("/summary", get(get_summary))
}

/// Activity log, newest first
pub async fn list_activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityListRequest>,
) -> ApiResult<Json<ActivityListResponse>> {
    info!("GET /api/activity - child={:?} limit={:?}", params.child_id, params.limit);
    let events = state
        .query_service
        .activity(ActivityQuery {
            child_id: params.child_id,
            limit: params.limit.map(|l| l as usize),
        })
        .await?;
    Ok(Json(ActivityListResponse { events }))
}

pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<PolicySummary>> {
    info!("GET /api/summary");
    Ok(Json(state.query_service.summary().await?))
}
