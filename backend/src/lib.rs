//! # Guardianship Engine Backend
//!
//! Orchestration layer that brings together:
//! - **Domain**: child policies, approvals, household and the step-up gate
//! - **Storage**: YAML documents and CSV journals under the data directory
//! - **IO**: the REST API served by `guardian-server`
//!
//! ```text
//! REST (axum routers)
//!     ↓
//! Domain services
//!     ↓
//! Storage traits → CSV/YAML repositories
//! ```

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use log::info;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::EngineConfig;
use crate::domain::{
    ActivityService, ApprovalService, ChildService, Clock, HouseholdService, IdentityProvider,
    LocalIdentityProvider, NotificationDispatcher, OutboxDispatcher, QueryService, StepUpService, SystemClock,
};
use crate::storage::csv::{
    ActivityRepository, ApprovalRepository, ChildRepository, CsvConnection, HouseholdRepository,
    StepUpAttemptRepository,
};
use crate::storage::ActivityStorage;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub child_service: ChildService,
    pub approval_service: ApprovalService,
    pub household_service: HouseholdService,
    pub step_up_service: StepUpService,
    pub activity_service: ActivityService,
    pub query_service: QueryService,
}

/// Wire every service on top of `connection` with the given collaborators
pub fn build_state(
    connection: CsvConnection,
    config: &EngineConfig,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
) -> AppState {
    let activity_storage = Arc::new(ActivityRepository::new(connection.clone()));
    build_state_with_activity(connection, activity_storage, config, identity, dispatcher, clock)
}

/// Same as [`build_state`] but with the activity log written to `activity_storage`
pub fn build_state_with_activity(
    connection: CsvConnection,
    activity_storage: Arc<dyn ActivityStorage>,
    config: &EngineConfig,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
) -> AppState {
    let activity_service = ActivityService::new(activity_storage, clock.clone());
    let step_up_service = StepUpService::new(
        identity,
        Arc::new(StepUpAttemptRepository::new(connection.clone())),
        clock.clone(),
        config.step_up.clone(),
        config.call_timeout(),
    );
    let household_service = HouseholdService::new(
        Arc::new(HouseholdRepository::new(connection.clone())),
        activity_service.clone(),
        step_up_service.clone(),
        dispatcher,
        clock.clone(),
        config.call_timeout(),
        config.primary_guardian.clone(),
    );
    let child_service = ChildService::new(
        Arc::new(ChildRepository::new(connection.clone())),
        activity_service.clone(),
        step_up_service.clone(),
        household_service.clone(),
        clock.clone(),
        config.charging_app_key.clone(),
        config.default_currency.clone(),
    );
    let approval_service = ApprovalService::new(
        Arc::new(ApprovalRepository::new(connection)),
        child_service.clone(),
        household_service.clone(),
        activity_service.clone(),
        step_up_service.clone(),
        clock,
        config.charging_app_key.clone(),
    );
    let query_service = QueryService::new(
        child_service.clone(),
        approval_service.clone(),
        activity_service.clone(),
    );

    AppState {
        child_service,
        approval_service,
        household_service,
        step_up_service,
        activity_service,
        query_service,
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &EngineConfig) -> Result<AppState> {
    info!("Setting up data directory {}", config.data_dir.display());
    let connection = CsvConnection::new(&config.data_dir)?;

    info!("Setting up identity provider");
    let outbox = OutboxDispatcher::new();
    let identity = LocalIdentityProvider::new(Arc::new(outbox.clone()));
    if let Some(hash) = &config.primary_guardian.password_sha256 {
        identity.set_password_hash(config.primary_guardian.id.clone(), hash.clone());
    }

    info!("Setting up domain model");
    let state = build_state(connection, config, Arc::new(identity), Arc::new(outbox), Arc::new(SystemClock));

    let household = state.household_service.household().await?;
    info!(
        "Household ready: {} member(s), approval mode {}",
        household.members.len(),
        household.approval_mode
    );
    Ok(state)
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, config: &EngineConfig) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(config.allowed_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/step-up", io::rest::step_up_apis::router())
        .nest("/children", io::rest::child_apis::router())
        .nest("/approvals", io::rest::approval_apis::router())
        .nest("/household", io::rest::household_apis::router())
        .merge(io::rest::query_apis::router());

    Ok(Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state))
}
