//! # Storage Traits
//!
//! Storage abstractions the domain layer works against. Implementations
//! return `anyhow::Result`; the services translate failures into
//! `GuardianError::Storage`.

use anyhow::Result;
use async_trait::async_trait;
use shared::{ActivityEvent, ApprovalStatus, ChildProfile, Household, PendingApproval, StepUpAttempt};

/// Persistence of supervised child profiles
#[async_trait]
pub trait ChildStorage: Send + Sync {
    /// Store a new child profile
    async fn store_child(&self, child: &ChildProfile) -> Result<()>;

    async fn get_child(&self, child_id: &str) -> Result<Option<ChildProfile>>;

    /// List all children, ordered by name
    async fn list_children(&self) -> Result<Vec<ChildProfile>>;

    /// Overwrite an existing child profile
    async fn update_child(&self, child: &ChildProfile) -> Result<()>;

    /// Remove a child profile. Used to undo a creation whose audit write failed.
    async fn remove_child(&self, child_id: &str) -> Result<()>;

    /// Find the child linked from the given external account, if any
    async fn find_by_linked_account(&self, account_ref: &str) -> Result<Option<ChildProfile>>;
}

/// Persistence of approval requests
#[async_trait]
pub trait ApprovalStorage: Send + Sync {
    async fn store_approval(&self, approval: &PendingApproval) -> Result<()>;

    async fn get_approval(&self, approval_id: &str) -> Result<Option<PendingApproval>>;

    /// List approvals, newest first, optionally filtered by child and status
    async fn list_approvals(
        &self,
        child_id: Option<&str>,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PendingApproval>>;

    async fn update_approval(&self, approval: &PendingApproval) -> Result<()>;

    async fn remove_approval(&self, approval_id: &str) -> Result<()>;
}

/// Persistence of the single household record
#[async_trait]
pub trait HouseholdStorage: Send + Sync {
    async fn load_household(&self) -> Result<Option<Household>>;

    async fn save_household(&self, household: &Household) -> Result<()>;
}

/// Append-only activity journal
#[async_trait]
pub trait ActivityStorage: Send + Sync {
    /// Append events in order. Either all events are written or an error is returned.
    async fn append_events(&self, events: &[ActivityEvent]) -> Result<()>;

    /// All events in append order
    async fn list_events(&self) -> Result<Vec<ActivityEvent>>;
}

/// Journal of step-up verification attempts
#[async_trait]
pub trait StepUpAttemptStorage: Send + Sync {
    /// Record an attempt and return its id
    async fn record_attempt(
        &self,
        guardian_id: &str,
        method: &str,
        operation: &str,
        success: bool,
    ) -> Result<i64>;

    /// Attempts of one guardian, most recent first
    async fn get_attempts(&self, guardian_id: &str, limit: Option<u32>) -> Result<Vec<StepUpAttempt>>;

    /// Attempts of every guardian, most recent first
    async fn get_all_attempts(&self, limit: Option<u32>) -> Result<Vec<StepUpAttempt>>;
}
