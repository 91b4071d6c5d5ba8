//! # Domain Module
//!
//! Business rules of the guardianship engine: supervised child profiles and
//! their policies, approval requests and guardian decisions, household
//! membership, and the step-up gate every sensitive mutation passes through.
//!
//! ## Module Organization
//!
//! - **child_service**: Child creation, linking, policy patches, templates and consent
//! - **approval_service**: Approval requests, child action evaluation and quorum voting
//! - **household_service**: Co-guardians, emergency contacts and approval mode
//! - **step_up_service**: Password and one-time-code re-authentication with single-use proofs
//! - **activity_service**: Append-only audit journal
//! - **query_service**: Summary counters and per-child overviews
//! - **policy_template** / **policy_evaluation**: Pure policy rules
//!
//! ## Business Rules
//!
//! - Every committed mutation bumps the record version and appends audit events
//! - A policy mutation is rejected when the caller's expected version is stale
//! - Charging can only be enabled while the charging app is allowed
//! - The primary guardian and the last emergency contact are protected from removal

pub mod activity_service;
pub mod approval_service;
pub mod child_service;
pub mod clock;
pub mod commands;
pub mod errors;
pub mod household_service;
pub mod identity;
pub mod locks;
pub mod models;
pub mod policy_evaluation;
pub mod policy_template;
pub mod query_service;
pub mod step_up_service;

#[cfg(test)]
pub mod test_support;


pub use activity_service::ActivityService;
pub use approval_service::ApprovalService;
pub use child_service::ChildService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{GuardianError, GuardianResult};
pub use household_service::{HouseholdService, PrimaryGuardian};
pub use identity::{IdentityProvider, LocalIdentityProvider, NotificationDispatcher, OutboxDispatcher};
pub use query_service::QueryService;
pub use step_up_service::{StepUpService, StepUpSettings};
