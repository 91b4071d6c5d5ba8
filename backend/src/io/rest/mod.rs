//! # REST API Interface Layer
//!
//! One router per resource, nested under `/api` by
//! [`create_router`](crate::create_router):
//!
//! - `/step-up`: requirement prompts, password and one-time-code proofs, attempt history
//! - `/children`: profiles, policy patches, templates, consent, child actions
//! - `/approvals`: approval requests and guardian decisions
//! - `/household`: members, invitations, approval mode, primary guardian
//! - `/activity`, `/summary`: read-only views
//!
//! Guardian-facing routes read the acting guardian from the `x-guardian-id`
//! header. Guarded mutations also need the `x-step-up-proof` header.

pub mod approval_apis;
pub mod child_apis;
pub mod errors;
pub mod extractors;
pub mod household_apis;
pub mod mappers;
pub mod query_apis;
pub mod step_up_apis;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use errors::{ApiError, ApiResult};
pub use extractors::{Actor, StepUpProofId, GUARDIAN_ID_HEADER, STEP_UP_PROOF_HEADER};
