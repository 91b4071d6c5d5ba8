//! # Storage Layer
//!
//! Trait definitions the domain depends on, plus the file-backed
//! implementations used by the server.

pub mod csv;
pub mod traits;

pub use traits::{ActivityStorage, ApprovalStorage, ChildStorage, HouseholdStorage, StepUpAttemptStorage};
