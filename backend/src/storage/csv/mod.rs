//! File-backed storage: YAML documents for mutable records, CSV for
//! append-only journals.

pub mod activity_repository;
pub mod approval_repository;
pub mod child_repository;
pub mod connection;
pub mod household_repository;
pub mod step_up_attempt_repository;

#[cfg(test)]
pub mod test_utils;

pub use activity_repository::ActivityRepository;
pub use approval_repository::ApprovalRepository;
pub use child_repository::ChildRepository;
pub use connection::CsvConnection;
pub use household_repository::HouseholdRepository;
pub use step_up_attempt_repository::StepUpAttemptRepository;
