//! Error taxonomy of the guardianship engine.
//!
//! Storage code keeps returning `anyhow::Result`; everything the domain layer
//! hands back to callers is a [`GuardianError`] so the io layer can map each
//! kind to a precise response.

/// Result alias used by every domain service
pub type GuardianResult<T> = std::result::Result<T, GuardianError>;

#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("A challenge was sent recently on this channel; retry in {retry_after_secs}s")]
    ChallengeCooldown { retry_after_secs: i64 },

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Approval {0} has already been decided")]
    AlreadyDecided(String),

    #[error("Guardian {guardian_id} already voted on approval {approval_id}")]
    AlreadyVoted { approval_id: String, guardian_id: String },

    #[error("Stale version for {id}: expected {expected}, current is {actual}")]
    StaleVersion { id: String, expected: u64, actual: u64 },

    #[error("Safety invariant violated: {0}")]
    SafetyInvariantViolation(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("External service failed: {0}")]
    ExternalService(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl GuardianError {
    pub fn validation(message: impl Into<String>) -> Self {
        GuardianError::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        GuardianError::AuthenticationFailed(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        GuardianError::NotFound { entity, id: id.into() }
    }

    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            GuardianError::Validation(_) => "VALIDATION_ERROR",
            GuardianError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            GuardianError::ChallengeCooldown { .. } => "CHALLENGE_COOLDOWN",
            GuardianError::Forbidden(_) => "FORBIDDEN",
            GuardianError::NotFound { .. } => "NOT_FOUND",
            GuardianError::AlreadyDecided(_) => "ALREADY_DECIDED",
            GuardianError::AlreadyVoted { .. } => "ALREADY_VOTED",
            GuardianError::StaleVersion { .. } => "STALE_VERSION",
            GuardianError::SafetyInvariantViolation(_) => "SAFETY_INVARIANT_VIOLATION",
            GuardianError::Timeout(_) => "TIMEOUT",
            GuardianError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            GuardianError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
