/// The authenticated guardian on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorContext {
    pub guardian_id: String,
}

impl ActorContext {
    pub fn guardian(guardian_id: impl Into<String>) -> Self {
        Self {
            guardian_id: guardian_id.into(),
        }
    }
}
