use log::{debug, error};
use shared::{ActivityEvent, ActivityKind, Severity};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::commands::activity::{ActivityQuery, AuditNote};
use crate::domain::errors::GuardianResult;
use crate::storage::ActivityStorage;

/// Default page size of activity listings
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

/// Append-only audit journal of everything the engine changes
#[derive(Clone)]
pub struct ActivityService {
    storage: Arc<dyn ActivityStorage>,
    clock: Arc<dyn Clock>,
}

impl ActivityService {
    pub fn new(storage: Arc<dyn ActivityStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Build an event stamped with the engine clock
    pub fn event(
        &self,
        child_id: Option<&str>,
        kind: ActivityKind,
        severity: Severity,
        summary: impl Into<String>,
    ) -> ActivityEvent {
        ActivityEvent {
            id: format!("event::{}", Uuid::new_v4().simple()),
            at: self.clock.now(),
            child_id: child_id.map(str::to_string),
            kind,
            summary: summary.into(),
            severity,
        }
    }

    pub fn event_from_note(&self, child_id: Option<&str>, note: AuditNote) -> ActivityEvent {
        self.event(child_id, note.kind, note.severity, note.summary)
    }

    /// Append `events` in order
    pub async fn record(&self, events: &[ActivityEvent]) -> GuardianResult<()> {
        if let Err(e) = self.storage.append_events(events).await {
            error!("Failed to append {} activity event(s): {}", events.len(), e);
            return Err(e.into());
        }
        for event in events {
            debug!("Activity [{}] {}: {}", event.severity.as_str(), event.kind, event.summary);
        }
        Ok(())
    }

    /// Events newest first, optionally for one child only
    pub async fn list(&self, query: ActivityQuery) -> GuardianResult<Vec<ActivityEvent>> {
        let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        let events = self
            .storage
            .list_events()
            .await?
            .into_iter()
            .rev()
            .filter(|e| match &query.child_id {
                Some(child_id) => e.child_id.as_deref() == Some(child_id.as_str()),
                None => true,
            })
            .take(limit)
            .collect();
        Ok(events)
    }

    pub async fn count_kind(&self, kind: ActivityKind) -> GuardianResult<usize> {
        Ok(self
            .storage
            .list_events()
            .await?
            .iter()
            .filter(|e| e.kind == kind)
            .count())
    }
}
