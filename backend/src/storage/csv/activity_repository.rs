//! # CSV Activity Repository
//!
//! Append-only journal of [`ActivityEvent`]s in `activity.csv`:
//!
//! ```csv
//! id,at,child_id,kind,summary,severity
//! event::9f..,2026-03-01T08:00:00Z,child::1a..,Template Applied,Applied Teen (13-17),info
//! event::c4..,2026-03-01T08:05:00Z,,Household Updated,Invited Alex,info
//! ```
//!
//! Household-scope events leave `child_id` empty. Rows are never rewritten.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use log::debug;
use serde::{Deserialize, Serialize};
use shared::ActivityEvent;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::connection::CsvConnection;
use crate::storage::traits::ActivityStorage;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActivityRecord {
    id: String,
    at: String,
    child_id: String,
    kind: String,
    summary: String,
    severity: String,
}

impl From<&ActivityEvent> for ActivityRecord {
    fn from(event: &ActivityEvent) -> Self {
        ActivityRecord {
            id: event.id.clone(),
            at: event.at.to_rfc3339(),
            child_id: event.child_id.clone().unwrap_or_default(),
            kind: event.kind.as_str().to_string(),
            summary: event.summary.clone(),
            severity: event.severity.as_str().to_string(),
        }
    }
}

impl TryFrom<ActivityRecord> for ActivityEvent {
    type Error = anyhow::Error;

    fn try_from(record: ActivityRecord) -> Result<Self> {
        let at = DateTime::parse_from_rfc3339(&record.at)
            .with_context(|| format!("bad timestamp on event {}", record.id))?
            .with_timezone(&Utc);
        Ok(ActivityEvent {
            at,
            child_id: if record.child_id.is_empty() { None } else { Some(record.child_id) },
            kind: record.kind.parse().map_err(anyhow::Error::msg)?,
            severity: record.severity.parse().map_err(anyhow::Error::msg)?,
            summary: record.summary,
            id: record.id,
        })
    }
}

#[derive(Clone)]
pub struct ActivityRepository {
    connection: CsvConnection,
    /// Serializes appends and reads of the journal file
    file_lock: Arc<Mutex<()>>,
}

impl ActivityRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            connection,
            file_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl ActivityStorage for ActivityRepository {
    async fn append_events(&self, events: &[ActivityEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let _guard = self.file_lock.lock().await;

        let path = self.connection.activity_path();
        let file_exists = path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(BufWriter::new(file));

        for event in events {
            writer.serialize(ActivityRecord::from(event))?;
        }
        writer.flush()?;

        debug!("Appended {} activity event(s) to {:?}", events.len(), path);
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<ActivityEvent>> {
        let _guard = self.file_lock.lock().await;

        let path = self.connection.activity_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new().from_reader(File::open(&path)?);
        let mut events = Vec::new();
        for result in reader.deserialize::<ActivityRecord>() {
            events.push(ActivityEvent::try_from(result?)?);
        }
        Ok(events)
    }
}
