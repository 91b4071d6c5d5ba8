//! # CSV Step-Up Attempt Repository
//!
//! Every password or one-time-code verification is journaled to
//! `step_up_attempts.csv`:
//!
//! ```csv
//! id,guardian_id,method,operation,success,timestamp
//! 1,guardian::primary,password,Apply policy template (Child child::1a..),false,2026-03-01T08:00:00+00:00
//! 2,guardian::primary,challenge:SMS,Apply policy template (Child child::1a..),true,2026-03-01T08:01:00+00:00
//! ```
//!
//! Ids auto-increment; the most recent attempts are returned first.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use csv::{Reader, Writer};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared::StepUpAttempt;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::connection::CsvConnection;
use crate::storage::traits::StepUpAttemptStorage;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepUpAttemptRecord {
    id: i64,
    guardian_id: String,
    method: String,
    operation: String,
    success: bool,
    timestamp: String,
}

impl From<StepUpAttemptRecord> for StepUpAttempt {
    fn from(record: StepUpAttemptRecord) -> Self {
        StepUpAttempt {
            id: record.id,
            guardian_id: record.guardian_id,
            method: record.method,
            operation: record.operation,
            success: record.success,
            timestamp: record.timestamp,
        }
    }
}

#[derive(Clone)]
pub struct StepUpAttemptRepository {
    connection: CsvConnection,
    file_lock: Arc<Mutex<()>>,
}

impl StepUpAttemptRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            connection,
            file_lock: Arc::new(Mutex::new(())),
        }
    }

    fn read_records(&self) -> Result<Vec<StepUpAttemptRecord>> {
        let csv_path = self.connection.step_up_attempts_path();
        if !csv_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = Reader::from_reader(BufReader::new(File::open(&csv_path)?));
        let mut records = Vec::new();
        for result in reader.deserialize() {
            records.push(result?);
        }
        Ok(records)
    }

    fn next_id(records: &[StepUpAttemptRecord]) -> i64 {
        records.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    fn append(&self, record: &StepUpAttemptRecord) -> Result<()> {
        let csv_path = self.connection.step_up_attempts_path();
        let file_exists = csv_path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&csv_path)?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        if !file_exists {
            csv_writer.write_record(["id", "guardian_id", "method", "operation", "success", "timestamp"])?;
        }
        let id = record.id.to_string();
        let success = record.success.to_string();
        csv_writer.write_record([
            id.as_str(),
            record.guardian_id.as_str(),
            record.method.as_str(),
            record.operation.as_str(),
            success.as_str(),
            record.timestamp.as_str(),
        ])?;
        csv_writer.flush()?;

        debug!("Appended step-up attempt to {:?}: ID {}", csv_path, record.id);
        Ok(())
    }

    fn newest_first(mut attempts: Vec<StepUpAttempt>, limit: Option<u32>) -> Vec<StepUpAttempt> {
        attempts.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(l) = limit {
            attempts.truncate(l as usize);
        }
        attempts
    }
}

#[async_trait]
impl StepUpAttemptStorage for StepUpAttemptRepository {
    async fn record_attempt(
        &self,
        guardian_id: &str,
        method: &str,
        operation: &str,
        success: bool,
    ) -> Result<i64> {
        info!(
            "Recording step-up attempt for guardian '{}' via {}: success={}",
            guardian_id, method, success
        );
        let _guard = self.file_lock.lock().await;

        let next_id = Self::next_id(&self.read_records()?);
        let record = StepUpAttemptRecord {
            id: next_id,
            guardian_id: guardian_id.to_string(),
            method: method.to_string(),
            operation: operation.to_string(),
            success,
            timestamp: Utc::now().to_rfc3339(),
        };
        self.append(&record)?;
        Ok(next_id)
    }

    async fn get_attempts(&self, guardian_id: &str, limit: Option<u32>) -> Result<Vec<StepUpAttempt>> {
        let _guard = self.file_lock.lock().await;
        let attempts = self
            .read_records()?
            .into_iter()
            .filter(|r| r.guardian_id == guardian_id)
            .map(StepUpAttempt::from)
            .collect();
        Ok(Self::newest_first(attempts, limit))
    }

    async fn get_all_attempts(&self, limit: Option<u32>) -> Result<Vec<StepUpAttempt>> {
        let _guard = self.file_lock.lock().await;
        let attempts = self.read_records()?.into_iter().map(StepUpAttempt::from).collect();
        Ok(Self::newest_first(attempts, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csv::test_utils::TestEnvironment;

    #[tokio::test]
    async fn test_record_and_get_attempts() {
        let env = TestEnvironment::new().await.unwrap();
        let repo = StepUpAttemptRepository::new(env.connection.clone());

        let first = repo.record_attempt("guardian::a", "password", "Apply policy template", false).await.unwrap();
        let second = repo.record_attempt("guardian::a", "password", "Apply policy template", true).await.unwrap();
        assert_eq!((first, second), (1, 2));

        let attempts = repo.get_attempts("guardian::a", None).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].success);
        assert!(!attempts[1].success);
    }

    #[tokio::test]
    async fn test_limit_and_guardian_filter() {
        let env = TestEnvironment::new().await.unwrap();
        let repo = StepUpAttemptRepository::new(env.connection.clone());

        for i in 0..5 {
            repo.record_attempt("guardian::a", &format!("method {}", i), "op", i % 2 == 0)
                .await
                .unwrap();
        }
        repo.record_attempt("guardian::b", "challenge:SMS", "op", true).await.unwrap();

        let limited = repo.get_attempts("guardian::a", Some(3)).await.unwrap();
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].method, "method 4");

        let all = repo.get_all_attempts(None).await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].guardian_id, "guardian::b");
    }

    #[tokio::test]
    async fn test_unknown_guardian_has_no_attempts() {
        let env = TestEnvironment::new().await.unwrap();
        let repo = StepUpAttemptRepository::new(env.connection.clone());
        assert!(repo.get_attempts("guardian::nobody", None).await.unwrap().is_empty());
    }
}
