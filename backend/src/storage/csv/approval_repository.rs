//! YAML-backed approval repository, one file per request under `approvals/`.

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use shared::{ApprovalStatus, PendingApproval};
use std::fs;
use std::path::PathBuf;

use super::connection::CsvConnection;
use crate::storage::traits::ApprovalStorage;

#[derive(Clone)]
pub struct ApprovalRepository {
    connection: CsvConnection,
}

impl ApprovalRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn approval_path(&self, approval_id: &str) -> PathBuf {
        self.connection
            .approvals_directory()
            .join(CsvConnection::entity_file_name(approval_id))
    }

    fn load_all(&self) -> Result<Vec<PendingApproval>> {
        let directory = self.connection.approvals_directory();
        let mut approvals = Vec::new();
        if !directory.exists() {
            return Ok(approvals);
        }
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            match self.connection.read_yaml::<PendingApproval>(&path) {
                Ok(Some(approval)) => approvals.push(approval),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable approval file {}: {}", path.display(), e),
            }
        }
        Ok(approvals)
    }
}

#[async_trait]
impl ApprovalStorage for ApprovalRepository {
    async fn store_approval(&self, approval: &PendingApproval) -> Result<()> {
        let path = self.approval_path(&approval.id);
        if path.exists() {
            return Err(anyhow::anyhow!("Approval {} already exists", approval.id));
        }
        self.connection.write_yaml_atomic(&path, approval)?;
        info!("Stored approval {} for child {}", approval.id, approval.child_id);
        Ok(())
    }

    async fn get_approval(&self, approval_id: &str) -> Result<Option<PendingApproval>> {
        let approval: Option<PendingApproval> = self.connection.read_yaml(&self.approval_path(approval_id))?;
        Ok(approval.filter(|a| a.id == approval_id))
    }

    async fn list_approvals(
        &self,
        child_id: Option<&str>,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PendingApproval>> {
        let mut approvals: Vec<PendingApproval> = self
            .load_all()?
            .into_iter()
            .filter(|a| child_id.map_or(true, |id| a.child_id == id))
            .filter(|a| status.map_or(true, |s| a.status == s))
            .collect();
        approvals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(approvals)
    }

    async fn update_approval(&self, approval: &PendingApproval) -> Result<()> {
        let path = self.approval_path(&approval.id);
        if !path.exists() {
            return Err(anyhow::anyhow!("Approval {} does not exist", approval.id));
        }
        self.connection.write_yaml_atomic(&path, approval)
    }

    async fn remove_approval(&self, approval_id: &str) -> Result<()> {
        let path = self.approval_path(approval_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::sample_approval;
    use crate::storage::csv::test_utils::TestEnvironment;
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let env = TestEnvironment::new().await.unwrap();
        let repo = ApprovalRepository::new(env.connection.clone());

        let older = sample_approval("approval::older", "child::a");
        let mut newer = sample_approval("approval::newer", "child::a");
        newer.created_at = older.created_at + Duration::minutes(5);
        let mut other = sample_approval("approval::other", "child::b");
        other.status = ApprovalStatus::Declined;

        for approval in [&older, &newer, &other] {
            repo.store_approval(approval).await.unwrap();
        }

        let for_a = repo.list_approvals(Some("child::a"), None).await.unwrap();
        let ids: Vec<&str> = for_a.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["approval::newer", "approval::older"]);

        let pending = repo.list_approvals(None, Some(ApprovalStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_get_approval_requires_exact_id() {
        let env = TestEnvironment::new().await.unwrap();
        let repo = ApprovalRepository::new(env.connection.clone());
        repo.store_approval(&sample_approval("approval::x1", "child::a")).await.unwrap();

        assert!(repo.get_approval("approval_x1").await.unwrap().is_none());
        assert!(repo.get_approval("approval::x1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let env = TestEnvironment::new().await.unwrap();
        let repo = ApprovalRepository::new(env.connection.clone());

        let mut approval = sample_approval("approval::1", "child::a");
        repo.store_approval(&approval).await.unwrap();
        approval.status = ApprovalStatus::Approved;
        repo.update_approval(&approval).await.unwrap();
        assert_eq!(
            repo.get_approval("approval::1").await.unwrap().unwrap().status,
            ApprovalStatus::Approved
        );

        repo.remove_approval("approval::1").await.unwrap();
        assert!(repo.get_approval("approval::1").await.unwrap().is_none());
    }
}
