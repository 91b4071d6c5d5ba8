//! YAML-backed child profile repository. One file per child under
//! `children/`, each replaced atomically on write.

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use shared::ChildProfile;
use std::fs;
use std::path::PathBuf;

use super::connection::CsvConnection;
use crate::storage::traits::ChildStorage;

#[derive(Clone)]
pub struct ChildRepository {
    connection: CsvConnection,
}

impl ChildRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn child_path(&self, child_id: &str) -> PathBuf {
        self.connection
            .children_directory()
            .join(CsvConnection::entity_file_name(child_id))
    }

    fn discover_children(&self) -> Result<Vec<ChildProfile>> {
        let directory = self.connection.children_directory();
        let mut children = Vec::new();
        if !directory.exists() {
            return Ok(children);
        }

        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            match self.connection.read_yaml::<ChildProfile>(&path) {
                Ok(Some(child)) => children.push(child),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable child file {}: {}", path.display(), e),
            }
        }

        children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }
}

#[async_trait]
impl ChildStorage for ChildRepository {
    async fn store_child(&self, child: &ChildProfile) -> Result<()> {
        let path = self.child_path(&child.id);
        if path.exists() {
            return Err(anyhow::anyhow!("Child {} already exists", child.id));
        }
        self.connection.write_yaml_atomic(&path, child)?;
        info!("Stored child {} ({})", child.id, child.name);
        Ok(())
    }

    async fn get_child(&self, child_id: &str) -> Result<Option<ChildProfile>> {
        // distinct ids can share a file name; only the exact id matches
        let child: Option<ChildProfile> = self.connection.read_yaml(&self.child_path(child_id))?;
        Ok(child.filter(|c| c.id == child_id))
    }

    async fn list_children(&self) -> Result<Vec<ChildProfile>> {
        self.discover_children()
    }

    async fn update_child(&self, child: &ChildProfile) -> Result<()> {
        let path = self.child_path(&child.id);
        if !path.exists() {
            return Err(anyhow::anyhow!("Child {} does not exist", child.id));
        }
        self.connection.write_yaml_atomic(&path, child)
    }

    async fn remove_child(&self, child_id: &str) -> Result<()> {
        let path = self.child_path(child_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Removed child {}", child_id);
        }
        Ok(())
    }

    async fn find_by_linked_account(&self, account_ref: &str) -> Result<Option<ChildProfile>> {
        Ok(self
            .discover_children()?
            .into_iter()
            .find(|child| child.linked_account.as_deref() == Some(account_ref)))
    }
}
