use anyhow::Result;
use async_trait::async_trait;
use shared::Household;

use super::connection::CsvConnection;
use crate::storage::traits::HouseholdStorage;

/// Stores the household as a single `household.yaml`
#[derive(Clone)]
pub struct HouseholdRepository {
    connection: CsvConnection,
}

impl HouseholdRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl HouseholdStorage for HouseholdRepository {
    async fn load_household(&self) -> Result<Option<Household>> {
        self.connection.read_yaml(&self.connection.household_path())
    }

    async fn save_household(&self, household: &Household) -> Result<()> {
        self.connection
            .write_yaml_atomic(&self.connection.household_path(), household)
    }
}
