//! In-memory directory, for tests and throwaway instances.
use super::{DirectoryError, NewUserRecord, Table, UserDirectory, UserPatch, UserRecord};
use apishield_common::{Identity, UserId};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    table: RwLock<Table>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with fixed records; new ids continue after the largest one
    pub fn from_records(records: Vec<UserRecord>) -> Self {
        Self {
            table: RwLock::new(Table::from_records(records)),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn list(&self) -> Result<Vec<Identity>, DirectoryError> {
        Ok(self.table.read().await.identities())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, DirectoryError> {
        Ok(self.table.read().await.get(id).map(UserRecord::identity))
    }

    async fn find_for_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.table.read().await.find_for_login(username, email).cloned())
    }

    async fn create(&self, user: NewUserRecord) -> Result<Identity, DirectoryError> {
        self.table.write().await.insert(user)
    }

    async fn update(&self, id: UserId, patch: UserPatch) -> Result<Identity, DirectoryError> {
        self.table.write().await.update(id, patch)
    }

    async fn delete(&self, id: UserId) -> Result<(), DirectoryError> {
        self.table.write().await.remove(id)
    }

    async fn is_empty(&self) -> Result<bool, DirectoryError> {
        Ok(self.table.read().await.is_empty())
    }
}
