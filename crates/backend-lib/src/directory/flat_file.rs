//! Flat-file directory: the whole table in one JSON document.
use super::{DirectoryError, NewUserRecord, Table, UserDirectory, UserPatch, UserRecord};
use apishield_common::{Identity, UserId};
use async_trait::async_trait;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio::{fs as tokio_fs, io::AsyncWriteExt, sync::Mutex};

const USERS_FILE: &str = "users.json";

/// Flat-file implementation of the `UserDirectory` trait
///
/// Every mutation is applied to a copy of the table, written to
/// `users.json.tmp` and renamed over `users.json`; the in-memory table only
/// changes once the rename succeeded.
#[derive(Debug)]
pub struct FlatFileDirectory {
    path: PathBuf,
    table: Mutex<Table>,
}

impl FlatFileDirectory {
    /// Open (or create) the directory stored under `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, DirectoryError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join(USERS_FILE);

        let table = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Table::default()
        };

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    async fn persist(&self, table: &Table) -> Result<(), DirectoryError> {
        let json = serde_json::to_vec_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut file = tokio_fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `change` to a copy, persist it, then publish it
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Table) -> Result<T, DirectoryError>,
    ) -> Result<T, DirectoryError> {
        let mut guard = self.table.lock().await;
        let mut next = guard.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl UserDirectory for FlatFileDirectory {
    async fn list(&self) -> Result<Vec<Identity>, DirectoryError> {
        Ok(self.table.lock().await.identities())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, DirectoryError> {
        Ok(self.table.lock().await.get(id).map(UserRecord::identity))
    }

    async fn find_for_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.table.lock().await.find_for_login(username, email).cloned())
    }

    async fn create(&self, user: NewUserRecord) -> Result<Identity, DirectoryError> {
        self.mutate(|table| table.insert(user)).await
    }

    async fn update(&self, id: UserId, patch: UserPatch) -> Result<Identity, DirectoryError> {
        self.mutate(|table| table.update(id, patch)).await
    }

    async fn delete(&self, id: UserId) -> Result<(), DirectoryError> {
        self.mutate(|table| table.remove(id)).await
    }

    async fn is_empty(&self) -> Result<bool, DirectoryError> {
        Ok(self.table.lock().await.is_empty())
    }
}
