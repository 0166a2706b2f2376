//! Process-local store
//!
//! Keeps users and tasks in insertion order behind async mutexes. Used by the
//! test suites and by `STORE=memory` development runs. Data is lost when the
//! process exits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StoreError, TaskScope, TaskStore, UniqueField, UserStore};
use crate::models::task::Task;
use crate::models::user::{NewUser, User, UserSummary};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    tasks: Mutex<Vec<Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks, deleted ones included
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;

        if users.iter().any(|u| u.email == data.email) {
            return Err(StoreError::Conflict(UniqueField::Email));
        }
        if users.iter().any(|u| u.username == data.username) {
            return Err(StoreError::Conflict(UniqueField::Username));
        }

        let user = User::from_new(data, now);
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_username(
        &self,
        id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;

        if users.iter().any(|u| u.username == username && u.id != id) {
            return Err(StoreError::Conflict(UniqueField::Username));
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.username = username.to_string();
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = now;
        Ok(())
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        let users = self.users.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| users.iter().find(|u| u.id == *id))
            .map(User::summary)
            .collect())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.lock().await.push(task.clone());
        Ok(())
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.lock().await.iter().find(|t| t.id == id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().await;
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or(StoreError::NotFound)?;
        *slot = task.clone();
        Ok(())
    }

    async fn list_tasks(&self, user_id: Uuid, scope: TaskScope) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| scope.admits(t, user_id))
            .cloned()
            .collect())
    }

    async fn purge_deleted(&self, owner: Uuid) -> Result<u64, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| !(t.deleted && t.owner == owner));
        Ok((before - tasks.len()) as u64)
    }

    async fn tasks_with_pending_invite(&self, email: &str) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.has_pending_invite(email))
            .cloned()
            .collect())
    }

    async fn invite_token_exists(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .any(|t| t.pending_invites.iter().any(|i| i.token == token)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
