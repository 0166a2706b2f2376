/// Persistence seams
///
/// The service layer talks to storage only through [`UserStore`] and
/// [`TaskStore`]. Two implementations ship with the crate:
///
/// - [`postgres::PgStore`]: the production store (sqlx, PostgreSQL)
/// - [`memory::MemoryStore`]: a process-local store for tests and
///   database-less development runs
///
/// Both implement both traits, so a single value can back every seam.
///
/// # Consistency
///
/// A task is always written whole. Each mutation and its activity-log entry
/// therefore land together or not at all. There is no cross-entity
/// transaction: a user write followed by task writes (signup attaching
/// pending invites) may be partially applied if the process dies midway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::models::task::Task;
use crate::models::user::{NewUser, User, UserSummary};

pub mod memory;
pub mod postgres;

/// Columns with a uniqueness rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Username => f.write_str("username"),
        }
    }
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule would be violated
    #[error("Duplicate {0}")]
    Conflict(UniqueField),

    /// The record to update does not exist
    #[error("Record not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which slice of a user's tasks to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Non-deleted tasks the user owns or collaborates on
    Active,

    /// `Active` tasks flagged important
    Important,

    /// Deleted tasks the user owns (collaborators never see these)
    RecycleBin,
}

impl TaskScope {
    /// Whether `task` belongs in this scope for `user_id`
    pub fn admits(&self, task: &Task, user_id: Uuid) -> bool {
        match self {
            TaskScope::Active => !task.deleted && task.is_member(user_id),
            TaskScope::Important => !task.deleted && task.important && task.is_member(user_id),
            TaskScope::RecycleBin => task.deleted && task.is_owner(user_id),
        }
    }
}

/// Account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user, stamped at `now`
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` if the email or username is taken.
    async fn create_user(&self, data: NewUser, now: DateTime<Utc>) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Looks up by normalized email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Renames a user
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` if another user holds the name,
    /// `StoreError::NotFound` if the user does not exist.
    async fn update_username(
        &self,
        id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    /// Replaces the stored password hash
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Public projections for a set of ids; unknown ids are skipped
    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError>;
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Fetches a task regardless of visibility
    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Overwrites a stored task with `task`
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the task was purged in the meantime.
    async fn save_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Tasks in `scope` for `user_id`, oldest first
    async fn list_tasks(&self, user_id: Uuid, scope: TaskScope) -> Result<Vec<Task>, StoreError>;

    /// Hard-deletes every deleted task owned by `owner`; returns how many
    async fn purge_deleted(&self, owner: Uuid) -> Result<u64, StoreError>;

    /// Tasks carrying a pending invite for `email`
    async fn tasks_with_pending_invite(&self, email: &str) -> Result<Vec<Task>, StoreError>;

    /// Whether any task holds a pending invite with this token
    async fn invite_token_exists(&self, token: &str) -> Result<bool, StoreError>;

    /// Connectivity probe used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;
}
