/// PostgreSQL store
///
/// Tasks are one row each, with collaborators in a `UUID[]` column and the
/// pending invites and activity log in JSONB columns. Saving a task rewrites
/// the whole row in a single `UPDATE`.
///
/// # Example
///
/// ```no_run
/// use tickup_shared::db::pool::{create_pool, DatabaseConfig};
/// use tickup_shared::store::postgres::PgStore;
/// use tickup_shared::store::{TaskScope, TaskStore};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let store = PgStore::new(pool);
///
/// let tasks = store.list_tasks(Uuid::new_v4(), TaskScope::Active).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::{StoreError, TaskScope, TaskStore, UniqueField, UserStore};
use crate::models::task::{ActivityEntry, PendingInvite, Task, TaskStatus};
use crate::models::user::{NewUser, User, UserSummary};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";

const TASK_COLUMNS: &str = "id, owner_id, title, description, status, deadline, collaborators, \
     pending_invites, activity_log, important, deleted, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: String,
    status: TaskStatus,
    deadline: Option<DateTime<Utc>>,
    collaborators: Vec<Uuid>,
    pending_invites: Json<Vec<PendingInvite>>,
    activity_log: Json<Vec<ActivityEntry>>,
    important: bool,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            owner: row.owner_id,
            title: row.title,
            description: row.description,
            status: row.status,
            deadline: row.deadline,
            collaborators: row.collaborators,
            pending_invites: row.pending_invites.0,
            activity_log: row.activity_log.0,
            important: row.important,
            deleted: row.deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Maps unique-constraint violations on `users` to `StoreError::Conflict`
fn map_user_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("users_email_key") => return StoreError::Conflict(UniqueField::Email),
            Some("users_username_key") => return StoreError::Conflict(UniqueField::Username),
            _ => {}
        }
    }
    error!(error = %e, "User write failed");
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let user = User::from_new(data, now);

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_user_write_error)?;

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_username(
        &self,
        id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users SET username = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(username)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_write_error)?
            .ok_or(StoreError::NotFound)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, email FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .iter()
            .filter_map(|id| rows.iter().find(|row| row.id == *id).cloned())
            .collect())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tasks (id, owner_id, title, description, status, deadline, collaborators,
                                pending_invites, activity_log, important, deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(task.id)
        .bind(task.owner)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.deadline)
        .bind(task.collaborators.as_slice())
        .bind(Json(&task.pending_invites))
        .bind(Json(&task.activity_log))
        .bind(task.important)
        .bind(task.deleted)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let query = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Task::from))
    }

    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tasks
             SET title = $2, description = $3, status = $4, deadline = $5, collaborators = $6,
                 pending_invites = $7, activity_log = $8, important = $9, deleted = $10,
                 updated_at = $11
             WHERE id = $1",
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.deadline)
        .bind(task.collaborators.as_slice())
        .bind(Json(&task.pending_invites))
        .bind(Json(&task.activity_log))
        .bind(task.important)
        .bind(task.deleted)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_tasks(&self, user_id: Uuid, scope: TaskScope) -> Result<Vec<Task>, StoreError> {
        let filter = match scope {
            TaskScope::Active => "deleted = FALSE AND (owner_id = $1 OR $1 = ANY(collaborators))",
            TaskScope::Important => {
                "deleted = FALSE AND important = TRUE AND (owner_id = $1 OR $1 = ANY(collaborators))"
            }
            TaskScope::RecycleBin => "deleted = TRUE AND owner_id = $1",
        };
        let query = format!(
            "SELECT {} FROM tasks WHERE {} ORDER BY created_at ASC, id ASC",
            TASK_COLUMNS, filter
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn purge_deleted(&self, owner: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE owner_id = $1 AND deleted = TRUE")
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn tasks_with_pending_invite(&self, email: &str) -> Result<Vec<Task>, StoreError> {
        let query = format!(
            "SELECT {} FROM tasks
             WHERE pending_invites @> jsonb_build_array(jsonb_build_object('email', $1::text))
             ORDER BY created_at ASC, id ASC",
            TASK_COLUMNS
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn invite_token_exists(&self, token: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM tasks
                WHERE pending_invites @> jsonb_build_array(jsonb_build_object('token', $1::text))
            )",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}
