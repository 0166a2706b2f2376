/// Task model
///
/// A task is a single document: collaborators, pending invites and the
/// activity log are embedded, so a mutation and the log entry describing it
/// are always persisted by one write.
///
/// # Lifecycle
///
/// Two independent axes:
///
/// ```text
/// status:      pending ⇄ in-progress ⇄ completed   (any value, any time)
/// visibility:  active ⇄ deleted → (purged)
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'in-progress', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     owner_id UUID NOT NULL REFERENCES users(id),
///     title TEXT NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     status task_status NOT NULL DEFAULT 'pending',
///     deadline TIMESTAMPTZ,
///     collaborators UUID[] NOT NULL DEFAULT '{}',
///     pending_invites JSONB NOT NULL DEFAULT '[]',
///     activity_log JSONB NOT NULL DEFAULT '[]',
///     important BOOLEAN NOT NULL DEFAULT FALSE,
///     deleted BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use tickup_shared::models::task::{NewTask, Task, TaskStatus};
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let task = Task::create(owner, NewTask::titled("Ship release"), Utc::now());
///
/// assert_eq!(task.status, TaskStatus::Pending);
/// assert_eq!(task.activity_log.len(), 1);
/// assert_eq!(task.activity_log[0].message, "Task created");
/// ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserSummary;

/// Activity messages written by the lifecycle operations
pub mod activity {
    pub const CREATED: &str = "Task created";
    pub const UPDATED: &str = "Task updated";
    pub const MOVED_TO_BIN: &str = "Task moved to recycle bin";
    pub const RESTORED: &str = "Task restored";
    pub const JOINED_VIA_LINK: &str = "Joined task via invite link";

    /// `Status changed to "<status>"`
    pub fn status_changed(status: super::TaskStatus) -> String {
        format!("Status changed to \"{}\"", status)
    }

    /// `Invite sent to <email>`
    pub fn invite_sent(email: &str) -> String {
        format!("Invite sent to {}", email)
    }
}

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("Invalid status: {}", other)),
        }
    }
}

/// An invite issued to an email with no account yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInvite {
    pub email: String,
    pub token: String,
}

/// One append-only audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// User who performed the action
    pub actor: Uuid,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// A task document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    /// Creator; immutable after creation
    pub owner: Uuid,

    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub deadline: Option<DateTime<Utc>>,

    /// Users with status-only rights, in join order, without duplicates
    pub collaborators: Vec<Uuid>,

    pub pending_invites: Vec<PendingInvite>,
    pub activity_log: Vec<ActivityEntry>,
    pub important: bool,

    /// Soft-delete flag; deleted tasks are only visible in the owner's recycle bin
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Creation input with only a title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Owner-side field update
///
/// `None` leaves a field untouched. `deadline: Some(None)` clears the deadline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub important: Option<bool>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self == &TaskChanges::default()
    }
}

impl Task {
    /// Builds a new active task with a single "Task created" log entry
    pub fn create(owner: Uuid, data: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            title: data.title.trim().to_string(),
            description: data.description.unwrap_or_default(),
            status: data.status.unwrap_or_default(),
            deadline: data.deadline,
            collaborators: Vec::new(),
            pending_invites: Vec::new(),
            activity_log: vec![ActivityEntry {
                actor: owner,
                message: activity::CREATED.to_string(),
                at: now,
            }],
            important: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends one activity entry and bumps `updated_at`
    pub fn record(&mut self, actor: Uuid, message: impl Into<String>, now: DateTime<Utc>) {
        self.activity_log.push(ActivityEntry {
            actor,
            message: message.into(),
            at: now,
        });
        self.updated_at = now;
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner == user_id
    }

    pub fn is_collaborator(&self, user_id: Uuid) -> bool {
        self.collaborators.contains(&user_id)
    }

    /// Owner or collaborator
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.is_owner(user_id) || self.is_collaborator(user_id)
    }

    /// Adds a collaborator unless already present; returns whether it was added
    pub fn add_collaborator(&mut self, user_id: Uuid) -> bool {
        if self.is_collaborator(user_id) {
            return false;
        }
        self.collaborators.push(user_id);
        true
    }

    pub fn has_pending_invite(&self, email: &str) -> bool {
        self.pending_invites.iter().any(|invite| invite.email == email)
    }

    /// Drops every pending invite addressed to `email`; returns how many were removed
    pub fn remove_invites_for(&mut self, email: &str) -> usize {
        let before = self.pending_invites.len();
        self.pending_invites.retain(|invite| invite.email != email);
        before - self.pending_invites.len()
    }

    /// Applies owner-side changes in place (no log entry)
    pub fn apply(&mut self, changes: TaskChanges) {
        if let Some(title) = changes.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(deadline) = changes.deadline {
            self.deadline = deadline;
        }
        if let Some(important) = changes.important {
            self.important = important;
        }
    }
}

/// Counts of a user's visible tasks by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
}

impl TaskStats {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut stats, task| {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            stats
        })
    }
}

/// Activity entry as shown on a single-task fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub user_id: Uuid,
    pub username: String,
    /// `"<username> — <message>"`
    pub message: String,
    pub at: DateTime<Utc>,
}

/// A task with collaborators and activity actors resolved for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub collaborators: Vec<UserSummary>,
    pub pending_invites: Vec<PendingInvite>,
    pub activity_log: Vec<ActivityView>,
    pub important: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parses a client-supplied deadline
///
/// Accepts RFC 3339 instants, naive `YYYY-MM-DDTHH:MM[:SS]` (read as UTC)
/// and plain `YYYY-MM-DD` dates (midnight UTC).
///
/// ```
/// use tickup_shared::models::task::parse_deadline;
///
/// assert!(parse_deadline("2026-03-01").is_some());
/// assert!(parse_deadline("2026-03-01T09:30:00Z").is_some());
/// assert!(parse_deadline("next tuesday").is_none());
/// ```
pub fn parse_deadline(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Some(instant.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
