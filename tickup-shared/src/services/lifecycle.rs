/// Task Lifecycle Engine
///
/// Owns every task mutation except invitations. Each mutating operation
/// appends exactly one activity entry and persists the task in one write:
///
/// | Operation         | Who                    | Activity entry                |
/// |-------------------|------------------------|-------------------------------|
/// | `create`          | any user               | `Task created`                |
/// | `update_fields`   | owner                  | `Task updated`                |
/// | `set_status`      | owner or collaborator  | `Status changed to "<s>"`     |
/// | `soft_delete`     | owner                  | `Task moved to recycle bin`   |
/// | `restore`         | owner                  | `Task restored`               |
/// | `restore_all`     | owner                  | `Task restored` (per task)    |
/// | `empty_recycle_bin` | owner                | none (tasks are gone)         |
///
/// Reads only return tasks the actor owns or collaborates on. Deleted tasks
/// appear only in the owner's recycle bin views.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::authorization::{require, TaskAction};
use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::models::task::{
    activity, ActivityView, NewTask, Task, TaskChanges, TaskDetail, TaskStats, TaskStatus,
};
use crate::models::user::UserSummary;
use crate::store::{TaskScope, TaskStore, UserStore};

/// Shown for activity actors whose account cannot be found
pub const UNKNOWN_ACTOR: &str = "Unknown";

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
}

fn require_title(title: &str) -> ServiceResult<()> {
    if title.trim().is_empty() {
        return Err(ServiceError::validation("Task title is required"));
    }
    Ok(())
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, users: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, users, clock }
    }

    /// Loads a task the actor owns; anything else reads as not found
    async fn owned(&self, task_id: Uuid, actor: Uuid) -> ServiceResult<Task> {
        match self.tasks.find_task(task_id).await? {
            Some(task) if task.is_owner(actor) => Ok(task),
            _ => Err(ServiceError::task_not_found()),
        }
    }

    /// Loads a non-deleted task, whoever it belongs to
    async fn active(&self, task_id: Uuid) -> ServiceResult<Task> {
        match self.tasks.find_task(task_id).await? {
            Some(task) if !task.deleted => Ok(task),
            _ => Err(ServiceError::task_not_found()),
        }
    }

    /// Creates a task owned by `actor`
    ///
    /// # Errors
    ///
    /// `ServiceError::Validation` if the title is blank
    pub async fn create(&self, actor: Uuid, data: NewTask) -> ServiceResult<Task> {
        require_title(&data.title)?;

        let task = Task::create(actor, data, self.clock.now());
        self.tasks.insert_task(&task).await?;

        info!(task_id = %task.id, owner = %actor, "Task created");
        Ok(task)
    }

    /// Applies owner-side field changes
    ///
    /// # Errors
    ///
    /// - `ServiceError::NotFound` unless `actor` owns the active task
    /// - `ServiceError::Validation` if a blank title is supplied
    pub async fn update_fields(
        &self,
        task_id: Uuid,
        actor: Uuid,
        changes: TaskChanges,
    ) -> ServiceResult<Task> {
        if let Some(title) = &changes.title {
            require_title(title)?;
        }

        let mut task = self.owned(task_id, actor).await?;
        if task.deleted {
            return Err(ServiceError::task_not_found());
        }

        task.apply(changes);
        task.record(actor, activity::UPDATED, self.clock.now());
        self.tasks.save_task(&task).await?;

        info!(task_id = %task_id, actor = %actor, "Task updated");
        Ok(task)
    }

    /// Flips the owner-only important flag
    pub async fn toggle_important(
        &self,
        task_id: Uuid,
        actor: Uuid,
        important: bool,
    ) -> ServiceResult<Task> {
        self.update_fields(
            task_id,
            actor,
            TaskChanges {
                important: Some(important),
                ..Default::default()
            },
        )
        .await
    }

    /// Sets the workflow status
    ///
    /// The one mutation collaborators may perform. Owners may use it too.
    ///
    /// # Errors
    ///
    /// - `ServiceError::NotFound` if the task is missing or deleted
    /// - `ServiceError::Authorization` if the actor is neither owner nor collaborator
    pub async fn set_status(
        &self,
        task_id: Uuid,
        actor: Uuid,
        status: TaskStatus,
    ) -> ServiceResult<Task> {
        let mut task = self.active(task_id).await?;
        require(&task, actor, TaskAction::SetStatus)?;

        task.status = status;
        task.record(actor, activity::status_changed(status), self.clock.now());
        self.tasks.save_task(&task).await?;

        info!(task_id = %task_id, actor = %actor, status = %status, "Task status changed");
        Ok(task)
    }

    /// Moves an active task to the owner's recycle bin
    pub async fn soft_delete(&self, task_id: Uuid, actor: Uuid) -> ServiceResult<Task> {
        let mut task = self.owned(task_id, actor).await?;
        if task.deleted {
            return Err(ServiceError::task_not_found());
        }

        task.deleted = true;
        task.record(actor, activity::MOVED_TO_BIN, self.clock.now());
        self.tasks.save_task(&task).await?;

        info!(task_id = %task_id, actor = %actor, "Task moved to recycle bin");
        Ok(task)
    }

    /// Brings one task back from the recycle bin
    pub async fn restore(&self, task_id: Uuid, actor: Uuid) -> ServiceResult<Task> {
        let mut task = self.owned(task_id, actor).await?;
        if !task.deleted {
            return Err(ServiceError::not_found("Deleted task not found"));
        }

        task.deleted = false;
        task.record(actor, activity::RESTORED, self.clock.now());
        self.tasks.save_task(&task).await?;

        info!(task_id = %task_id, actor = %actor, "Task restored");
        Ok(task)
    }

    /// Restores every task in the actor's recycle bin
    ///
    /// Only the tasks actually restored gain a log entry. Returns them.
    pub async fn restore_all(&self, actor: Uuid) -> ServiceResult<Vec<Task>> {
        let binned = self.tasks.list_tasks(actor, TaskScope::RecycleBin).await?;
        let now = self.clock.now();

        let mut restored = Vec::with_capacity(binned.len());
        for mut task in binned {
            task.deleted = false;
            task.record(actor, activity::RESTORED, now);
            self.tasks.save_task(&task).await?;
            restored.push(task);
        }

        info!(actor = %actor, restored = restored.len(), "Recycle bin restored");
        Ok(restored)
    }

    /// Permanently removes every task in the actor's recycle bin
    pub async fn empty_recycle_bin(&self, actor: Uuid) -> ServiceResult<u64> {
        let purged = self.tasks.purge_deleted(actor).await?;

        info!(actor = %actor, purged, "Recycle bin emptied");
        Ok(purged)
    }

    /// Active tasks the actor owns or collaborates on
    pub async fn list(&self, actor: Uuid) -> ServiceResult<Vec<Task>> {
        Ok(self.tasks.list_tasks(actor, TaskScope::Active).await?)
    }

    /// Active important tasks the actor owns or collaborates on
    pub async fn important(&self, actor: Uuid) -> ServiceResult<Vec<Task>> {
        Ok(self.tasks.list_tasks(actor, TaskScope::Important).await?)
    }

    /// Deleted tasks the actor owns
    pub async fn recycle_bin(&self, actor: Uuid) -> ServiceResult<Vec<Task>> {
        Ok(self.tasks.list_tasks(actor, TaskScope::RecycleBin).await?)
    }

    /// One deleted task the actor owns
    pub async fn recycled(&self, task_id: Uuid, actor: Uuid) -> ServiceResult<Task> {
        match self.tasks.find_task(task_id).await? {
            Some(task) if task.deleted && task.is_owner(actor) => Ok(task),
            _ => Err(ServiceError::not_found("Deleted task not found")),
        }
    }

    /// Status counts over the actor's active tasks
    pub async fn stats(&self, actor: Uuid) -> ServiceResult<TaskStats> {
        let tasks = self.tasks.list_tasks(actor, TaskScope::Active).await?;
        Ok(TaskStats::tally(&tasks))
    }

    /// One active task with collaborators and activity actors resolved
    ///
    /// Actor names are looked up at read time; the stored log keeps ids only.
    pub async fn get_one(&self, task_id: Uuid, actor: Uuid) -> ServiceResult<TaskDetail> {
        let task = self.active(task_id).await?;
        if !task.is_member(actor) {
            return Err(ServiceError::task_not_found());
        }

        let mut ids: Vec<Uuid> = task.collaborators.clone();
        for entry in &task.activity_log {
            if !ids.contains(&entry.actor) {
                ids.push(entry.actor);
            }
        }

        let summaries = self.users.user_summaries(&ids).await?;
        let by_id: HashMap<Uuid, &UserSummary> = summaries.iter().map(|s| (s.id, s)).collect();

        let collaborators = task
            .collaborators
            .iter()
            .filter_map(|id| by_id.get(id).map(|s| (*s).clone()))
            .collect();

        let activity_log = task
            .activity_log
            .iter()
            .map(|entry| {
                let username = by_id
                    .get(&entry.actor)
                    .map(|s| s.username.clone())
                    .unwrap_or_else(|| UNKNOWN_ACTOR.to_string());
                ActivityView {
                    user_id: entry.actor,
                    message: format!("{} — {}", username, entry.message),
                    username,
                    at: entry.at,
                }
            })
            .collect();

        debug!(task_id = %task_id, actor = %actor, "Task fetched");

        Ok(TaskDetail {
            id: task.id,
            owner: task.owner,
            title: task.title,
            description: task.description,
            status: task.status,
            deadline: task.deadline,
            collaborators,
            pending_invites: task.pending_invites,
            activity_log,
            important: task.important,
            deleted: task.deleted,
            created_at: task.created_at,
            updated_at: task.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::user::NewUser;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: TaskService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let service = TaskService::new(store.clone(), store.clone(), clock);
        Fixture { store, service }
    }

    async fn user(store: &MemoryStore, name: &str) -> Uuid {
        store
            .create_user(
                NewUser {
                    username: name.to_string(),
                    email: format!("{}@x.com", name),
                    password_hash: "hash".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .id
    }

    async fn shared_task(f: &Fixture, owner: Uuid, collaborator: Uuid) -> Task {
        let task = f
            .service
            .create(owner, NewTask::titled("Ship release"))
            .await
            .unwrap();
        let mut stored = f.store.find_task(task.id).await.unwrap().unwrap();
        stored.add_collaborator(collaborator);
        f.store.save_task(&stored).await.unwrap();
        stored
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let f = fixture();
        let result = f.service.create(Uuid::new_v4(), NewTask::titled("   ")).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_collaborator_sets_status() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        let task = shared_task(&f, alice, bob).await;

        let updated = f
            .service
            .set_status(task.id, bob, TaskStatus::Completed)
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.activity_log.len(), 2);
        let last = updated.activity_log.last().unwrap();
        assert_eq!(last.actor, bob);
        assert_eq!(last.message, "Status changed to \"completed\"");
    }

    #[tokio::test]
    async fn test_collaborator_cannot_update_fields() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        let task = shared_task(&f, alice, bob).await;

        let result = f
            .service
            .update_fields(
                task.id,
                bob,
                TaskChanges {
                    title: Some("Hijacked".into()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        let stored = f.store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Ship release");
        assert_eq!(stored.activity_log.len(), 1);
    }

    #[tokio::test]
    async fn test_stranger_cannot_set_status() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let task = f.service.create(alice, NewTask::titled("t")).await.unwrap();

        let result = f
            .service
            .set_status(task.id, Uuid::new_v4(), TaskStatus::Completed)
            .await;
        assert!(matches!(result, Err(ServiceError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_set_status_on_deleted_task_is_not_found() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let task = f.service.create(alice, NewTask::titled("t")).await.unwrap();
        f.service.soft_delete(task.id, alice).await.unwrap();

        let result = f
            .service
            .set_status(task.id, alice, TaskStatus::Completed)
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_toggle_important_logs_update() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let task = f.service.create(alice, NewTask::titled("t")).await.unwrap();

        let task = f.service.toggle_important(task.id, alice, true).await.unwrap();
        assert!(task.important);
        assert_eq!(task.activity_log.last().unwrap().message, "Task updated");
        assert_eq!(f.service.important(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_task_from_everyone_but_owner_bin() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        let task = shared_task(&f, alice, bob).await;

        f.service.soft_delete(task.id, alice).await.unwrap();

        assert!(f.service.list(alice).await.unwrap().is_empty());
        assert!(f.service.list(bob).await.unwrap().is_empty());
        assert!(f.service.get_one(task.id, alice).await.is_err());
        assert!(f.service.get_one(task.id, bob).await.is_err());
        assert_eq!(f.service.recycle_bin(alice).await.unwrap().len(), 1);
        assert!(f.service.recycle_bin(bob).await.unwrap().is_empty());
        assert!(f.service.recycled(task.id, alice).await.is_ok());
        assert!(f.service.recycled(task.id, bob).await.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_twice_is_not_found() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let task = f.service.create(alice, NewTask::titled("t")).await.unwrap();

        f.service.soft_delete(task.id, alice).await.unwrap();
        assert!(matches!(
            f.service.soft_delete(task.id, alice).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_all_logs_only_restored_tasks() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let binned = f.service.create(alice, NewTask::titled("binned")).await.unwrap();
        let untouched = f.service.create(alice, NewTask::titled("active")).await.unwrap();
        f.service.soft_delete(binned.id, alice).await.unwrap();

        let restored = f.service.restore_all(alice).await.unwrap();
        assert_eq!(restored.len(), 1);

        let binned = f.store.find_task(binned.id).await.unwrap().unwrap();
        assert!(!binned.deleted);
        assert_eq!(binned.activity_log.last().unwrap().message, "Task restored");

        let untouched = f.store.find_task(untouched.id).await.unwrap().unwrap();
        assert_eq!(untouched.activity_log.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_recycle_bin_is_irreversible() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let task = f.service.create(alice, NewTask::titled("t")).await.unwrap();
        f.service.soft_delete(task.id, alice).await.unwrap();

        assert_eq!(f.service.empty_recycle_bin(alice).await.unwrap(), 1);
        assert!(f.service.restore(task.id, alice).await.is_err());
        assert!(f.service.restore_all(alice).await.unwrap().is_empty());
        assert!(f.store.find_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_one_resolves_actor_names() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let bob = user(&f.store, "bob").await;
        let task = shared_task(&f, alice, bob).await;
        f.service
            .set_status(task.id, bob, TaskStatus::InProgress)
            .await
            .unwrap();

        let detail = f.service.get_one(task.id, bob).await.unwrap();

        assert_eq!(detail.collaborators.len(), 1);
        assert_eq!(detail.collaborators[0].username, "bob");
        let messages: Vec<_> = detail.activity_log.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["alice — Task created", "bob — Status changed to \"in-progress\""]
        );
    }

    #[tokio::test]
    async fn test_get_one_unknown_actor_fallback() {
        let f = fixture();
        let ghost = Uuid::new_v4();
        let task = f.service.create(ghost, NewTask::titled("t")).await.unwrap();

        let detail = f.service.get_one(task.id, ghost).await.unwrap();
        assert_eq!(detail.activity_log[0].message, "Unknown — Task created");
    }

    #[tokio::test]
    async fn test_stats_count_visible_tasks() {
        let f = fixture();
        let alice = user(&f.store, "alice").await;
        let a = f.service.create(alice, NewTask::titled("a")).await.unwrap();
        let b = f.service.create(alice, NewTask::titled("b")).await.unwrap();
        f.service.create(alice, NewTask::titled("c")).await.unwrap();
        f.service
            .set_status(a.id, alice, TaskStatus::Completed)
            .await
            .unwrap();
        f.service.soft_delete(b.id, alice).await.unwrap();

        let stats = f.service.stats(alice).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 0);
    }
}
