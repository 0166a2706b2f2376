/// Task-level permission checks
///
/// Every task operation asks one question first: what may this actor do
/// with this task? The answer is a [`Capability`]:
///
/// | Actor                      | Capability               |
/// |----------------------------|--------------------------|
/// | task owner                 | `OwnerFull`              |
/// | listed collaborator        | `CollaboratorStatusOnly` |
/// | anyone else                | `None`                   |
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use tickup_shared::auth::authorization::{Capability, TaskAction};
/// use tickup_shared::models::task::{NewTask, Task};
/// use uuid::Uuid;
///
/// let owner = Uuid::new_v4();
/// let bob = Uuid::new_v4();
/// let mut task = Task::create(owner, NewTask::titled("Ship release"), Utc::now());
/// task.add_collaborator(bob);
///
/// assert_eq!(Capability::of(&task, owner), Capability::OwnerFull);
/// assert!(Capability::of(&task, bob).allows(TaskAction::SetStatus));
/// assert!(!Capability::of(&task, bob).allows(TaskAction::Edit));
/// ```

use uuid::Uuid;

use crate::models::task::Task;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Actor has no relationship with the task
    #[error("Not authorized to access this task")]
    NotMember,

    /// Actor is a collaborator but the action needs the owner
    #[error("Only the task owner can {0}")]
    OwnerOnly(&'static str),
}

/// What an actor may do with a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    OwnerFull,
    CollaboratorStatusOnly,
    None,
}

/// Actions gated by [`Capability`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    /// Read the task and its activity
    View,

    /// Change the workflow status
    SetStatus,

    /// Invite someone by email
    Invite,

    /// Edit fields, flag as important, delete or restore
    Edit,
}

impl TaskAction {
    fn describe(&self) -> &'static str {
        match self {
            TaskAction::View => "view this task",
            TaskAction::SetStatus => "change the status",
            TaskAction::Invite => "invite collaborators",
            TaskAction::Edit => "modify this task",
        }
    }
}

impl Capability {
    /// Resolves the actor's capability on a task
    pub fn of(task: &Task, actor: Uuid) -> Self {
        if task.is_owner(actor) {
            Capability::OwnerFull
        } else if task.is_collaborator(actor) {
            Capability::CollaboratorStatusOnly
        } else {
            Capability::None
        }
    }

    pub fn allows(&self, action: TaskAction) -> bool {
        match self {
            Capability::OwnerFull => true,
            Capability::CollaboratorStatusOnly => {
                matches!(action, TaskAction::View | TaskAction::SetStatus | TaskAction::Invite)
            }
            Capability::None => false,
        }
    }
}

/// Checks that `actor` may perform `action` on `task`
///
/// # Errors
///
/// - `AuthzError::NotMember` when the actor is neither owner nor collaborator
/// - `AuthzError::OwnerOnly` when a collaborator attempts an owner action
pub fn require(task: &Task, actor: Uuid, action: TaskAction) -> Result<Capability, AuthzError> {
    let capability = Capability::of(task, actor);

    match capability {
        Capability::None => Err(AuthzError::NotMember),
        c if c.allows(action) => Ok(c),
        _ => Err(AuthzError::OwnerOnly(action.describe())),
    }
}
