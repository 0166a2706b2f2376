/// Invite Resolver
///
/// Decides what an invitation means for its target:
///
/// - the email belongs to an account: the user joins the task right away and
///   receives a direct join link
/// - the email is unknown: a pending invite with a fresh token is stored and
///   the address receives a signup link
///
/// Pending invites are resolved through [`InviteService::consume_invite`],
/// which is shared by both acceptance paths (signup-time attachment and the
/// auto-accept link), so they cannot leave different state behind.

use std::sync::Arc;
use tracing::{info, warn};
use url::form_urlencoded::byte_serialize;
use uuid::Uuid;

use crate::auth::authorization::{require, TaskAction};
use crate::auth::tokens::generate_invite_token;
use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::models::task::{activity, PendingInvite, Task};
use crate::models::user::{is_valid_email, normalize_email, User};
use crate::notify::{Notification, Notifier, TaskInvite};
use crate::store::{TaskStore, UserStore};

/// Percent-encodes a query value (`@` and `+` included)
fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Base URLs used to build invite links
///
/// Every interpolated value is percent-encoded, so the links survive any
/// email address and are always valid `Location` header values.
#[derive(Debug, Clone)]
pub struct InviteLinks {
    /// Public web app, e.g. `https://tickup.app`
    pub frontend_url: String,
    /// This API as reachable by email recipients
    pub backend_url: String,
}

impl InviteLinks {
    /// `{backend}/tasks/{task}/auto-accept?email={email}`
    pub fn join_link(&self, task_id: Uuid, email: &str) -> String {
        format!(
            "{}/tasks/{}/auto-accept?email={}",
            self.backend_url.trim_end_matches('/'),
            task_id,
            encode(email)
        )
    }

    /// `{frontend}/signup?invite={token}&taskId={task}`
    pub fn signup_link(&self, task_id: Uuid, token: &str) -> String {
        format!(
            "{}/signup?invite={}&taskId={}",
            self.frontend_url.trim_end_matches('/'),
            encode(token),
            task_id
        )
    }

    /// Where an auto-accept for an unknown email is sent
    pub fn signup_redirect(&self, task_id: Uuid, email: &str) -> String {
        format!(
            "{}/signup?inviteTask={}&email={}",
            self.frontend_url.trim_end_matches('/'),
            task_id,
            encode(email)
        )
    }

    /// Where a successful auto-accept is sent
    pub fn task_page(&self, task_id: Uuid) -> String {
        format!("{}/tasks/{}", self.frontend_url.trim_end_matches('/'), task_id)
    }
}

/// Which invite branch was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteOutcome {
    /// Target already had an account and is now a collaborator
    ExistingUser,
    /// Target has no account; a pending invite was stored
    NewEmail,
}

impl InviteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            InviteOutcome::ExistingUser => "Invite sent to existing user",
            InviteOutcome::NewEmail => "Invite sent to new email",
        }
    }
}

/// Result of following an auto-accept link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAcceptOutcome {
    /// No account for the email; the caller should go through signup
    SignupRequired,
    /// The user was added as a collaborator
    Joined,
    /// The user was already the owner or a collaborator
    AlreadyMember,
}

#[derive(Clone)]
pub struct InviteService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    links: InviteLinks,
}

/// Resolves a pending invite for `user` on `task`
///
/// Adds the user as a collaborator (never the owner, never twice) and removes
/// every pending invite addressed to the user's email. Returns whether the
/// user was newly added. Appends no activity entry.
pub fn consume_invite(task: &mut Task, user: &User) -> bool {
    task.remove_invites_for(&user.email);
    if task.is_owner(user.id) {
        return false;
    }
    task.add_collaborator(user.id)
}

impl InviteService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        links: InviteLinks,
    ) -> Self {
        Self {
            tasks,
            users,
            notifier,
            clock,
            links,
        }
    }

    pub fn links(&self) -> &InviteLinks {
        &self.links
    }

    async fn unique_token(&self) -> ServiceResult<String> {
        loop {
            let token = generate_invite_token();
            if !self.tasks.invite_token_exists(&token).await? {
                return Ok(token);
            }
            warn!("Invite token collision, regenerating");
        }
    }

    /// Invites `email` to a task on behalf of `inviter`
    ///
    /// The task change is saved before the email goes out. If sending fails
    /// the change stays and `ServiceError::DeliveryFailed` is returned.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Validation` for a malformed email or inviting the owner
    /// - `ServiceError::NotFound` if the task is missing or deleted
    /// - `ServiceError::Authorization` if the inviter is not owner or collaborator
    pub async fn invite(
        &self,
        task_id: Uuid,
        inviter: &User,
        email: &str,
    ) -> ServiceResult<InviteOutcome> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ServiceError::validation("A valid email is required"));
        }

        let mut task = match self.tasks.find_task(task_id).await? {
            Some(task) if !task.deleted => task,
            _ => return Err(ServiceError::task_not_found()),
        };
        require(&task, inviter.id, TaskAction::Invite)?;

        let now = self.clock.now();
        let existing = self.users.find_user_by_email(&email).await?;

        let (outcome, link) = match existing {
            Some(invitee) => {
                if task.is_owner(invitee.id) {
                    return Err(ServiceError::validation("The task owner cannot be invited"));
                }
                task.add_collaborator(invitee.id);
                (
                    InviteOutcome::ExistingUser,
                    self.links.join_link(task.id, &invitee.email),
                )
            }
            None => {
                let token = self.unique_token().await?;
                let link = self.links.signup_link(task.id, &token);
                task.pending_invites.push(PendingInvite {
                    email: email.clone(),
                    token,
                });
                (InviteOutcome::NewEmail, link)
            }
        };

        task.record(inviter.id, activity::invite_sent(&email), now);
        self.tasks.save_task(&task).await?;

        info!(
            task_id = %task.id,
            inviter = %inviter.id,
            outcome = ?outcome,
            "Invite recorded"
        );

        let notification = Notification::TaskInvite(TaskInvite {
            to: email.clone(),
            task_title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.deadline,
            inviter: inviter.display_name().to_string(),
            link,
        });

        self.notifier.send(notification).await.map_err(|e| {
            warn!(task_id = %task.id, error = %e, "Invite saved but email not sent");
            ServiceError::delivery_failed(
                "Invite was saved, but the invitation email could not be sent",
                e,
            )
        })?;

        Ok(outcome)
    }

    /// Converts every pending invite for a newly registered user into
    /// collaboration; returns how many tasks were touched
    pub async fn attach_pending_tasks(&self, user: &User) -> ServiceResult<usize> {
        let tasks = self.tasks.tasks_with_pending_invite(&user.email).await?;
        let now = self.clock.now();

        let mut attached = 0;
        for mut task in tasks {
            consume_invite(&mut task, user);
            task.updated_at = now;
            self.tasks.save_task(&task).await?;
            attached += 1;
        }

        if attached > 0 {
            info!(user_id = %user.id, tasks = attached, "Attached pending invites");
        }
        Ok(attached)
    }

    /// Follows an emailed join link
    ///
    /// # Errors
    ///
    /// `ServiceError::NotFound` if the email has an account but the task is
    /// missing or deleted.
    pub async fn auto_accept(&self, task_id: Uuid, email: &str) -> ServiceResult<AutoAcceptOutcome> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Ok(AutoAcceptOutcome::SignupRequired);
        };

        let mut task = match self.tasks.find_task(task_id).await? {
            Some(task) if !task.deleted => task,
            _ => return Err(ServiceError::task_not_found()),
        };

        let had_invite = task.has_pending_invite(&user.email);
        let joined = consume_invite(&mut task, &user);
        let now = self.clock.now();

        if joined {
            task.record(user.id, activity::JOINED_VIA_LINK, now);
        } else if had_invite {
            task.updated_at = now;
        } else {
            return Ok(AutoAcceptOutcome::AlreadyMember);
        }

        self.tasks.save_task(&task).await?;

        if joined {
            info!(task_id = %task_id, user_id = %user.id, "Joined task via invite link");
            Ok(AutoAcceptOutcome::Joined)
        } else {
            Ok(AutoAcceptOutcome::AlreadyMember)
        }
    }
}
