/// Outgoing notifications
///
/// Services hand a [`Notification`] to a [`Notifier`] and await the result.
/// There is no retry: a failed dispatch is reported to the caller, and any
/// state change made before the dispatch stays in place.
///
/// # Implementations
///
/// - [`relay::RelayNotifier`]: POSTs rendered mail to an HTTP mail relay,
///   signed with HMAC-SHA256
/// - [`LogNotifier`]: writes the notification to the log (development)
/// - [`RecordingNotifier`]: keeps notifications in memory (tests)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::info;

pub mod message;
pub mod relay;

pub use message::EmailMessage;

/// Error type for notification dispatch
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The relay could not be reached
    #[error("Failed to reach mail relay: {0}")]
    Transport(String),

    /// The relay answered with an error status
    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),

    /// Dispatch failed for another reason
    #[error("Notification failed: {0}")]
    Other(String),
}

/// Invitation to collaborate on a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvite {
    pub to: String,
    pub task_title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    /// Inviter's username, or email if the username is blank
    pub inviter: String,
    /// Join link for existing users, signup link for new emails
    pub link: String,
}

/// Password reset code delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub to: String,
    pub code: String,
    pub valid_for_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    TaskInvite(TaskInvite),
    PasswordReset(PasswordReset),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::TaskInvite(_) => "task_invite",
            Notification::PasswordReset(_) => "password_reset",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Logs notifications instead of sending them
///
/// Reset codes are logged too, so this is only suitable for local runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        let message = notification.render();
        info!(
            kind = notification.kind(),
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "Notification (not delivered, no mail relay configured)"
        );
        Ok(())
    }
}

/// Keeps every notification in memory
///
/// Can be switched into a failing mode to exercise dispatch error paths.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `send` fails and nothing is recorded
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent reset code delivered to `email`
    pub fn last_reset_code(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notification::PasswordReset(reset) if reset.to == email => Some(reset.code),
            _ => None,
        })
    }

    /// Most recent invite delivered to `email`
    pub fn last_invite(&self, email: &str) -> Option<TaskInvite> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notification::TaskInvite(invite) if invite.to == email => Some(invite),
            _ => None,
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Other("recording notifier set to fail".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset(to: &str, code: &str) -> Notification {
        Notification::PasswordReset(PasswordReset {
            to: to.to_string(),
            code: code.to_string(),
            valid_for_seconds: 59,
        })
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.send(reset("a@x.com", "111111")).await.unwrap();
        notifier.send(reset("b@x.com", "222222")).await.unwrap();
        notifier.send(reset("a@x.com", "333333")).await.unwrap();

        assert_eq!(notifier.sent().len(), 3);
        assert_eq!(notifier.last_reset_code("a@x.com").as_deref(), Some("333333"));
        assert_eq!(notifier.last_reset_code("c@x.com"), None);
        assert!(notifier.last_invite("a@x.com").is_none());
    }

    #[tokio::test]
    async fn test_recording_notifier_failing_mode() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);

        assert!(notifier.send(reset("a@x.com", "111111")).await.is_err());
        assert!(notifier.sent().is_empty());

        notifier.set_failing(false);
        assert!(notifier.send(reset("a@x.com", "111111")).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.send(reset("a@x.com", "111111")).await.is_ok());
    }
}
