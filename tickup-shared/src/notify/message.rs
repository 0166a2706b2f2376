//! Email content for outgoing notifications

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Notification;

/// Shown when a task has no description
pub const NO_DESCRIPTION: &str = "No description";

/// Shown when a task has no deadline
pub const NO_DUE_DATE: &str = "No due date set";

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Human-readable due date, e.g. `Mon Jan 05 2026`
pub fn format_due_date(deadline: Option<DateTime<Utc>>) -> String {
    match deadline {
        Some(deadline) => deadline.format("%a %b %d %Y").to_string(),
        None => NO_DUE_DATE.to_string(),
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl Notification {
    /// Recipient address
    pub fn recipient(&self) -> &str {
        match self {
            Notification::TaskInvite(invite) => &invite.to,
            Notification::PasswordReset(reset) => &reset.to,
        }
    }

    pub fn render(&self) -> EmailMessage {
        match self {
            Notification::TaskInvite(invite) => {
                let description = if invite.description.trim().is_empty() {
                    NO_DESCRIPTION
                } else {
                    invite.description.as_str()
                };
                let due = format_due_date(invite.due_date);

                let text = format!(
                    "You've been invited to a task!\n\n\
                     Task Title: {}\nDescription: {}\nDue Date: {}\nInvited By: {}\n\n\
                     Join the task: {}\n\n\
                     This email is intended for the recipient only. If you did not expect it, please ignore it.",
                    invite.task_title, description, due, invite.inviter, invite.link
                );

                let html = format!(
                    "<h1>TickUp Task Invitation</h1>\
                     <h2>You've been invited to a task!</h2>\
                     <p><strong>Task Title:</strong> {}</p>\
                     <p><strong>Description:</strong> {}</p>\
                     <p><strong>Due Date:</strong> {}</p>\
                     <p><strong>Invited By:</strong> {}</p>\
                     <p><a href=\"{}\">Join Task</a></p>\
                     <p>This email is intended for the recipient only. Do not share your login \
                     credentials or links. If you did not expect this email, please ignore it.</p>",
                    escape_html(&invite.task_title),
                    escape_html(description),
                    escape_html(&due),
                    escape_html(&invite.inviter),
                    escape_html(&invite.link),
                );

                EmailMessage {
                    to: invite.to.clone(),
                    subject: format!("Invitation to join task \"{}\"", invite.task_title),
                    text,
                    html,
                }
            }
            Notification::PasswordReset(reset) => {
                let text = format!(
                    "Use the following one-time password to reset your TickUp password. \
                     It will expire in {} seconds.\n\n{}\n\n\
                     Do not share this code with anyone. If you did not request a password reset, \
                     please ignore this email.",
                    reset.valid_for_seconds, reset.code
                );

                let html = format!(
                    "<h1>TickUp Password Reset</h1>\
                     <h2>Your One-Time Password (OTP)</h2>\
                     <p>Use the following OTP to reset your TickUp password. \
                     It will expire in <strong>{} seconds</strong>.</p>\
                     <p style=\"font-size:32px;letter-spacing:5px\"><strong>{}</strong></p>\
                     <p>Do not share your OTP with anyone. TickUp will never ask for it. \
                     If you did not request a password reset, please ignore this email.</p>",
                    reset.valid_for_seconds,
                    escape_html(&reset.code),
                );

                EmailMessage {
                    to: reset.to.clone(),
                    subject: "Your TickUp Password Reset OTP".to_string(),
                    text,
                    html,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{PasswordReset, TaskInvite};
    use chrono::TimeZone;

    fn invite() -> TaskInvite {
        TaskInvite {
            to: "b@x.com".to_string(),
            task_title: "Ship <release>".to_string(),
            description: String::new(),
            due_date: None,
            inviter: "alice".to_string(),
            link: "https://app.example/signup?invite=abc&taskId=1".to_string(),
        }
    }

    #[test]
    fn test_format_due_date() {
        let date = Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap();
        assert_eq!(format_due_date(Some(date)), "Mon Jan 05 2026");
        assert_eq!(format_due_date(None), "No due date set");
    }

    #[test]
    fn test_invite_rendering_uses_fallbacks() {
        let message = Notification::TaskInvite(invite()).render();

        assert_eq!(message.to, "b@x.com");
        assert_eq!(message.subject, "Invitation to join task \"Ship <release>\"");
        assert!(message.text.contains("Description: No description"));
        assert!(message.text.contains("Due Date: No due date set"));
        assert!(message.text.contains("Invited By: alice"));
        assert!(message.text.contains("signup?invite=abc&taskId=1"));
    }

    #[test]
    fn test_invite_html_is_escaped() {
        let message = Notification::TaskInvite(invite()).render();

        assert!(message.html.contains("Ship &lt;release&gt;"));
        assert!(message.html.contains("invite=abc&amp;taskId=1"));
        assert!(!message.html.contains("<release>"));
    }

    #[test]
    fn test_reset_rendering_states_validity() {
        let message = Notification::PasswordReset(PasswordReset {
            to: "a@x.com".to_string(),
            code: "123456".to_string(),
            valid_for_seconds: 59,
        })
        .render();

        assert_eq!(message.subject, "Your TickUp Password Reset OTP");
        assert!(message.text.contains("59 seconds"));
        assert!(message.text.contains("123456"));
        assert!(message.html.contains("123456"));
    }
}
