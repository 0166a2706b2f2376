/// User model
///
/// Users are created at signup and never hard-deleted. Username and
/// password are the only fields a user can change afterwards.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     username TEXT NOT NULL UNIQUE,
///     email TEXT NOT NULL UNIQUE,
///     password_hash TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Emails are stored in their normalized form (see [`normalize_email`]), so
/// the unique index enforces case-insensitive uniqueness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

/// Shortest accepted username, in characters
pub const USERNAME_MIN_LEN: usize = 3;

/// Longest accepted username, in characters
pub const USERNAME_MAX_LEN: usize = 20;

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Unique display name
    pub username: String,

    /// Normalized email address
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
///
/// Fields are expected to be normalized and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Public projection of a user, used wherever another user's identity is
/// shown (collaborator lists, activity log actors)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl User {
    /// Builds a user record from creation input, stamped at `now`
    pub fn from_new(data: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: data.username,
            email: data.email,
            password_hash: data.password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public projection of this user
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    /// Name shown to other people, falling back to the email address
    pub fn display_name(&self) -> &str {
        if self.username.trim().is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}

/// Normalizes an email address for storage and lookup
///
/// # Example
///
/// ```
/// use tickup_shared::models::user::normalize_email;
///
/// assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
/// ```
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes a username (surrounding whitespace is dropped, case is kept)
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

/// Checks the username length rule on an already normalized username
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(format!(
            "Username must be between {}-{} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        ));
    }
    Ok(())
}

/// Syntactic email check, the same rule the API applies to request bodies
pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(username: &str) -> User {
        User::from_new(
            NewUser {
                username: username.to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "$argon2id$stub".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("Alice@Example.com"), "alice@example.com");
        assert_eq!(normalize_email("\talice@example.com\n"), "alice@example.com");
    }

    #[test]
    fn test_validate_username_bounds() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(20)).is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(21)).is_err());
    }

    #[test]
    fn test_email_validity() {
        assert!(is_valid_email("b@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(is_valid_email("bob+tag@x.com"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("b@.com"));
        assert!(!is_valid_email("b@@x.com"));
        assert!(!is_valid_email("b c@x.com"));
        assert!(!is_valid_email("a\nb@x.com"));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        assert_eq!(sample("alice").display_name(), "alice");
        assert_eq!(sample("").display_name(), "alice@example.com");
    }

    #[test]
    fn test_summary_carries_identity() {
        let user = sample("alice");
        let summary = user.summary();

        assert_eq!(summary.id, user.id);
        assert_eq!(summary.username, "alice");
        assert_eq!(summary.email, "alice@example.com");
    }
}
