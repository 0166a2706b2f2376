//! Service-level error taxonomy
//!
//! Every service operation fails with a [`ServiceError`]. The HTTP layer maps
//! each variant to one status code; nothing below the services knows about HTTP.

use crate::auth::authorization::AuthzError;
use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::notify::NotifyError;
use crate::store::{StoreError, UniqueField};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or rule-breaking input; nothing was written
    #[error("{0}")]
    Validation(String),

    /// Missing or wrong credentials
    #[error("{0}")]
    Authentication(String),

    /// Authenticated but not allowed to act on the resource
    #[error("{0}")]
    Authorization(String),

    /// Absent, or not visible to the actor
    #[error("{0}")]
    NotFound(String),

    /// Duplicate email or username
    #[error("{0}")]
    Conflict(String),

    /// Reset code missing, wrong, expired or already used
    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    /// The change was persisted but its notification could not be delivered
    #[error("{message}")]
    DeliveryFailed {
        message: String,
        #[source]
        source: NotifyError,
    },

    /// Store or crypto failure
    #[error("{0}")]
    Dependency(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn task_not_found() -> Self {
        ServiceError::NotFound("Task not found".to_string())
    }

    pub fn delivery_failed(message: impl Into<String>, source: NotifyError) -> Self {
        ServiceError::DeliveryFailed {
            message: message.into(),
            source,
        }
    }
}

/// Conflict message for a duplicated field
pub fn conflict_message(field: UniqueField) -> &'static str {
    match field {
        UniqueField::Email => "Email already in use",
        UniqueField::Username => "Username already taken",
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => ServiceError::Conflict(conflict_message(field).into()),
            StoreError::NotFound => ServiceError::NotFound("Record not found".into()),
            StoreError::Database(e) => ServiceError::Dependency(format!("Database error: {}", e)),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Dependency(err.to_string())
    }
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        ServiceError::Dependency(err.to_string())
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember => ServiceError::Authorization("Not authorized".into()),
            AuthzError::OwnerOnly(_) => ServiceError::Authorization(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflicts_carry_user_facing_message() {
        let err: ServiceError = StoreError::Conflict(UniqueField::Email).into();
        assert!(matches!(&err, ServiceError::Conflict(m) if m == "Email already in use"));

        let err: ServiceError = StoreError::Conflict(UniqueField::Username).into();
        assert!(matches!(&err, ServiceError::Conflict(m) if m == "Username already taken"));
    }

    #[test]
    fn test_authz_errors_map_to_authorization() {
        let err: ServiceError = AuthzError::NotMember.into();
        assert_eq!(err.to_string(), "Not authorized");

        let err: ServiceError = AuthzError::OwnerOnly("modify this task").into();
        assert_eq!(err.to_string(), "Only the task owner can modify this task");
    }

    #[test]
    fn test_delivery_failed_keeps_source() {
        let err = ServiceError::delivery_failed(
            "Invite saved, but the email could not be sent",
            NotifyError::Rejected(502),
        );

        assert_eq!(err.to_string(), "Invite saved, but the email could not be sent");
        assert!(std::error::Error::source(&err).is_some());
    }
}
