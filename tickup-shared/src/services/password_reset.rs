/// OTP-based password reset
///
/// `request_reset` issues a code into the [`OtpLedger`] and emails it;
/// `reset_password` redeems the code and stores the new password hash.
///
/// The new password is checked before the code is consumed, so a policy
/// failure does not burn a valid code.

use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::{hash_password, validate_password};
use crate::auth::tokens::is_otp_format;
use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::models::user::normalize_email;
use crate::notify::{Notification, Notifier, PasswordReset};
use crate::otp::{OtpError, OtpLedger};
use crate::store::UserStore;

#[derive(Clone)]
pub struct PasswordResetService {
    users: Arc<dyn UserStore>,
    ledger: Arc<OtpLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl PasswordResetService {
    pub fn new(
        users: Arc<dyn UserStore>,
        ledger: Arc<OtpLedger>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            ledger,
            notifier,
            clock,
        }
    }

    /// Issues and sends a reset code, replacing any earlier one
    ///
    /// # Errors
    ///
    /// - `ServiceError::NotFound` if no account has this email
    /// - `ServiceError::DeliveryFailed` if the email could not be sent; the
    ///   issued code stays valid
    pub async fn request_reset(&self, email: &str) -> ServiceResult<()> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ServiceError::validation("Email is required"));
        }

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Err(ServiceError::not_found("User not found"));
        };

        let issued = self.ledger.issue(&user.email);
        let notification = Notification::PasswordReset(PasswordReset {
            to: user.email.clone(),
            code: issued.code,
            valid_for_seconds: (issued.expires_at - self.clock.now()).num_seconds(),
        });

        self.notifier.send(notification).await.map_err(|e| {
            warn!(user_id = %user.id, error = %e, "Reset code issued but not sent");
            ServiceError::delivery_failed("Error sending OTP", e)
        })?;

        info!(user_id = %user.id, "Password reset code sent");
        Ok(())
    }

    /// Redeems `code` for `email` and sets `new_password`
    ///
    /// # Errors
    ///
    /// - `ServiceError::Validation` if a field is missing or the password is too short
    /// - `ServiceError::InvalidOrExpiredOtp` for a missing, wrong, expired or used code
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let email = normalize_email(email);
        let code = code.trim();
        let new_password = new_password.trim();

        if email.is_empty() || code.is_empty() || new_password.is_empty() {
            return Err(ServiceError::validation(
                "Email, OTP and new password are required",
            ));
        }
        validate_password(new_password).map_err(ServiceError::Validation)?;
        if !is_otp_format(code) {
            return Err(ServiceError::InvalidOrExpiredOtp);
        }

        self.ledger.consume(&email, code).map_err(|e| {
            match e {
                OtpError::Mismatch => warn!("Password reset with wrong code"),
                OtpError::Expired | OtpError::Missing => {}
            }
            ServiceError::InvalidOrExpiredOtp
        })?;

        // The code is spent from here on; a missing account is reported the
        // same way as a bad code.
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Err(ServiceError::InvalidOrExpiredOtp);
        };

        let password_hash = hash_password(new_password)?;
        self.users
            .update_password_hash(user.id, &password_hash, self.clock.now())
            .await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::clock::ManualClock;
    use crate::models::user::NewUser;
    use crate::notify::RecordingNotifier;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        service: PasswordResetService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let ledger = Arc::new(OtpLedger::new(clock.clone(), Duration::seconds(59)));

        store
            .create_user(
                NewUser {
                    username: "alice".into(),
                    email: "alice@x.com".into(),
                    password_hash: hash_password("secret1").unwrap(),
                },
                clock.now(),
            )
            .await
            .unwrap();

        let service = PasswordResetService::new(
            store.clone(),
            ledger,
            notifier.clone(),
            clock.clone(),
        );
        Fixture {
            store,
            clock,
            notifier,
            service,
        }
    }

    async fn stored_hash(store: &MemoryStore) -> String {
        store
            .find_user_by_email("alice@x.com")
            .await
            .unwrap()
            .unwrap()
            .password_hash
    }

    #[tokio::test]
    async fn test_request_for_unknown_email() {
        let f = fixture().await;
        assert!(matches!(
            f.service.request_reset("ghost@x.com").await,
            Err(ServiceError::NotFound(m)) if m == "User not found"
        ));
        assert!(f.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reset_within_window() {
        let f = fixture().await;
        f.service.request_reset(" Alice@X.com ").await.unwrap();

        let code = f.notifier.last_reset_code("alice@x.com").unwrap();
        f.clock.advance(Duration::seconds(58));

        f.service
            .reset_password("alice@x.com", &code, "newpass1")
            .await
            .unwrap();
        assert!(verify_password("newpass1", &stored_hash(&f.store).await).unwrap());

        // single use
        assert!(matches!(
            f.service.reset_password("alice@x.com", &code, "newpass2").await,
            Err(ServiceError::InvalidOrExpiredOtp)
        ));
    }

    #[tokio::test]
    async fn test_reset_at_expiry_instant_fails() {
        let f = fixture().await;
        f.service.request_reset("alice@x.com").await.unwrap();
        let code = f.notifier.last_reset_code("alice@x.com").unwrap();

        f.clock.advance(Duration::seconds(59));
        assert!(matches!(
            f.service.reset_password("alice@x.com", &code, "newpass1").await,
            Err(ServiceError::InvalidOrExpiredOtp)
        ));
        assert!(verify_password("secret1", &stored_hash(&f.store).await).unwrap());
    }

    #[tokio::test]
    async fn test_new_request_invalidates_old_code() {
        let f = fixture().await;
        f.service.request_reset("alice@x.com").await.unwrap();
        let first = f.notifier.last_reset_code("alice@x.com").unwrap();
        f.service.request_reset("alice@x.com").await.unwrap();
        let second = f.notifier.last_reset_code("alice@x.com").unwrap();

        if first != second {
            assert!(matches!(
                f.service.reset_password("alice@x.com", &first, "newpass1").await,
                Err(ServiceError::InvalidOrExpiredOtp)
            ));
        }
        f.service
            .reset_password("alice@x.com", &second, "newpass1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_malformed_code_rejected_without_touching_ledger() {
        let f = fixture().await;
        f.service.request_reset("alice@x.com").await.unwrap();
        let code = f.notifier.last_reset_code("alice@x.com").unwrap();

        for bad in ["12345", "1234567", "12a456"] {
            assert!(matches!(
                f.service.reset_password("alice@x.com", bad, "newpass1").await,
                Err(ServiceError::InvalidOrExpiredOtp)
            ));
        }
        f.service
            .reset_password("alice@x.com", &format!(" {} ", code), "newpass1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_weak_password_does_not_burn_code() {
        let f = fixture().await;
        f.service.request_reset("alice@x.com").await.unwrap();
        let code = f.notifier.last_reset_code("alice@x.com").unwrap();

        assert!(matches!(
            f.service.reset_password("alice@x.com", &code, "123").await,
            Err(ServiceError::Validation(_))
        ));
        f.service
            .reset_password("alice@x.com", &code, "newpass1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_delivery_reports_error() {
        let f = fixture().await;
        f.notifier.set_failing(true);

        assert!(matches!(
            f.service.request_reset("alice@x.com").await,
            Err(ServiceError::DeliveryFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_email_states_validity() {
        let f = fixture().await;
        f.service.request_reset("alice@x.com").await.unwrap();

        match f.notifier.sent().last() {
            Some(Notification::PasswordReset(reset)) => assert_eq!(reset.valid_for_seconds, 59),
            other => panic!("unexpected notification: {:?}", other),
        }
    }
}
