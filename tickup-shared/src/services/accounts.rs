/// Account operations
///
/// Signup, login, profile reads and the two self-service changes a user can
/// make (username and password). Signup also converts pending invites for the
/// new email into collaboration through the invite resolver.

use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::issue_session;
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::clock::Clock;
use crate::error::{conflict_message, ServiceError, ServiceResult};
use crate::models::user::{
    is_valid_email, normalize_email, normalize_username, validate_username, NewUser, User,
};
use crate::services::invites::InviteService;
use crate::store::{UniqueField, UserStore};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Signup input, as received (normalization happens here)
#[derive(Debug, Clone)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// An authenticated session handed back by signup and login
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    invites: InviteService,
    clock: Arc<dyn Clock>,
    jwt_secret: String,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        invites: InviteService,
        clock: Arc<dyn Clock>,
        jwt_secret: impl Into<String>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            invites,
            clock,
            jwt_secret: jwt_secret.into(),
            session_ttl,
        }
    }

    fn session_for(&self, user: User) -> ServiceResult<Session> {
        let token = issue_session(user.id, &self.jwt_secret, self.session_ttl)?;
        Ok(Session { token, user })
    }

    /// Registers a new account and signs it in
    ///
    /// Pending invites addressed to the new email are attached afterwards. A
    /// failure there is logged and does not fail the signup.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Validation` for missing or malformed fields
    /// - `ServiceError::Conflict` if the email or username is taken
    pub async fn signup(&self, input: Signup) -> ServiceResult<Session> {
        let username = normalize_username(&input.username);
        let email = normalize_email(&input.email);
        let password = input.password.trim();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ServiceError::validation(
                "Username, email and password are required",
            ));
        }
        validate_username(&username).map_err(ServiceError::Validation)?;
        if !is_valid_email(&email) {
            return Err(ServiceError::validation("Please provide a valid email"));
        }
        validate_password(password).map_err(ServiceError::Validation)?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(conflict_message(UniqueField::Email).into()));
        }
        if self.users.find_user_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict(
                conflict_message(UniqueField::Username).into(),
            ));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(
                NewUser {
                    username,
                    email,
                    password_hash,
                },
                self.clock.now(),
            )
            .await?;

        info!(user_id = %user.id, "User registered");

        if let Err(e) = self.invites.attach_pending_tasks(&user).await {
            warn!(user_id = %user.id, error = %e, "Failed to attach pending invites");
        }

        self.session_for(user)
    }

    /// Signs in with email and password
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let email = normalize_email(email);
        let password = password.trim();

        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::validation("Email and password are required"));
        }

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            warn!("Login attempt for unknown email");
            return Err(ServiceError::Authentication(INVALID_CREDENTIALS.into()));
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login attempt with wrong password");
            return Err(ServiceError::Authentication(INVALID_CREDENTIALS.into()));
        }

        info!(user_id = %user.id, "User logged in");
        self.session_for(user)
    }

    /// Whether nobody holds `username` (compared after trimming)
    pub async fn username_available(&self, username: &str) -> ServiceResult<bool> {
        let username = normalize_username(username);
        Ok(self.users.find_user_by_username(&username).await?.is_none())
    }

    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Renames the user; keeping the current name is allowed
    pub async fn update_username(&self, user_id: Uuid, username: &str) -> ServiceResult<User> {
        let username = normalize_username(username);
        validate_username(&username).map_err(ServiceError::Validation)?;

        if let Some(holder) = self.users.find_user_by_username(&username).await? {
            if holder.id != user_id {
                return Err(ServiceError::Conflict(
                    conflict_message(UniqueField::Username).into(),
                ));
            }
        }

        let user = self
            .users
            .update_username(user_id, &username, self.clock.now())
            .await?;
        info!(user_id = %user.id, "Username updated");
        Ok(user)
    }

    /// Replaces the password after checking the current one
    ///
    /// # Errors
    ///
    /// `ServiceError::Authentication` if `current` is wrong.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current: &str,
        new: &str,
    ) -> ServiceResult<()> {
        let current = current.trim();
        let new = new.trim();

        if current.is_empty() || new.is_empty() {
            return Err(ServiceError::validation(
                "Current and new password are required",
            ));
        }
        validate_password(new).map_err(ServiceError::Validation)?;

        let user = self.profile(user_id).await?;
        if !verify_password(current, &user.password_hash)? {
            return Err(ServiceError::Authentication(
                "Current password is incorrect".into(),
            ));
        }

        let password_hash = hash_password(new)?;
        self.users
            .update_password_hash(user.id, &password_hash, self.clock.now())
            .await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}
