/// Account endpoints
///
/// # Endpoints
///
/// - `POST /auth/signup` - Register and sign in
/// - `POST /auth/login` - Sign in
/// - `GET /auth/check-username/:username` - Username availability
/// - `GET /auth/user` - Current profile (authenticated)
/// - `PUT /auth/update-username` - Rename (authenticated)
/// - `PUT /auth/change-password` - Change password (authenticated)
/// - `POST /auth/request-password-reset` - Email a reset code
/// - `POST /auth/reset-password` - Redeem a reset code

use crate::{app::AppState, error::ApiResult, extract::Json};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tickup_shared::{
    auth::middleware::AuthContext,
    services::{Session, Signup},
};
use uuid::Uuid;
use validator::Validate;

fn trimmed_non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Signup request
///
/// Fields default to empty so that a missing field is reported with the
/// same message as a blank one.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(max = 100, message = "Username is too long"))]
    pub username: String,

    /// Trimmed; blank counts as missing and is reported by the service
    #[serde(deserialize_with = "trimmed_non_blank")]
    #[validate(
        email(message = "Please provide a valid email"),
        length(max = 254, message = "Email is too long")
    )]
    pub email: Option<String>,

    #[validate(length(max = 128, message = "Password is too long"))]
    pub password: String,

    /// Invite token from a signup link; pending invites are matched by email
    pub invite: Option<String>,

    /// Task id from a signup link
    pub task_id: Option<String>,
}

/// Login request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(max = 254, message = "Email is too long"))]
    pub email: String,

    #[validate(length(max = 128, message = "Password is too long"))]
    pub password: String,
}

/// Signup and login response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            success: true,
            token: session.token,
            user_id: session.user.id,
            username: session.user.username,
            email: session.user.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: ProfileView,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateUsernameRequest {
    #[validate(length(max = 100, message = "Username is too long"))]
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenamedUser {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUsernameResponse {
    pub success: bool,
    pub user: RenamedUser,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(max = 128, message = "Password is too long"))]
    pub current_password: String,

    #[validate(length(max = 128, message = "Password is too long"))]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RequestResetRequest {
    #[validate(length(max = 254, message = "Email is too long"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(max = 254, message = "Email is too long"))]
    pub email: String,

    #[validate(length(max = 16, message = "Invalid or expired OTP"))]
    pub otp: String,

    #[validate(length(max = 128, message = "Password is too long"))]
    pub new_password: String,
}

/// Plain `{success, message}` acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Register a new account
///
/// # Endpoint
///
/// ```text
/// POST /auth/signup
/// Content-Type: application/json
///
/// { "username": "alice", "email": "alice@example.com", "password": "secret1" }
/// ```
///
/// # Response
///
/// `201 Created` with `{success, token, userId, username, email}`.
///
/// # Errors
///
/// - `400 Bad Request`: missing or invalid fields
/// - `409 Conflict`: email or username taken
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;

    if let (Some(invite), Some(task_id)) = (&req.invite, &req.task_id) {
        tracing::debug!(invite_len = invite.len(), task_id = %task_id, "Signup carries invite context");
    }

    let session = state
        .accounts
        .signup(Signup {
            username: req.username,
            email: req.email.unwrap_or_default(),
            password: req.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Sign in with email and password
///
/// # Errors
///
/// - `400 Bad Request`: missing fields
/// - `401 Unauthorized`: `Invalid credentials`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let session = state.accounts.login(&req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// `GET /auth/check-username/:username`
pub async fn check_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<AvailabilityResponse>> {
    let available = state.accounts.username_available(&username).await?;
    Ok(Json(AvailabilityResponse { available }))
}

/// `GET /auth/user`
pub async fn current_user(Extension(auth): Extension<AuthContext>) -> Json<ProfileResponse> {
    let user = auth.user;
    Json(ProfileResponse {
        success: true,
        user: ProfileView {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        },
    })
}

/// `PUT /auth/update-username`
///
/// # Errors
///
/// - `400 Bad Request`: not 3-20 characters
/// - `409 Conflict`: held by another user
pub async fn update_username(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateUsernameRequest>,
) -> ApiResult<Json<UpdateUsernameResponse>> {
    req.validate()?;

    let user = state
        .accounts
        .update_username(auth.user_id(), &req.username)
        .await?;

    Ok(Json(UpdateUsernameResponse {
        success: true,
        user: RenamedUser {
            username: user.username,
            email: user.email,
        },
        message: "Username updated successfully".to_string(),
    }))
}

/// `PUT /auth/change-password`
///
/// # Errors
///
/// - `400 Bad Request`: missing fields or new password too short
/// - `401 Unauthorized`: current password is wrong
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    state
        .accounts
        .change_password(auth.user_id(), &req.current_password, &req.new_password)
        .await?;

    Ok(Json(MessageResponse::ok("Password updated successfully")))
}

/// `POST /auth/request-password-reset`
///
/// Unknown emails get `404 Not Found`.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<RequestResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    state.resets.request_reset(&req.email).await?;
    Ok(Json(MessageResponse::ok("OTP sent to email")))
}

/// `POST /auth/reset-password`
///
/// # Errors
///
/// - `400 Bad Request`: missing fields, short password, or `Invalid or expired OTP`
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    state
        .resets
        .reset_password(&req.email, &req.otp, &req.new_password)
        .await?;

    Ok(Json(MessageResponse::ok("Password reset successful")))
}
