/// Invite endpoints
///
/// - `POST /tasks/:id/invite` - Invite by email (authenticated)
/// - `GET /tasks/:id/auto-accept?email=` - Join link target (public, redirects)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::Json,
    routes::{auth::MessageResponse, tasks::parse_task_id},
};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Extension,
};
use serde::Deserialize;
use tickup_shared::{auth::middleware::AuthContext, services::AutoAcceptOutcome};
use validator::{Validate, ValidateEmail};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct InviteRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AutoAcceptQuery {
    pub email: Option<String>,
}

/// Invite someone to a task
///
/// # Endpoint
///
/// ```text
/// POST /tasks/:id/invite
/// Content-Type: application/json
///
/// { "email": "bob@example.com" }
/// ```
///
/// # Response
///
/// `{ "success": true, "message": "Invite sent to existing user" }` or
/// `"Invite sent to new email"`.
///
/// # Errors
///
/// - `400 Bad Request`: invalid email, or the owner's own email
/// - `403 Forbidden`: caller is neither owner nor collaborator
/// - `404 Not Found`: missing or deleted task
/// - `500 Internal Server Error`: invite saved but the email was not sent
pub async fn invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let task_id = parse_task_id(&id)?;
    req.validate()?;

    let outcome = state.invites.invite(task_id, &auth.user, &req.email).await?;
    Ok(Json(MessageResponse::ok(outcome.message())))
}

/// Follow an emailed join link
///
/// Redirects with `303 See Other` to the task page after joining, or to
/// signup when the email has no account yet.
///
/// # Errors
///
/// - `400 Bad Request`: missing or malformed email
/// - `404 Not Found`: missing or deleted task
pub async fn auto_accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AutoAcceptQuery>,
) -> ApiResult<Redirect> {
    let task_id = parse_task_id(&id)?;
    let email = query
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;
    let email = email.trim();
    if !email.validate_email() {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }

    let links = state.invites.links();
    let target = match state.invites.auto_accept(task_id, email).await? {
        AutoAcceptOutcome::SignupRequired => links.signup_redirect(task_id, email),
        AutoAcceptOutcome::Joined | AutoAcceptOutcome::AlreadyMember => links.task_page(task_id),
    };

    Ok(Redirect::to(&target))
}
