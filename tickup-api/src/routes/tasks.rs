/// Task endpoints
///
/// Every endpoint here requires a session. Task ids that do not parse are
/// reported as `404 Task not found`, the same as ids that do not exist.
///
/// # Endpoints
///
/// - `POST /tasks` - Create
/// - `GET /tasks` - Active tasks the caller owns or collaborates on
/// - `GET /tasks/stats` - Status counts over the same set
/// - `GET /tasks/important` - Active important tasks
/// - `GET /tasks/recycle` - The caller's deleted tasks
/// - `GET /tasks/recycle/:id` - One deleted task
/// - `PUT /tasks/restore-all` - Restore the whole recycle bin
/// - `DELETE /tasks/empty-bin` - Permanently delete the recycle bin
/// - `GET /tasks/:id` - One task with collaborators and activity resolved
/// - `PATCH /tasks/:id` - Owner edits
/// - `PATCH /tasks/:id/status` - Status change (owner or collaborator)
/// - `PUT /tasks/:id/restore` - Restore from the recycle bin
/// - `DELETE /tasks/:id` - Move to the recycle bin

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::Json,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tickup_shared::{
    auth::middleware::AuthContext,
    models::task::{parse_deadline, NewTask, Task, TaskChanges, TaskDetail, TaskStats, TaskStatus},
};
use uuid::Uuid;
use validator::Validate;

/// Parses a task id path segment
pub(crate) fn parse_task_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Task not found".to_string()))
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn parse_status(raw: &str) -> ApiResult<TaskStatus> {
    raw.parse::<TaskStatus>().map_err(ApiError::BadRequest)
}

fn parse_deadline_field(raw: &str) -> ApiResult<Option<DateTime<Utc>>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_deadline(raw)
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("Invalid deadline date".to_string()))
}

/// Create task request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateTaskRequest {
    /// `null` is treated like a missing title
    #[validate(length(max = 200, message = "Title is too long"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    /// `pending`, `in-progress` or `completed`
    pub status: Option<String>,

    /// ISO instant or `YYYY-MM-DD`
    pub deadline: Option<String>,
}

/// Owner edit request; absent fields are left alone
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    #[validate(length(max = 200, message = "Title is too long"))]
    pub title: Option<String>,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// `null` clears the deadline
    #[serde(default, deserialize_with = "nullable")]
    pub deadline: Option<Option<String>>,

    #[serde(default)]
    pub important: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreAllResponse {
    pub message: String,
    pub restored: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmptyBinResponse {
    pub message: String,
    pub deleted: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SoftDeleteResponse {
    pub message: String,
    pub task: Task,
}

/// Create a task owned by the caller
///
/// # Endpoint
///
/// ```text
/// POST /tasks
/// Content-Type: application/json
///
/// { "title": "Ship release", "deadline": "2026-03-01" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: `Task title is required`, `Invalid deadline date`, bad status,
///   or a body that is not a JSON object of the expected shape
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let status = req.status.as_deref().map(parse_status).transpose()?;
    let deadline = match req.deadline.as_deref() {
        Some(raw) => parse_deadline_field(raw)?,
        None => None,
    };

    let task = state
        .tasks
        .create(
            auth.user_id(),
            NewTask {
                title: req.title.unwrap_or_default(),
                description: req.description,
                status,
                deadline,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list(auth.user_id()).await?))
}

/// `GET /tasks/stats`
pub async fn task_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskStats>> {
    Ok(Json(state.tasks.stats(auth.user_id()).await?))
}

/// `GET /tasks/important`
pub async fn important_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.important(auth.user_id()).await?))
}

/// `GET /tasks/recycle`
pub async fn recycle_bin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.recycle_bin(auth.user_id()).await?))
}

/// `GET /tasks/recycle/:id`
pub async fn recycled_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.tasks.recycled(task_id, auth.user_id()).await?))
}

/// `GET /tasks/:id`
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskDetail>> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.tasks.get_one(task_id, auth.user_id()).await?))
}

/// Owner edit
///
/// # Errors
///
/// - `400 Bad Request`: empty body, blank title, bad status or deadline
/// - `404 Not Found`: missing task or caller is not the owner
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&id)?;
    req.validate()?;

    let deadline = match req.deadline {
        Some(Some(raw)) => Some(parse_deadline_field(&raw)?),
        Some(None) => Some(None),
        None => None,
    };

    let changes = TaskChanges {
        title: req.title,
        description: req.description,
        status: req.status.as_deref().map(parse_status).transpose()?,
        deadline,
        important: req.important,
    };

    if changes.is_empty() {
        return Err(ApiError::BadRequest("No changes supplied".to_string()));
    }

    let task = state
        .tasks
        .update_fields(task_id, auth.user_id(), changes)
        .await?;
    Ok(Json(task))
}

/// Status change, open to collaborators
///
/// # Errors
///
/// - `400 Bad Request`: `Status required` or an unknown status
/// - `403 Forbidden`: caller is neither owner nor collaborator
/// - `404 Not Found`: missing or deleted task
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&id)?;

    let raw = req
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Status required".to_string()))?;
    let status = parse_status(&raw)?;

    let task = state
        .tasks
        .set_status(task_id, auth.user_id(), status)
        .await?;
    Ok(Json(task))
}

/// `PUT /tasks/:id/restore`
pub async fn restore_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.tasks.restore(task_id, auth.user_id()).await?))
}

/// `PUT /tasks/restore-all`
pub async fn restore_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<RestoreAllResponse>> {
    let restored = state.tasks.restore_all(auth.user_id()).await?.len();

    Ok(Json(RestoreAllResponse {
        message: format!("{} tasks restored", restored),
        restored,
    }))
}

/// `DELETE /tasks/:id`
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SoftDeleteResponse>> {
    let task_id = parse_task_id(&id)?;
    let task = state.tasks.soft_delete(task_id, auth.user_id()).await?;

    Ok(Json(SoftDeleteResponse {
        message: "Task moved to recycle bin".to_string(),
        task,
    }))
}

/// `DELETE /tasks/empty-bin`
///
/// Irreversible.
pub async fn empty_bin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<EmptyBinResponse>> {
    let deleted = state.tasks.empty_recycle_bin(auth.user_id()).await?;

    Ok(Json(EmptyBinResponse {
        message: format!("{} tasks permanently deleted", deleted),
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_task_id("abc"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_update_request_distinguishes_null_deadline() {
        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.deadline, None);

        let cleared: UpdateTaskRequest = serde_json::from_str(r#"{"deadline":null}"#).unwrap();
        assert_eq!(cleared.deadline, Some(None));

        let set: UpdateTaskRequest =
            serde_json::from_str(r#"{"deadline":"2026-03-01"}"#).unwrap();
        assert_eq!(set.deadline, Some(Some("2026-03-01".to_string())));
    }

    #[test]
    fn test_deadline_field() {
        assert!(parse_deadline_field("2026-03-01").unwrap().is_some());
        assert_eq!(parse_deadline_field("").unwrap(), None);
        assert!(matches!(
            parse_deadline_field("soon"),
            Err(ApiError::BadRequest(m)) if m == "Invalid deadline date"
        ));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(parse_status("in-progress").unwrap(), TaskStatus::InProgress);
        assert!(matches!(parse_status("done"), Err(ApiError::BadRequest(_))));
    }
}
