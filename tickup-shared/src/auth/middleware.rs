/// Session authentication middleware for Axum
///
/// Extracts the session token from the request, validates it, loads the user
/// it names and adds an [`AuthContext`] to the request extensions.
///
/// # Token Sources
///
/// - `Authorization: Bearer <token>`
/// - `x-auth-token: <token>` (legacy clients)
///
/// The bearer header wins when both are present.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{Extension, Router, routing::get, middleware};
/// use tickup_shared::auth::middleware::{session_auth_middleware, AuthContext, SessionVerifier};
/// use tickup_shared::store::memory::MemoryStore;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.user.username)
/// }
///
/// let verifier = SessionVerifier::new(Arc::new(MemoryStore::new()), "secret");
/// let app: Router = Router::new()
///     .route("/me", get(handler))
///     .layer(middleware::from_fn_with_state(verifier, session_auth_middleware));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::user::User;
use crate::store::UserStore;

/// Legacy token header
pub const LEGACY_TOKEN_HEADER: &str = "x-auth-token";

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The user as loaded for this request
    pub user: User,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No token, authorization denied")]
    MissingToken,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not valid")]
    InvalidToken,

    #[error("User no longer exists")]
    UnknownUser,

    #[error("Internal server error")]
    Store(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::Store(details) => {
                error!(error = %details, "User lookup failed during authentication");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            _ => (StatusCode::UNAUTHORIZED, "authentication_error"),
        };

        let body = json!({
            "success": false,
            "error": code,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// Pulls the session token out of the request headers
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get(LEGACY_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

/// Everything the middleware needs to turn a token into a user
#[derive(Clone)]
pub struct SessionVerifier {
    users: Arc<dyn UserStore>,
    secret: Arc<str>,
}

impl SessionVerifier {
    pub fn new(users: Arc<dyn UserStore>, secret: impl Into<String>) -> Self {
        let secret: String = secret.into();
        Self {
            users,
            secret: Arc::from(secret),
        }
    }

    /// Resolves a token to the user it was issued for
    pub async fn verify(&self, token: &str) -> Result<User, AuthError> {
        let claims = validate_token(token, &self.secret).map_err(|e| match e {
            JwtError::Expired => AuthError::Expired,
            other => {
                debug!(error = %other, "Rejected session token");
                AuthError::InvalidToken
            }
        })?;

        self.users
            .find_user(claims.sub)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .ok_or(AuthError::UnknownUser)
    }
}

/// Session authentication middleware
///
/// # Errors
///
/// Returns 401 with a JSON body if the token is missing, expired or invalid,
/// or if its user no longer exists.
pub async fn session_auth_middleware(
    State(verifier): State<SessionVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(req.headers()).ok_or(AuthError::MissingToken)?;
    let user = verifier.verify(token).await?;

    req.extensions_mut().insert(AuthContext { user });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, issue_session, Claims};
    use crate::models::user::NewUser;
    use crate::store::memory::MemoryStore;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_extract_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(LEGACY_TOKEN_HEADER, HeaderValue::from_static("legacy"));
        assert_eq!(extract_token(&headers), Some("legacy"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), Some("legacy"));
    }

    #[tokio::test]
    async fn test_verify_outcomes() {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(
                NewUser {
                    username: "alice".into(),
                    email: "alice@x.com".into(),
                    password_hash: "hash".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let verifier = SessionVerifier::new(store, SECRET);

        let token = issue_session(user.id, SECRET, Duration::days(7)).unwrap();
        assert_eq!(verifier.verify(&token).await.unwrap().id, user.id);

        let expired =
            create_token(&Claims::with_expiration(user.id, Duration::seconds(-10)), SECRET).unwrap();
        assert!(matches!(verifier.verify(&expired).await, Err(AuthError::Expired)));

        let forged = issue_session(user.id, "another-secret-key-of-enough-length", Duration::days(1)).unwrap();
        assert!(matches!(verifier.verify(&forged).await, Err(AuthError::InvalidToken)));
        assert!(matches!(verifier.verify("garbage").await, Err(AuthError::InvalidToken)));

        let ghost = issue_session(Uuid::new_v4(), SECRET, Duration::days(1)).unwrap();
        assert!(matches!(verifier.verify(&ghost).await, Err(AuthError::UnknownUser)));
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Store("down".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AuthError::MissingToken.to_string(), "No token, authorization denied");
    }
}
