/// Session token generation and validation
///
/// Sessions are stateless JWTs signed with HS256. The only identity claim is
/// the user id; everything else about the user is loaded from the store on
/// each request so that renamed or removed accounts are picked up immediately.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Expiration**: 7 days by default, configurable per token
/// - **Validation**: Signature, expiration, not-before and issuer checks
///
/// # Example
///
/// ```
/// use tickup_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
///
/// let claims = Claims::new(user_id);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written into and required on every token
pub const ISSUER: &str = "tickup";

/// Default session lifetime
pub const DEFAULT_SESSION_DAYS: i64 = 7;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// JWT claims structure
///
/// - `sub`: Subject (user ID)
/// - `iss`: Issuer (always "tickup")
/// - `iat`: Issued at timestamp
/// - `exp`: Expiration timestamp
/// - `nbf`: Not before timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer - Always "tickup"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Creates session claims with the default 7-day lifetime
    pub fn new(user_id: Uuid) -> Self {
        Self::with_expiration(user_id, Duration::days(DEFAULT_SESSION_DAYS))
    }

    /// Creates claims with custom expiration
    ///
    /// # Example
    ///
    /// ```
    /// use tickup_shared::auth::jwt::Claims;
    /// use chrono::Duration;
    /// use uuid::Uuid;
    ///
    /// let claims = Claims::with_expiration(Uuid::new_v4(), Duration::hours(1));
    /// assert!(!claims.is_expired());
    /// ```
    pub fn with_expiration(user_id: Uuid, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Creates a signed session token from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if token encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Issues a session token for a user
///
/// Convenience wrapper used by signup and login.
pub fn issue_session(user_id: Uuid, secret: &str, ttl: Duration) -> Result<String, JwtError> {
    create_token(&Claims::with_expiration(user_id, ttl), secret)
}

/// Validates a session token and extracts claims
///
/// Verifies:
/// - Signature is valid
/// - Token hasn't expired
/// - Issuer is "tickup"
/// - Token is not used before nbf time
///
/// # Errors
///
/// Returns `JwtError::Expired` for expired tokens and
/// `JwtError::ValidationError` for anything else that fails.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_default_lifetime_is_seven_days() {
        let claims = Claims::new(Uuid::new_v4());

        let time_left = claims.time_until_expiration().unwrap();
        assert!(time_left.num_days() >= 6);
        assert!(time_left <= Duration::days(7));
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id), SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.iss, "tickup");
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4()), "secret1").unwrap();

        let result = validate_token(&token, "wrong-secret");
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(Uuid::new_v4(), Duration::seconds(-3600));
        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_rejects_foreign_issuer() {
        let mut claims = Claims::new(Uuid::new_v4());
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::InvalidIssuer { .. })
        ));
    }

    #[test]
    fn test_issue_session() {
        let user_id = Uuid::new_v4();
        let token = issue_session(user_id, SECRET, Duration::days(7)).unwrap();

        assert_eq!(validate_token(&token, SECRET).unwrap().sub, user_id);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(validate_token("not-a-token", SECRET).is_err());
    }
}
