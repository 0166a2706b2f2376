/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: session token issue and validation
/// - [`tokens`]: invite tokens, reset codes and their digests
/// - [`middleware`]: Axum session middleware
/// - [`authorization`]: per-task capability checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **Session Tokens**: HS256 signing, 7-day default lifetime
/// - **Reset Codes**: stored as SHA-256 digests, compared in constant time
///
/// # Example
///
/// ```no_run
/// use tickup_shared::auth::password::{hash_password, verify_password};
/// use tickup_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4());
/// let token = create_token(&claims, "secret-key")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod tokens;
