/// API route handlers
///
/// - `health`: Health check endpoint
/// - `auth`: Accounts, sessions and password reset
/// - `tasks`: Task lifecycle and views
/// - `invites`: Invitations and join links

pub mod auth;
pub mod health;
pub mod invites;
pub mod tasks;
