/// Domain models for TickUp
///
/// # Models
///
/// - `user`: Accounts, email/username normalization and validation
/// - `task`: Tasks with embedded collaborators, pending invites and activity log

pub mod task;
pub mod user;
