/// Service layer
///
/// Each service owns one slice of behavior and reaches storage, time and
/// notification delivery only through the trait seams in [`crate::store`],
/// [`crate::clock`] and [`crate::notify`].
///
/// - [`lifecycle`]: task create/update/status/delete/restore and the task views
/// - [`invites`]: inviting by email and resolving pending invites
/// - [`accounts`]: signup, login and profile changes
/// - [`password_reset`]: OTP issue and redemption

pub mod accounts;
pub mod invites;
pub mod lifecycle;
pub mod password_reset;

pub use accounts::{AccountService, Session, Signup};
pub use invites::{AutoAcceptOutcome, InviteLinks, InviteOutcome, InviteService};
pub use lifecycle::TaskService;
pub use password_reset::PasswordResetService;
