//! # TickUp Shared Library
//!
//! Domain types, storage, credential primitives and the service layer behind
//! the TickUp API server.
//!
//! ## Module Organization
//!
//! - `models`: users, tasks and their derived views
//! - `auth`: passwords, session tokens, capability checks, session middleware
//! - `store`: persistence traits with PostgreSQL and in-memory backends
//! - `db`: connection pool and migrations
//! - `otp`: password reset code ledger and its sweeper
//! - `notify`: outgoing email notifications
//! - `services`: task lifecycle, invites, accounts and password reset
//! - `clock`: injectable time source
//! - `error`: service error taxonomy

pub mod auth;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod otp;
pub mod services;
pub mod store;

/// Current version of the TickUp shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
