/// Middleware modules for the API server
///
/// Session authentication lives in `tickup_shared::auth::middleware`; this
/// module holds response hardening.

pub mod security;
