/// PostgreSQL plumbing
///
/// - `pool`: connection pool construction with a startup health check
/// - `migrations`: embedded schema migrations
///
/// Queries against the schema live in [`crate::store::postgres`].

pub mod migrations;
pub mod pool;
