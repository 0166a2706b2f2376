/// Configuration management for the API server
///
/// Configuration is read once from environment variables at startup and is
/// immutable afterwards.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 5000)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for any (default: *)
/// - `STORE`: `postgres` or `memory` (default: postgres)
/// - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Session signing key, at least 32 characters (required)
/// - `JWT_TTL_DAYS`: Session lifetime (default: 7)
/// - `FRONTEND_URL`: Public web app URL (required)
/// - `BACKEND_URL`: Public URL of this API (required)
/// - `OTP_TTL_SECONDS`: Reset code lifetime (default: 59)
/// - `OTP_SWEEP_INTERVAL_SECONDS`: Reset code sweep period (default: 30)
/// - `MAIL_RELAY_URL`: Mail relay endpoint; notifications are only logged when unset
/// - `MAIL_RELAY_SECRET`: HMAC key for relay requests (required with `MAIL_RELAY_URL`)
/// - `MAIL_FROM`: Sender address (default: `TickUp <no-reply@tickup.local>`)
///
/// # Example
///
/// ```no_run
/// use tickup_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tickup_shared::otp::{DEFAULT_OTP_TTL_SECONDS, DEFAULT_SWEEP_INTERVAL_SECONDS};

const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,

    /// Which store backs users and tasks
    pub store: StoreKind,

    /// Present when `store` is `Postgres`
    pub database: Option<DatabaseConfig>,

    pub jwt: JwtConfig,

    pub links: LinksConfig,

    pub otp: OtpConfig,

    pub mail: MailConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Enables HSTS
    pub production: bool,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => anyhow::bail!("STORE must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Session token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for session signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub ttl_days: i64,
}

/// Base URLs used in emailed links and redirects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    pub frontend_url: String,
    pub backend_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_secret: Option<String>,
    pub from: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// A `.env` file is read first if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let port = var("API_PORT", "5000").parse::<u16>()?;
        let production = var("API_PRODUCTION", "false").parse::<bool>()?;
        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let store = var("STORE", "postgres").parse::<StoreKind>()?;
        let database = match store {
            StoreKind::Postgres => Some(DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: var("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?,
            }),
            StoreKind::Memory => None,
        };

        let secret = required("JWT_SECRET")?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            );
        }
        let ttl_days = var("JWT_TTL_DAYS", "7").parse::<i64>()?;
        if ttl_days <= 0 {
            anyhow::bail!("JWT_TTL_DAYS must be positive");
        }

        let otp = OtpConfig {
            ttl_seconds: var("OTP_TTL_SECONDS", &DEFAULT_OTP_TTL_SECONDS.to_string())
                .parse::<i64>()?,
            sweep_interval_seconds: var(
                "OTP_SWEEP_INTERVAL_SECONDS",
                &DEFAULT_SWEEP_INTERVAL_SECONDS.to_string(),
            )
            .parse::<u64>()?,
        };
        if otp.ttl_seconds <= 0 || otp.sweep_interval_seconds == 0 {
            anyhow::bail!("OTP_TTL_SECONDS and OTP_SWEEP_INTERVAL_SECONDS must be positive");
        }

        let relay_url = lookup("MAIL_RELAY_URL").filter(|v| !v.trim().is_empty());
        let relay_secret = lookup("MAIL_RELAY_SECRET").filter(|v| !v.trim().is_empty());
        if relay_url.is_some() && relay_secret.is_none() {
            anyhow::bail!("MAIL_RELAY_SECRET is required when MAIL_RELAY_URL is set");
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST", "0.0.0.0"),
                port,
                production,
                cors_origins,
            },
            store,
            database,
            jwt: JwtConfig { secret, ttl_days },
            links: LinksConfig {
                frontend_url: required("FRONTEND_URL")?,
                backend_url: required("BACKEND_URL")?,
            },
            otp,
            mail: MailConfig {
                relay_url,
                relay_secret,
                from: var("MAIL_FROM", "TickUp <no-reply@tickup.local>"),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgresql://localhost/tickup"),
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("FRONTEND_URL", "http://localhost:5173"),
        ("BACKEND_URL", "http://localhost:5000"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(BASE).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert!(!config.api.production);
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.store, StoreKind::Postgres);
        assert_eq!(config.database.unwrap().max_connections, 10);
        assert_eq!(config.jwt.ttl_days, 7);
        assert_eq!(config.otp.ttl_seconds, 59);
        assert_eq!(config.otp.sweep_interval_seconds, 30);
        assert!(config.mail.relay_url.is_none());
    }

    #[test]
    fn test_memory_store_needs_no_database() {
        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "DATABASE_URL")
            .chain([("STORE", "memory")])
            .collect();

        let config = load(&vars).unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert!(config.database.is_none());

        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "DATABASE_URL")
            .collect();
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_rejects_short_secret() {
        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "JWT_SECRET")
            .chain([("JWT_SECRET", "short")])
            .collect();

        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_relay_requires_secret() {
        let mut vars = BASE.to_vec();
        vars.push(("MAIL_RELAY_URL", "http://relay.local/send"));
        assert!(load(&vars).is_err());

        vars.push(("MAIL_RELAY_SECRET", "relay-secret"));
        let config = load(&vars).unwrap();
        assert_eq!(config.mail.relay_url.as_deref(), Some("http://relay.local/send"));
    }

    #[test]
    fn test_cors_origin_list() {
        let mut vars = BASE.to_vec();
        vars.push(("CORS_ORIGINS", "https://a.test, https://b.test,"));

        let config = load(&vars).unwrap();
        assert_eq!(config.api.cors_origins, vec!["https://a.test", "https://b.test"]);
    }
}
