/// Password reset one-time codes
///
/// The ledger maps a normalized email to at most one live code. Issuing a
/// new code for an email replaces the previous one. A code is accepted only
/// strictly before its expiry instant and only once.
///
/// ```text
/// (none) --issue--> Issued(expires_at = now + ttl)
/// Issued --issue--> Issued(new code)            old code is dead immediately
/// Issued --consume(ok, now < expires_at)--> (none)
/// Issued --sweep / consume(now >= expires_at)--> (none)
/// ```
///
/// Codes are held as SHA-256 digests. All state sits behind one mutex, so a
/// sweep and a concurrent consume never observe a half-updated entry, and two
/// concurrent consumes of the same code cannot both succeed.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use tickup_shared::clock::{Clock, ManualClock};
/// use tickup_shared::otp::OtpLedger;
///
/// let clock = Arc::new(ManualClock::default());
/// let ledger = OtpLedger::new(clock.clone(), Duration::seconds(59));
///
/// let issued = ledger.issue("a@x.com");
/// clock.advance(Duration::seconds(58));
/// assert!(ledger.consume("a@x.com", &issued.code).is_ok());
/// assert!(ledger.consume("a@x.com", &issued.code).is_err());
/// ```

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::tokens::{digest, generate_otp_code, verify_digest};
use crate::clock::Clock;

/// Default code lifetime
pub const DEFAULT_OTP_TTL_SECONDS: i64 = 59;

/// Default sweep cadence
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;

/// Why a code was refused
///
/// Callers should not reveal which of these occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("No code issued for this email")]
    Missing,

    #[error("Code does not match")]
    Mismatch,

    #[error("Code has expired")]
    Expired,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code_digest: String,
    expires_at: DateTime<Utc>,
}

/// A freshly issued code, returned once so it can be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

pub struct OtpLedger {
    entries: Mutex<HashMap<String, OtpEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl OtpLedger {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, OtpEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a new code for `email`, replacing any previous one
    pub fn issue(&self, email: &str) -> IssuedOtp {
        let code = generate_otp_code();
        let expires_at = self.clock.now() + self.ttl;

        let replaced = self
            .entries()
            .insert(
                email.to_string(),
                OtpEntry {
                    code_digest: digest(&code),
                    expires_at,
                },
            )
            .is_some();

        debug!(replaced, expires_at = %expires_at, "Issued password reset code");
        IssuedOtp { code, expires_at }
    }

    /// Checks `code` for `email` and removes the entry on success
    ///
    /// An expired entry is removed as well. A wrong code leaves the entry in
    /// place so the legitimate holder can still use it.
    ///
    /// # Errors
    ///
    /// - `OtpError::Missing` if no code is live for this email
    /// - `OtpError::Expired` if `now >= expires_at`
    /// - `OtpError::Mismatch` if the code is wrong
    pub fn consume(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let now = self.clock.now();
        let mut entries = self.entries();

        let entry = entries.get(email).ok_or(OtpError::Missing)?;

        if now >= entry.expires_at {
            entries.remove(email);
            return Err(OtpError::Expired);
        }

        if !verify_digest(code, &entry.code_digest) {
            return Err(OtpError::Mismatch);
        }

        entries.remove(email);
        Ok(())
    }

    /// Evicts every entry whose expiry has been reached; returns how many
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired-but-unswept ones included
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs [`OtpLedger::sweep`] every `every` until `shutdown` is cancelled
pub fn spawn_sweeper(
    ledger: Arc<OtpLedger>,
    every: std::time::Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "OTP sweeper started");

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("OTP sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = ledger.sweep();
                    if evicted > 0 {
                        debug!(evicted, remaining = ledger.len(), "Swept expired reset codes");
                    }
                }
            }
        }
    })
}
