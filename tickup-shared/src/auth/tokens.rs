/// One-time secrets: invite tokens and password reset codes
///
/// # Formats
///
/// - **Invite token**: 20 random bytes, hex-encoded (40 lowercase hex chars).
///   Embedded in signup links and stored alongside the pending invite.
/// - **Reset code**: six decimal digits, never starting with zero, so it reads
///   the same whether treated as a number or a string.
///
/// Reset codes are never stored in the clear; the OTP ledger keeps a SHA-256
/// digest and checks submissions with [`constant_time_compare`].
///
/// # Example
///
/// ```
/// use tickup_shared::auth::tokens::{digest, generate_invite_token, generate_otp_code, verify_digest};
///
/// let token = generate_invite_token();
/// assert_eq!(token.len(), 40);
///
/// let code = generate_otp_code();
/// let stored = digest(&code);
/// assert!(verify_digest(&code, &stored));
/// ```

use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

/// Random bytes in an invite token
pub const INVITE_TOKEN_BYTES: usize = 20;

/// Digits in a password reset code
pub const OTP_DIGITS: usize = 6;

/// Generates an invite token
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; INVITE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a six-digit reset code in `100000..=999999`
pub fn generate_otp_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

/// Whether a submitted reset code is well-formed
pub fn is_otp_format(code: &str) -> bool {
    code.len() == OTP_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

/// SHA-256 of a secret, hex-encoded
pub fn digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Checks a plaintext secret against a stored digest
pub fn verify_digest(secret: &str, stored_digest: &str) -> bool {
    constant_time_compare(&digest(secret), stored_digest)
}

/// Compares two strings without short-circuiting on the first mismatch
///
/// Length is not secret here (both sides are fixed-length digests).
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
