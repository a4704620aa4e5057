//! One-time passwords for email confirmation.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::password::{HashError, hash_secret, verify_secret};

/// How long an issued code stays valid.
pub const OTP_LIFETIME_MINUTES: i64 = 10;

/// A code waiting to be redeemed. Only the hash is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOtp {
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingOtp {
    /// Generate a fresh six-digit code. Returns the plain code (to be mailed)
    /// and the pending record to store.
    pub fn issue(now: DateTime<Utc>) -> Result<(String, Self), HashError> {
        let code = generate_code();
        let pending = Self {
            code_hash: hash_secret(&code)?,
            expires_at: now + Duration::minutes(OTP_LIFETIME_MINUTES),
        };
        Ok((code, pending))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn matches(&self, code: &str, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && verify_secret(code.trim(), &self.code_hash)
    }
}

fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}
