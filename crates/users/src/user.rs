//! Application user (identity record).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kluster_core::{Entity, Role, UserId};

use crate::lockout::LockoutPolicy;
use crate::otp::PendingOtp;

/// A registered account.
///
/// # Invariants
/// - `email` is unique across users, compared case-insensitively
///   (see [`normalize_email`]).
/// - `access_failed_count` resets to zero on a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub password_hash: String,
    pub email_confirmed: bool,
    pub lockout_enabled: bool,
    pub access_failed_count: u32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub pending_otp: Option<PendingOtp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for ApplicationUser {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

/// Canonical form used for uniqueness checks and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl ApplicationUser {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone_number: Option<String>,
        role: Role,
        password_hash: String,
        lockout: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            phone_number,
            role,
            password_hash,
            email_confirmed: false,
            lockout_enabled: lockout.allowed_for_new_users,
            access_failed_count: 0,
            lockout_end: None,
            pending_otp: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }

    /// Count a failed sign-in; locks the account once the policy limit is hit.
    /// Returns `true` when this failure triggered a lockout.
    pub fn record_failed_access(&mut self, policy: &LockoutPolicy, now: DateTime<Utc>) -> bool {
        if !self.lockout_enabled {
            return false;
        }
        self.access_failed_count += 1;
        self.updated_at = now;
        if self.access_failed_count >= policy.max_failed_attempts {
            self.lockout_end = Some(now + policy.lockout_duration);
            self.access_failed_count = 0;
            return true;
        }
        false
    }

    pub fn reset_access_failed(&mut self, now: DateTime<Utc>) {
        if self.access_failed_count != 0 || self.lockout_end.is_some() {
            self.access_failed_count = 0;
            self.lockout_end = None;
            self.updated_at = now;
        }
    }

    pub fn confirm_email(&mut self, now: DateTime<Utc>) {
        self.email_confirmed = true;
        self.pending_otp = None;
        self.updated_at = now;
    }
}
