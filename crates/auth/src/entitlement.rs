//! Entitlement engine
//!
//! Everything here is a pure function of an account snapshot and a point in
//! time. Nothing reads or writes a store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthError, User};

/// Free creations granted to a non-premium account
pub const MAX_FREE_CREATIONS: u32 = 5;

/// Length of one premium purchase
pub const PREMIUM_DURATION_DAYS: i64 = 29;

/// Remaining creations for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "count")]
pub enum Remaining {
    Unlimited,
    Limited(u32),
}

impl Remaining {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Remaining::Limited(0))
    }
}

/// Effective entitlement at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub is_premium: bool,
    pub remaining_free: Remaining,
    /// Premium expiry, only present while premium is effective
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    pub fn can_create(&self) -> bool {
        self.is_premium || !self.remaining_free.is_exhausted()
    }
}

/// Tunable limits for the entitlement engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementPolicy {
    pub max_free_creations: u32,
    pub premium_duration: Duration,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            max_free_creations: MAX_FREE_CREATIONS,
            premium_duration: Duration::days(PREMIUM_DURATION_DAYS),
        }
    }
}

impl EntitlementPolicy {
    pub fn with_max_free_creations(mut self, value: u32) -> Self {
        self.max_free_creations = value;
        self
    }

    pub fn with_premium_duration(mut self, value: Duration) -> Self {
        self.premium_duration = value;
        self
    }

    /// Derive the effective entitlement of `user` at `now`
    pub fn entitlement(&self, user: &User, now: DateTime<Utc>) -> Entitlement {
        let is_premium = user.is_premium && user.premium_expires_at.map_or(false, |at| at > now);

        if is_premium {
            Entitlement {
                is_premium,
                remaining_free: Remaining::Unlimited,
                expires_at: user.premium_expires_at,
            }
        } else {
            Entitlement {
                is_premium,
                remaining_free: Remaining::Limited(
                    self.max_free_creations.saturating_sub(user.creation_count),
                ),
                expires_at: None,
            }
        }
    }

    /// Gate a creation request; fails with `QuotaExceeded` when nothing is left
    pub fn check_creation(&self, user: &User, now: DateTime<Utc>) -> Result<Entitlement, AuthError> {
        let entitlement = self.entitlement(user, now);
        if entitlement.can_create() {
            Ok(entitlement)
        } else {
            Err(AuthError::QuotaExceeded {
                limit: self.max_free_creations,
            })
        }
    }

    /// Expiry granted by a purchase approved at `approved_at`
    pub fn premium_expiry(&self, approved_at: DateTime<Utc>) -> DateTime<Utc> {
        approved_at + self.premium_duration
    }
}

/// Entitlement under the default policy
pub fn entitlement(user: &User, now: DateTime<Utc>) -> Entitlement {
    EntitlementPolicy::default().entitlement(user, now)
}
