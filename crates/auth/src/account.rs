//! Account records and their public view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque account identifier, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Durable account record as held by an [`AccountStore`](crate::AccountStore)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,

    /// Uniqueness key, compared case-sensitively
    pub email: String,

    /// PHC-formatted credential hash
    pub credential_hash: String,

    /// Cached premium flag; can be stale past `premium_expires_at`
    pub is_premium: bool,

    pub premium_expires_at: Option<DateTime<Utc>>,

    pub creation_count: u32,

    pub is_admin: bool,

    /// Payment ids whose premium grant has already been applied. One entry
    /// per approved purchase; it is what makes repeated reconciliations of
    /// the same payment a no-op, so entries are never pruned.
    #[serde(default)]
    pub applied_payments: BTreeSet<String>,

    pub created_at: DateTime<Utc>,

    /// Bumped by the store on every successful write
    #[serde(default)]
    pub version: u64,
}

impl Account {
    /// Build a fresh, non-premium account
    pub fn new(email: &str, credential_hash: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new(),
            email: email.to_string(),
            credential_hash,
            is_premium: false,
            premium_expires_at: None,
            creation_count: 0,
            is_admin: false,
            applied_payments: BTreeSet::new(),
            created_at,
            version: 0,
        }
    }

    /// Premium flag set but the expiry is missing or already reached
    pub fn premium_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expires_at.map_or(true, |at| at <= now)
    }

    /// Credential-free view handed out to callers
    pub fn to_user(&self) -> User {
        User::from(self)
    }
}

/// Account data with credential fields stripped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: AccountId,
    pub email: String,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub creation_count: u32,
    pub is_admin: bool,
}

impl From<&Account> for User {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_premium: account.is_premium,
            premium_expires_at: account.premium_expires_at,
            creation_count: account.creation_count,
            is_admin: account.is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_user_serialization_omits_credentials() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let account = Account::new("ana@example.com", "$argon2id$secret".to_string(), now);

        let json = serde_json::to_value(account.to_user()).unwrap();

        assert_eq!(json["email"], "ana@example.com");
        assert_eq!(json["isPremium"], false);
        assert!(json.get("credentialHash").is_none());
        assert!(json.get("credential_hash").is_none());
    }

    #[test]
    fn test_premium_lapsed() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut account = Account::new("ana@example.com", String::new(), now);
        assert!(!account.premium_lapsed(now));

        account.is_premium = true;
        account.premium_expires_at = Some(now + Duration::days(1));
        assert!(!account.premium_lapsed(now));

        account.premium_expires_at = Some(now);
        assert!(account.premium_lapsed(now));

        account.premium_expires_at = None;
        assert!(account.premium_lapsed(now));
    }

    #[test]
    fn test_account_id_round_trips_through_str() {
        let id = AccountId::new();
        let parsed: AccountId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
