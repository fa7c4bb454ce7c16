//! Durable session tokens
//!
//! A session survives a reload because its token lives in a [`SessionSlot`].
//! The token itself is an HS256-signed claim set naming the account, so a
//! tampered or foreign slot value resolves to "anonymous" instead of to
//! somebody else's account.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{AccountId, AuthError};

/// Default lifetime of an issued session token
pub const SESSION_TOKEN_LIFETIME_DAYS: i64 = 30;

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens
pub struct SessionTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl SessionTokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime: Duration::days(SESSION_TOKEN_LIFETIME_DAYS),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Issue a token for `account` valid from `now`
    pub fn issue(&self, account: &AccountId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = SessionClaims {
            sub: account.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Verify a token and return the account it names.
    ///
    /// Expiry is checked against `now` rather than the system clock.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccountId, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| AuthError::Token(e.to_string()))?
            .claims;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AuthError::Token("invalid exp claim".to_string()))?;
        if expires_at <= now {
            return Err(AuthError::Token("session token expired".to_string()));
        }

        claims
            .sub
            .parse()
            .map_err(|_| AuthError::Token(format!("invalid subject {}", claims.sub)))
    }
}

/// Durable slot holding the current session token
#[async_trait]
pub trait SessionSlot: Send + Sync {
    async fn load(&self) -> Result<Option<String>, AuthError>;

    async fn store(&self, token: &str) -> Result<(), AuthError>;

    /// Remove the token. Clearing an empty slot is not an error.
    async fn clear(&self) -> Result<(), AuthError>;
}

/// Slot scoped to the current process
#[derive(Debug, Default)]
pub struct MemorySessionSlot {
    token: Mutex<Option<String>>,
}

impl MemorySessionSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionSlot for MemorySessionSlot {
    async fn load(&self) -> Result<Option<String>, AuthError> {
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn store(&self, token: &str) -> Result<(), AuthError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SlotFile {
    token: String,
}

/// Slot persisted to a JSON file, surviving process restarts
#[derive(Debug, Clone)]
pub struct FileSessionSlot {
    path: PathBuf,
}

impl FileSessionSlot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionSlot for FileSessionSlot {
    async fn load(&self) -> Result<Option<String>, AuthError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Transient(e.to_string())),
        };

        match serde_json::from_slice::<SlotFile>(&raw) {
            Ok(file) => Ok(Some(file.token)),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable session file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn store(&self, token: &str) -> Result<(), AuthError> {
        let body = serde_json::to_vec(&SlotFile {
            token: token.to_string(),
        })
        .map_err(|e| AuthError::Token(e.to_string()))?;

        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| AuthError::Transient(e.to_string()))
    }

    async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Transient(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_token_names_account() {
        let codec = SessionTokenCodec::new(b"test-secret");
        let account = AccountId::new();

        let token = codec.issue(&account, now()).unwrap();

        assert_eq!(codec.verify(&token, now()).unwrap(), account);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = SessionTokenCodec::new(b"secret-a");
        let verifier = SessionTokenCodec::new(b"secret-b");
        let token = issuer.issue(&AccountId::new(), now()).unwrap();

        assert!(matches!(
            verifier.verify(&token, now()),
            Err(AuthError::Token(_))
        ));
        assert!(verifier.verify("not-a-token", now()).is_err());
    }

    #[test]
    fn test_token_expiry_uses_supplied_time() {
        let codec = SessionTokenCodec::new(b"test-secret").with_lifetime(Duration::hours(1));
        let token = codec.issue(&AccountId::new(), now()).unwrap();

        assert!(codec.verify(&token, now() + Duration::minutes(59)).is_ok());
        assert!(codec.verify(&token, now() + Duration::hours(1)).is_err());
    }

    #[tokio::test]
    async fn test_memory_slot() {
        let slot = MemorySessionSlot::new();
        assert_eq!(slot.load().await.unwrap(), None);

        slot.store("abc").await.unwrap();
        assert_eq!(slot.load().await.unwrap(), Some("abc".to_string()));

        slot.clear().await.unwrap();
        slot.clear().await.unwrap();
        assert_eq!(slot.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_slot_survives_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        FileSessionSlot::new(&path).store("abc").await.unwrap();
        let reopened = FileSessionSlot::new(&path);
        assert_eq!(reopened.load().await.unwrap(), Some("abc".to_string()));

        reopened.clear().await.unwrap();
        reopened.clear().await.unwrap();
        assert_eq!(reopened.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_slot_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert_eq!(FileSessionSlot::new(&path).load().await.unwrap(), None);
    }
}
