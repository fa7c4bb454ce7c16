//! Session manager
//!
//! Resolves the current user from the durable session token, handles
//! registration, login and logout, and is the only path through which
//! account entitlement state is mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    Account, AccountId, AccountStore, Argon2Verifier, AuthError, Clock, CredentialVerifier,
    Entitlement, EntitlementPolicy, Result, SessionSlot, SessionTokenCodec, StoreError,
    SystemClock, User,
};

/// Attempts at a read-modify-write before giving up on a contended account
const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Reply to a password reset request. Identical whether or not the email exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetAck {
    pub message: String,
}

impl Default for PasswordResetAck {
    fn default() -> Self {
        Self {
            message: "If an account exists for this email, password reset instructions will be sent."
                .to_string(),
        }
    }
}

/// Result of applying a premium purchase to an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiumGrant {
    pub user: User,
    /// False when this payment had already been applied
    pub applied: bool,
}

/// Session manager
pub struct SessionManager {
    store: Arc<dyn AccountStore>,
    slot: Arc<dyn SessionSlot>,
    verifier: Arc<dyn CredentialVerifier>,
    tokens: SessionTokenCodec,
    clock: Arc<dyn Clock>,
    policy: EntitlementPolicy,
}

impl SessionManager {
    /// Create a session manager with an Argon2id verifier, the system clock
    /// and the default entitlement policy
    pub fn new(
        store: Arc<dyn AccountStore>,
        slot: Arc<dyn SessionSlot>,
        token_secret: &[u8],
    ) -> Result<Self> {
        Ok(Self {
            store,
            slot,
            verifier: Arc::new(Argon2Verifier::new()?),
            tokens: SessionTokenCodec::new(token_secret),
            clock: Arc::new(SystemClock),
            policy: EntitlementPolicy::default(),
        })
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: EntitlementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_token_codec(mut self, tokens: SessionTokenCodec) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn policy(&self) -> &EntitlementPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn verifier(&self) -> &Arc<dyn CredentialVerifier> {
        &self.verifier
    }

    /// Register a new account and log it in
    pub async fn register(&self, email: &str, secret: &str) -> Result<User> {
        let email = validate_email(email)?;
        if secret.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }

        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let hash = self.hash_secret(secret).await?;
        let account = self
            .store
            .insert(Account::new(email, hash, self.clock.now()))
            .await?;

        self.establish(&account.id).await?;
        log::info!("Registered account {}", account.id);
        Ok(account.to_user())
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, secret: &str) -> Result<User> {
        let email = validate_email(email)?;
        if secret.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }

        let found = self.store.find_by_email(email).await?;
        let stored_hash = found.as_ref().map(|account| account.credential_hash.clone());
        let matched = self.check_secret(secret, stored_hash).await?;
        let account = match found {
            Some(account) if matched => account,
            _ => return Err(AuthError::InvalidCredentials),
        };

        // The session only exists once the lapsed flag is persisted
        let account = self.expire_if_lapsed(account).await?;
        self.establish(&account.id).await?;
        log::info!("Account {} logged in", account.id);
        Ok(account.to_user())
    }

    /// Clear the current session. Logging out twice is a no-op.
    pub async fn logout(&self) -> Result<()> {
        self.slot.clear().await?;
        log::debug!("Session cleared");
        Ok(())
    }

    /// Resolve the current user, or `None` when anonymous.
    ///
    /// A lapsed premium flag is turned off and persisted before the user is
    /// returned.
    pub async fn current_user(&self) -> Result<Option<User>> {
        Ok(self
            .current_account()
            .await?
            .map(|account| account.to_user()))
    }

    /// Acknowledge a password reset request without revealing whether the
    /// email belongs to an account
    pub async fn reset_password_request(&self, email: &str) -> Result<PasswordResetAck> {
        let email = validate_email(email)?;
        if self.store.find_by_email(email).await?.is_some() {
            log::info!("Password reset requested for an existing account");
        } else {
            log::debug!("Password reset requested for an unknown email");
        }
        Ok(PasswordResetAck::default())
    }

    /// Entitlement of the current user, `None` when anonymous
    pub async fn entitlement(&self) -> Result<Option<Entitlement>> {
        let now = self.clock.now();
        Ok(self
            .current_user()
            .await?
            .map(|user| self.policy.entitlement(&user, now)))
    }

    /// Check that the current user may create one more ad
    pub async fn authorize_creation(&self) -> Result<(User, Entitlement)> {
        let user = self
            .current_user()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;
        let entitlement = self.policy.check_creation(&user, self.clock.now())?;
        Ok((user, entitlement))
    }

    /// Count one creation against `account`, the id returned by
    /// [`authorize_creation`](Self::authorize_creation). The current session
    /// is not consulted, so a login switch in between cannot move the count.
    pub async fn record_creation(&self, account: &AccountId) -> Result<User> {
        let account = self.store.increment_creation_count(account).await?;
        log::info!(
            "Creation count for account {} is now {}",
            account.id,
            account.creation_count
        );
        Ok(account.to_user())
    }

    /// Apply a premium purchase approved at `approved_at` to the current user.
    ///
    /// Applying the same `payment_id` twice leaves the account untouched, and
    /// an expiry is only ever moved forward.
    pub async fn grant_premium(
        &self,
        payment_id: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<PremiumGrant> {
        let id = self.current_account_id().await?;
        let expires_at = self.policy.premium_expiry(approved_at);
        let payment_id = payment_id.to_string();

        let mut applied = false;
        let account = self
            .modify_account(&id, |account| {
                applied = account.applied_payments.insert(payment_id.clone());
                if !applied {
                    return false;
                }
                account.is_premium = true;
                account.premium_expires_at = Some(match account.premium_expires_at {
                    Some(current) if current > expires_at => current,
                    _ => expires_at,
                });
                true
            })
            .await?;

        if applied {
            log::info!(
                "Premium activated for account {} until {:?} (payment {})",
                account.id,
                account.premium_expires_at,
                payment_id
            );
        } else {
            log::info!(
                "Payment {} already applied to account {}",
                payment_id,
                account.id
            );
        }

        Ok(PremiumGrant {
            user: account.to_user(),
            applied,
        })
    }

    async fn hash_secret(&self, secret: &str) -> Result<String> {
        let verifier = Arc::clone(&self.verifier);
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || verifier.hash(&secret))
            .await
            .map_err(|e| AuthError::Credential(e.to_string()))?
    }

    /// Verify on the blocking pool; `None` burns a dummy verification
    async fn check_secret(&self, secret: &str, stored_hash: Option<String>) -> Result<bool> {
        let verifier = Arc::clone(&self.verifier);
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verifier.verify(&secret, &hash),
            None => {
                verifier.verify_dummy(&secret);
                false
            }
        })
        .await
        .map_err(|e| AuthError::Credential(e.to_string()))
    }

    /// Resolve the current account record, applying lazy expiration
    pub(crate) async fn current_account(&self) -> Result<Option<Account>> {
        let id = match self.session_account_id().await? {
            Some(id) => id,
            None => return Ok(None),
        };

        match self.store.find_by_id(&id).await? {
            Some(account) => Ok(Some(self.expire_if_lapsed(account).await?)),
            None => {
                log::warn!("Session refers to missing account {}; clearing it", id);
                self.slot.clear().await?;
                Ok(None)
            }
        }
    }

    async fn current_account_id(&self) -> Result<AccountId> {
        self.session_account_id()
            .await?
            .ok_or(AuthError::NotAuthenticated)
    }

    async fn session_account_id(&self) -> Result<Option<AccountId>> {
        let token = match self.slot.load().await? {
            Some(token) => token,
            None => return Ok(None),
        };

        match self.tokens.verify(&token, self.clock.now()) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                log::warn!("Discarding invalid session token: {}", e);
                self.slot.clear().await?;
                Ok(None)
            }
        }
    }

    async fn establish(&self, id: &AccountId) -> Result<()> {
        let token = self.tokens.issue(id, self.clock.now())?;
        self.slot.store(&token).await
    }

    async fn expire_if_lapsed(&self, account: Account) -> Result<Account> {
        let now = self.clock.now();
        if !account.premium_lapsed(now) {
            return Ok(account);
        }

        let id = account.id;
        let updated = self
            .modify_account(&id, |account| {
                if !account.premium_lapsed(now) {
                    return false;
                }
                account.is_premium = false;
                account.premium_expires_at = None;
                true
            })
            .await?;
        log::info!("Premium expired for account {}; deactivated", id);
        Ok(updated)
    }

    /// Read-modify-write with optimistic retries. `change` returns whether it
    /// modified the account; unchanged accounts are not written back.
    async fn modify_account<F>(&self, id: &AccountId, mut change: F) -> Result<Account>
    where
        F: FnMut(&mut Account) -> bool,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut account = self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| AuthError::NotFound(id.to_string()))?;

            if !change(&mut account) {
                return Ok(account);
            }

            match self.store.update(account).await {
                Ok(updated) => return Ok(updated),
                Err(StoreError::Conflict(_)) => {
                    log::debug!(
                        "Write conflict on account {} (attempt {}/{})",
                        id,
                        attempt,
                        MAX_UPDATE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::Transient(format!(
            "account {} is being modified concurrently",
            id
        )))
    }
}

fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::InvalidInput("email is required".to_string()));
    }
    Ok(email)
}
