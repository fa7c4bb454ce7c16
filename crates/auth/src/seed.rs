//! Bootstrap of the administrator account

use chrono::Duration;

use crate::{Account, AccountStore, AuthError, Clock, CredentialVerifier, Result, User};

/// Email of the built-in administrator
pub const DEFAULT_ADMIN_EMAIL: &str = "voxpromo@nexussofttech.com.br";

/// Premium granted to the administrator at seeding time
pub const ADMIN_PREMIUM_DAYS: i64 = 365;

/// Insert the administrator account if `email` is not registered yet.
///
/// Returns `None` when an account with that email already exists. Existing
/// accounts are never promoted.
pub async fn seed_admin(
    store: &dyn AccountStore,
    verifier: &dyn CredentialVerifier,
    clock: &dyn Clock,
    email: &str,
    secret: &str,
) -> Result<Option<User>> {
    if email.trim().is_empty() || secret.is_empty() {
        return Err(AuthError::InvalidInput(
            "admin email and password are required".to_string(),
        ));
    }

    if store.find_by_email(email).await?.is_some() {
        log::debug!("Admin account already present");
        return Ok(None);
    }

    let now = clock.now();
    let mut account = Account::new(email, verifier.hash(secret)?, now);
    account.is_admin = true;
    account.is_premium = true;
    account.premium_expires_at = Some(now + Duration::days(ADMIN_PREMIUM_DAYS));

    match store.insert(account).await {
        Ok(account) => {
            log::info!("Seeded admin account {}", account.id);
            Ok(Some(account.to_user()))
        }
        // lost a race with another seeder
        Err(crate::StoreError::DuplicateEmail(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
