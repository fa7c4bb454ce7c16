//! Accounts, sessions and entitlements for VoxPromo
//!
//! This crate owns everything that decides who the current user is and what
//! they are allowed to do: the account store contract, credential hashing,
//! the durable session token, the pure entitlement engine and the
//! [`SessionManager`] that ties them together.

mod account;
mod clock;
mod credentials;
mod entitlement;
mod seed;
mod session;
mod store;
mod sweep;
mod token;

use thiserror::Error;

pub use account::*;
pub use clock::*;
pub use credentials::*;
pub use entitlement::*;
pub use seed::*;
pub use session::*;
pub use store::*;
pub use sweep::*;
pub use token::*;

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Free creation limit of {limit} reached")]
    QuotaExceeded { limit: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Session token error: {0}")]
    Token(String),
}

impl AuthError {
    /// Whether the caller should offer "try again" rather than "fix your input".
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transient(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => AuthError::EmailInUse,
            StoreError::NotFound(id) => AuthError::NotFound(id),
            StoreError::Conflict(id) => {
                AuthError::Transient(format!("concurrent update of account {}", id))
            }
            StoreError::Unavailable(msg) => AuthError::Transient(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
