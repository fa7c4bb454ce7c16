//! Credential hashing and verification

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::AuthError;

/// Turns secrets into stored verifiers and checks them back
pub trait CredentialVerifier: Send + Sync {
    /// Hash a secret into a storable verifier
    fn hash(&self, secret: &str) -> Result<String, AuthError>;

    /// Check a secret against a stored verifier. Malformed verifiers never match.
    fn verify(&self, secret: &str, verifier: &str) -> bool;

    /// Spend the same effort as a real verification without a stored verifier,
    /// so unknown emails cost as much as wrong passwords.
    fn verify_dummy(&self, secret: &str);
}

/// Argon2id verifier with random per-secret salts
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
    dummy: String,
}

impl Argon2Verifier {
    /// Verifier with the library's recommended Argon2id parameters
    pub fn new() -> Result<Self, AuthError> {
        Self::from_argon2(Argon2::default())
    }

    /// Verifier with explicit cost parameters (memory in KiB, iterations, lanes)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AuthError::Credential(e.to_string()))?;
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Result<Self, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let dummy = argon2
            .hash_password(b"voxpromo-dummy-credential", &salt)
            .map_err(|e| AuthError::Credential(e.to_string()))?
            .to_string();
        Ok(Self { argon2, dummy })
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Credential(e.to_string()))
    }

    fn verify(&self, secret: &str, verifier: &str) -> bool {
        match PasswordHash::new(verifier) {
            Ok(parsed) => self
                .argon2
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                log::warn!("Stored credential verifier is malformed: {}", e);
                false
            }
        }
    }

    fn verify_dummy(&self, secret: &str) {
        let _ = self.verify(secret, &self.dummy);
    }
}
