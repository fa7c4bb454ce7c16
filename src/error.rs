//! Error handling for VoxPromo

use std::fmt;
use thiserror::Error;

use voxpromo_auth::AuthError;
use voxpromo_generation::GenerationError;
use voxpromo_history::{ArtifactId, HistoryError};
use voxpromo_payments::PaymentError;

/// Unified error type for VoxPromo
#[derive(Error, Debug)]
pub enum Error {
    /// Account, session and entitlement errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout errors
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Script or speech generation errors
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// History store errors
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The artifact was stored but the creation counter could not be
    /// incremented
    #[error("Creation {artifact_id} was saved but not counted: {source}")]
    CreationNotRecorded {
        artifact_id: ArtifactId,
        source: AuthError,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Auth(err) => err.is_transient(),
            Error::Payment(err) => err.is_transient(),
            Error::Generation(err) => err.is_transient(),
            Error::History(err) => err.is_transient(),
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            Error::CreationNotRecorded { source, .. } => source.is_transient(),
            Error::Url(_) | Error::Config(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
