//! Per-account ad history for VoxPromo

mod artifact;
mod store;

use thiserror::Error;

pub use artifact::{AdArtifact, AdConfig, ArtifactId};
pub use store::{HistoryStore, MemoryHistoryStore};

/// エラー型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Artifact not found: {0}")]
    NotFound(ArtifactId),

    #[error("Artifact already exists: {0}")]
    Duplicate(ArtifactId),

    #[error("History store unavailable: {0}")]
    Unavailable(String),
}

impl HistoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, HistoryError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
