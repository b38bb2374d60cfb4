//! Flat-file record stores layered on the blob repository.
//!
//! Every operation is a whole-table round trip: fetch the blob, decode it,
//! change it in memory, encode it and replace the blob. No lock is held
//! across that cycle and no version is checked, so concurrent writers race
//! and the last one to finish wins.

use thiserror::Error;

use crate::blob::BlobError;

pub mod activity;
pub mod credentials;
pub mod table;

pub use activity::{ActivityLogStore, AppendOutcome};
pub use credentials::CredentialStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Refused before anything was written.
    #[error("Refused: {0}")]
    GuardRejected(String),

    #[error("Account '{0}' already exists")]
    AlreadyExists(String),

    #[error("Table '{blob}' is corrupt: {reason}")]
    Corrupt { blob: String, reason: String },

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl From<BlobError> for StoreError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unavailable(msg) => Self::Unavailable(msg),
            BlobError::NotFound(msg) => Self::Unavailable(format!("blob vanished: {msg}")),
            BlobError::Rejected(msg) => Self::Unavailable(format!("request rejected: {msg}")),
        }
    }
}

pub(crate) const CSV_CONTENT_TYPE: &str = "text/csv";
