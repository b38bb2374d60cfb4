//! Domain service for the digest archive.

use chrono::NaiveDate;
use thiserror::Error;

use crate::blob::BlobError;
use crate::models::Digest;
use crate::services::auth_service::Session;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Administrator rights required")]
    Forbidden,

    #[error("No digest for {0}")]
    NotFound(NaiveDate),

    #[error("A digest for {0} already exists")]
    Conflict(NaiveDate),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Archive unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<BlobError> for DigestError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unavailable(msg) | BlobError::NotFound(msg) => Self::StoreUnavailable(msg),
            BlobError::Rejected(msg) => Self::Validation(msg),
        }
    }
}

/// A digest fetched for reading.
#[derive(Debug, Clone)]
pub struct OpenedDigest {
    pub digest: Digest,
    pub bytes: Vec<u8>,
    /// Whether the view made it into the activity log.
    pub view_recorded: bool,
}

#[async_trait::async_trait]
pub trait DigestService: Send + Sync {
    /// Every digest in the archive, newest first.
    async fn list(&self) -> Result<Vec<Digest>, DigestError>;

    /// Fetches the digest for `date` and records the view.
    ///
    /// A failure to record the view is logged and never blocks reading.
    async fn open(&self, session: &Session, date: NaiveDate) -> Result<OpenedDigest, DigestError>;

    /// Stores `bytes` as the digest for `date`, replacing any existing one.
    async fn upload(
        &self,
        session: &Session,
        date: NaiveDate,
        bytes: Vec<u8>,
    ) -> Result<Digest, DigestError>;

    async fn delete(&self, session: &Session, date: NaiveDate) -> Result<(), DigestError>;

    /// Moves a digest to another date.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Conflict`] if `to` already has a digest.
    async fn rename(
        &self,
        session: &Session,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Digest, DigestError>;
}
