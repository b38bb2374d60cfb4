//! Named-blob repository: the remote container holding every persisted file.
//!
//! Digests, the credential table and the activity table all live as named
//! blobs in a single container. Nothing is ever patched in place: a write is
//! "delete whatever carries this name, then create it again".

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub mod drive;
pub mod local;
pub mod memory;

pub use drive::DriveBlobRepository;
pub use local::LocalBlobRepository;
pub use memory::MemoryBlobRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobInfo {
    pub id: String,
    pub name: String,
}

/// Server-side name filter for [`BlobRepository::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    Exact(String),
    Contains(String),
}

impl NameFilter {
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(expected) => name == expected,
            Self::Contains(fragment) => name.contains(fragment.as_str()),
        }
    }
}

#[derive(Debug, Error)]
pub enum BlobError {
    /// Transport failure, timeout or a server-side error.
    #[error("Blob repository unavailable: {0}")]
    Unavailable(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The repository answered but refused the request (bad name, auth, quota).
    #[error("Blob repository rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait BlobRepository: Send + Sync {
    /// Identifier of the container every blob lives in.
    fn container(&self) -> &str;

    async fn list(&self, filter: Option<&NameFilter>) -> Result<Vec<BlobInfo>, BlobError>;

    async fn get(&self, id: &str) -> Result<Vec<u8>, BlobError>;

    /// Creates a new blob in the container and returns its id.
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<String, BlobError>;

    async fn delete(&self, id: &str) -> Result<(), BlobError>;

    /// First blob carrying exactly `name`.
    async fn find_by_name(&self, name: &str) -> Result<Option<BlobInfo>, BlobError> {
        let found = self
            .list(Some(&NameFilter::Exact(name.to_string())))
            .await?
            .into_iter()
            .find(|blob| blob.name == name);
        Ok(found)
    }

    /// Whole-file replace: removes every blob named `name`, then creates it anew.
    async fn replace(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let existing = self
            .list(Some(&NameFilter::Exact(name.to_string())))
            .await?;
        for blob in existing.iter().filter(|blob| blob.name == name) {
            match self.delete(&blob.id).await {
                Ok(()) | Err(BlobError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.put(name, bytes, content_type).await
    }
}
