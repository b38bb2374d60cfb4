use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BlobError, BlobInfo, BlobRepository, NameFilter};

struct StoredBlob {
    id: String,
    name: String,
    bytes: Vec<u8>,
    content_type: String,
    seq: u64,
}

/// In-process repository used by tests and the `memory` storage backend.
///
/// Can be taken offline to exercise the unavailable-store paths.
pub struct MemoryBlobRepository {
    container: String,
    blobs: RwLock<Vec<StoredBlob>>,
    online: AtomicBool,
    next_seq: AtomicU64,
}

impl MemoryBlobRepository {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blobs: RwLock::new(Vec::new()),
            online: AtomicBool::new(true),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn content_type_of(&self, id: &str) -> Option<String> {
        self.blobs
            .read()
            .await
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.content_type.clone())
    }

    fn ensure_online(&self) -> Result<(), BlobError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BlobError::Unavailable(format!(
                "container '{}' is offline",
                self.container
            )))
        }
    }
}

#[async_trait]
impl BlobRepository for MemoryBlobRepository {
    fn container(&self) -> &str {
        &self.container
    }

    async fn list(&self, filter: Option<&NameFilter>) -> Result<Vec<BlobInfo>, BlobError> {
        self.ensure_online()?;
        let blobs = self.blobs.read().await;
        let mut matching: Vec<&StoredBlob> = blobs
            .iter()
            .filter(|b| filter.is_none_or(|f| f.matches(&b.name)))
            .collect();
        matching.sort_by_key(|b| b.seq);
        Ok(matching
            .into_iter()
            .map(|b| BlobInfo {
                id: b.id.clone(),
                name: b.name.clone(),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BlobError> {
        self.ensure_online()?;
        self.blobs
            .read()
            .await
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| BlobError::NotFound(id.to_string()))
    }

    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        self.ensure_online()?;
        if name.is_empty() {
            return Err(BlobError::Rejected("blob name must not be empty".to_string()));
        }
        let id = Uuid::new_v4().to_string();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.blobs.write().await.push(StoredBlob {
            id: id.clone(),
            name: name.to_string(),
            bytes,
            content_type: content_type.to_string(),
            seq,
        });
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), BlobError> {
        self.ensure_online()?;
        let mut blobs = self.blobs.write().await;
        let before = blobs.len();
        blobs.retain(|b| b.id != id);
        if blobs.len() == before {
            return Err(BlobError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_list_get_delete() {
        let repo = MemoryBlobRepository::new("test");
        let a = repo.put("a.csv", b"one".to_vec(), "text/csv").await.unwrap();
        let b = repo.put("b.pdf", b"two".to_vec(), "application/pdf").await.unwrap();

        let all = repo.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "a.csv");

        let pdfs = repo
            .list(Some(&NameFilter::Contains(".pdf".to_string())))
            .await
            .unwrap();
        assert_eq!(pdfs, vec![BlobInfo { id: b.clone(), name: "b.pdf".to_string() }]);

        assert_eq!(repo.get(&a).await.unwrap(), b"one");
        assert_eq!(repo.content_type_of(&b).await.as_deref(), Some("application/pdf"));

        repo.delete(&a).await.unwrap();
        assert!(matches!(repo.get(&a).await, Err(BlobError::NotFound(_))));
        assert!(matches!(repo.delete(&a).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn replace_keeps_a_single_blob_per_name() {
        let repo = MemoryBlobRepository::new("test");
        repo.put("t.csv", b"v1".to_vec(), "text/csv").await.unwrap();
        repo.put("t.csv", b"v1-dup".to_vec(), "text/csv").await.unwrap();

        let id = repo.replace("t.csv", b"v2".to_vec(), "text/csv").await.unwrap();

        let found = repo.find_by_name("t.csv").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(repo.list(None).await.unwrap().len(), 1);
        assert_eq!(repo.get(&id).await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn offline_repository_is_unavailable() {
        let repo = MemoryBlobRepository::new("test");
        repo.set_online(false);
        assert!(matches!(repo.list(None).await, Err(BlobError::Unavailable(_))));
        repo.set_online(true);
        assert!(repo.list(None).await.unwrap().is_empty());
    }
}
