//! Blob-repository implementation of the `DigestService` trait.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blob::{BlobError, BlobInfo, BlobRepository, NameFilter};
use crate::models::digest::{PDF_CONTENT_TYPE, looks_like_pdf};
use crate::models::{Digest, DigestNaming};
use crate::services::auth_service::Session;
use crate::services::digest_service::{DigestError, DigestService, OpenedDigest};
use crate::store::ActivityLogStore;

pub struct BlobDigestService {
    repo: Arc<dyn BlobRepository>,
    activity: Arc<ActivityLogStore>,
    naming: DigestNaming,
}

impl BlobDigestService {
    #[must_use]
    pub fn new(
        repo: Arc<dyn BlobRepository>,
        activity: Arc<ActivityLogStore>,
        naming: DigestNaming,
    ) -> Self {
        Self {
            repo,
            activity,
            naming,
        }
    }

    const fn require_admin(session: &Session) -> Result<(), DigestError> {
        if session.is_administrator {
            Ok(())
        } else {
            Err(DigestError::Forbidden)
        }
    }

    async fn find(&self, date: NaiveDate) -> Result<Option<BlobInfo>, DigestError> {
        let name = self.naming.file_name(date);
        Ok(self.repo.find_by_name(&name).await?)
    }
}

fn to_digest(blob: BlobInfo, date: NaiveDate) -> Digest {
    Digest {
        id: blob.id,
        name: blob.name,
        date,
    }
}

#[async_trait]
impl DigestService for BlobDigestService {
    async fn list(&self) -> Result<Vec<Digest>, DigestError> {
        let filter = NameFilter::Contains(self.naming.prefix().to_string());
        let blobs = self.repo.list(Some(&filter)).await?;

        let mut seen = HashSet::new();
        let mut digests: Vec<Digest> = blobs
            .into_iter()
            .filter_map(|blob| {
                let date = self.naming.parse(&blob.name)?;
                seen.insert(blob.name.clone())
                    .then(|| to_digest(blob, date))
            })
            .collect();

        digests.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(digests)
    }

    async fn open(&self, session: &Session, date: NaiveDate) -> Result<OpenedDigest, DigestError> {
        let blob = self.find(date).await?.ok_or(DigestError::NotFound(date))?;
        let bytes = self.repo.get(&blob.id).await.map_err(|e| match e {
            BlobError::NotFound(_) => DigestError::NotFound(date),
            other => other.into(),
        })?;

        let view_recorded = match self
            .activity
            .append(&session.username, &blob.name, Local::now().naive_local())
            .await
        {
            Ok(outcome) => {
                if let Some(reason) = outcome.recovered {
                    warn!(reason = %reason, "Activity log was unreadable and has been restarted");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, username = %session.username, digest = %blob.name, "Failed to record digest view");
                false
            }
        };
        metrics::counter!("digest_views_total").increment(1);

        Ok(OpenedDigest {
            digest: to_digest(blob, date),
            bytes,
            view_recorded,
        })
    }

    async fn upload(
        &self,
        session: &Session,
        date: NaiveDate,
        bytes: Vec<u8>,
    ) -> Result<Digest, DigestError> {
        Self::require_admin(session)?;
        if !looks_like_pdf(&bytes) {
            return Err(DigestError::Validation(
                "Uploaded file is not a PDF".to_string(),
            ));
        }

        let name = self.naming.file_name(date);
        let size = bytes.len();
        let id = self.repo.replace(&name, bytes, PDF_CONTENT_TYPE).await?;

        info!(digest = %name, size, by = %session.username, "Digest uploaded");
        Ok(Digest { id, name, date })
    }

    async fn delete(&self, session: &Session, date: NaiveDate) -> Result<(), DigestError> {
        Self::require_admin(session)?;
        let blob = self.find(date).await?.ok_or(DigestError::NotFound(date))?;
        self.repo.delete(&blob.id).await?;
        info!(digest = %blob.name, by = %session.username, "Digest deleted");
        Ok(())
    }

    async fn rename(
        &self,
        session: &Session,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Digest, DigestError> {
        Self::require_admin(session)?;
        if from == to {
            return Err(DigestError::Validation(
                "Source and target dates are the same".to_string(),
            ));
        }

        let source = self.find(from).await?.ok_or(DigestError::NotFound(from))?;
        if self.find(to).await?.is_some() {
            return Err(DigestError::Conflict(to));
        }

        // The repository has no rename: copy under the new name, then drop the old blob.
        let bytes = self.repo.get(&source.id).await?;
        let name = self.naming.file_name(to);
        let id = self.repo.put(&name, bytes, PDF_CONTENT_TYPE).await?;
        self.repo.delete(&source.id).await?;

        info!(from = %source.name, to = %name, by = %session.username, "Digest renamed");
        Ok(Digest { id, name, date: to })
    }
}
