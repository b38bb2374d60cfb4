use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::blob::drive::DriveConfig;
use crate::blob::{BlobRepository, DriveBlobRepository, LocalBlobRepository, MemoryBlobRepository};
use crate::config::{Config, StorageBackend};
use crate::models::DigestNaming;
use crate::password::{Argon2Hasher, CredentialHasher};
use crate::services::{
    AccountService, AuthService, BlobAccountService, BlobAuthService, BlobDigestService,
    DigestService, StatsService,
};
use crate::store::{ActivityLogStore, CredentialStore};

/// Opens the blob container selected by `[storage]`.
pub fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn BlobRepository>> {
    let storage = &config.storage;
    let repo: Arc<dyn BlobRepository> = match storage.backend {
        StorageBackend::Memory => Arc::new(MemoryBlobRepository::new(&storage.container)),
        StorageBackend::Local => Arc::new(LocalBlobRepository::new(
            Path::new(&storage.local_root),
            &storage.container,
        )),
        StorageBackend::Drive => {
            let access_token = storage
                .drive_access_token
                .clone()
                .context("Drive backend selected but no access token configured")?;
            Arc::new(
                DriveBlobRepository::new(DriveConfig {
                    api_base: storage.drive_api_base.clone(),
                    access_token,
                    folder_name: storage.container.clone(),
                    timeout_seconds: storage.request_timeout_seconds,
                })
                .map_err(|e| anyhow::anyhow!("Failed to set up Drive client: {e}"))?,
            )
        }
    };

    info!(backend = ?storage.backend, container = %repo.container(), "Blob repository ready");
    Ok(repo)
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub repo: Arc<dyn BlobRepository>,

    pub credentials: Arc<CredentialStore>,

    pub activity: Arc<ActivityLogStore>,

    pub auth_service: Arc<dyn AuthService>,

    pub account_service: Arc<dyn AccountService>,

    pub digest_service: Arc<dyn DigestService>,

    pub stats_service: Arc<StatsService>,
}

impl SharedState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let repo = build_repository(&config)?;
        Self::with_repository(config, repo)
    }

    /// Wires every store and service over an already opened repository.
    pub fn with_repository(
        config: Config,
        repo: Arc<dyn BlobRepository>,
    ) -> anyhow::Result<Self> {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new(&config.security)?);

        let credentials = Arc::new(CredentialStore::new(
            repo.clone(),
            hasher,
            &config.accounts.credentials_blob,
            &config.accounts.administrator,
        ));
        let activity = Arc::new(ActivityLogStore::new(
            repo.clone(),
            &config.accounts.activity_blob,
        ));

        let auth_service = Arc::new(BlobAuthService::new(
            credentials.clone(),
            config.accounts.bootstrap_password.clone(),
            config.security.min_password_length,
        )) as Arc<dyn AuthService>;

        let account_service = Arc::new(BlobAccountService::new(
            credentials.clone(),
            &config.security,
        )) as Arc<dyn AccountService>;

        let digest_service = Arc::new(BlobDigestService::new(
            repo.clone(),
            activity.clone(),
            DigestNaming::new(&config.accounts.digest_prefix),
        )) as Arc<dyn DigestService>;

        let stats_service = Arc::new(StatsService::new(activity.clone()));

        Ok(Self {
            config: Arc::new(config),
            repo,
            credentials,
            activity,
            auth_service,
            account_service,
            digest_service,
            stats_service,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
