//! Credential-store implementation of the `AccountService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::SecurityConfig;
use crate::models::account::{validate_email, validate_username};
use crate::models::{Account, AccountSummary};
use crate::password::{generate_password, hash_blocking};
use crate::services::account_service::{AccountError, AccountService, CreatedAccount, NewAccount};
use crate::services::auth_service::Session;
use crate::store::CredentialStore;

pub struct BlobAccountService {
    store: Arc<CredentialStore>,
    min_password_length: usize,
    generated_password_length: usize,
}

impl BlobAccountService {
    #[must_use]
    pub fn new(store: Arc<CredentialStore>, security: &SecurityConfig) -> Self {
        Self {
            store,
            min_password_length: security.min_password_length,
            generated_password_length: security.generated_password_length,
        }
    }

    const fn require_admin(session: &Session) -> Result<(), AccountError> {
        if session.is_administrator {
            Ok(())
        } else {
            Err(AccountError::Forbidden)
        }
    }

    fn check_password(&self, password: &str) -> Result<(), AccountError> {
        if password.chars().count() < self.min_password_length {
            return Err(AccountError::Validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }

    /// Uses `supplied` after checking it, or generates one.
    /// Returns `(password, generated)`.
    fn choose_password(&self, supplied: Option<String>) -> Result<(String, bool), AccountError> {
        match supplied {
            Some(password) => {
                self.check_password(&password)?;
                Ok((password, false))
            }
            None => Ok((generate_password(self.generated_password_length), true)),
        }
    }

    fn summary(&self, account: &Account) -> AccountSummary {
        account.summary(self.store.administrator())
    }
}

fn normalize_email(email: Option<String>) -> Result<Option<String>, AccountError> {
    let email = email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    if let Some(email) = &email {
        validate_email(email).map_err(AccountError::Validation)?;
    }
    Ok(email)
}

#[async_trait]
impl AccountService for BlobAccountService {
    async fn list_accounts(&self, session: &Session) -> Result<Vec<AccountSummary>, AccountError> {
        Self::require_admin(session)?;
        let table = self.store.load().await?;
        Ok(table.values().map(|a| self.summary(a)).collect())
    }

    async fn add_account(
        &self,
        session: &Session,
        account: NewAccount,
    ) -> Result<CreatedAccount, AccountError> {
        Self::require_admin(session)?;
        validate_username(&account.username).map_err(AccountError::Validation)?;
        let email = normalize_email(account.email)?;
        let (password, generated) = self.choose_password(account.password)?;

        let table = self.store.load().await?;
        if table.contains_key(&account.username) {
            return Err(AccountError::Conflict(format!(
                "Account '{}' already exists",
                account.username
            )));
        }
        if table.is_empty() && account.username != self.store.administrator() {
            return Err(AccountError::Validation(
                "Persist the administrator account before adding other users".to_string(),
            ));
        }

        let password_hash = hash_blocking(self.store.hasher(), &password).await?;
        let created = self
            .store
            .create(&account.username, &password_hash, email.as_deref())
            .await?;

        info!(username = %created.username, by = %session.username, "Account added");
        Ok(CreatedAccount {
            account: self.summary(&created),
            generated_password: generated.then_some(password),
        })
    }

    async fn delete_account(
        &self,
        session: &Session,
        username: &str,
    ) -> Result<bool, AccountError> {
        Self::require_admin(session)?;
        Ok(self.store.delete(username).await?)
    }

    async fn reset_password(
        &self,
        session: &Session,
        username: &str,
        password: Option<String>,
    ) -> Result<Option<String>, AccountError> {
        Self::require_admin(session)?;
        let (password, generated) = self.choose_password(password)?;

        let password_hash = hash_blocking(self.store.hasher(), &password).await?;
        let updated = self
            .store
            .update(username, |account| {
                account.password_hash = password_hash;
                account.password_changed = false;
            })
            .await?;

        if updated.is_none() {
            return Err(AccountError::NotFound(username.to_string()));
        }

        info!(username, by = %session.username, "Password reset");
        Ok(generated.then_some(password))
    }

    async fn set_email(
        &self,
        session: &Session,
        username: &str,
        email: Option<String>,
    ) -> Result<AccountSummary, AccountError> {
        Self::require_admin(session)?;
        let email = normalize_email(email)?;

        let updated = self
            .store
            .update(username, |account| account.email = email)
            .await?
            .ok_or_else(|| AccountError::NotFound(username.to_string()))?;

        Ok(self.summary(&updated))
    }

    async fn bootstrap_administrator(
        &self,
        session: &Session,
        password: &str,
        email: Option<String>,
    ) -> Result<AccountSummary, AccountError> {
        Self::require_admin(session)?;
        self.check_password(password)?;
        let email = normalize_email(email)?;

        if !self.store.load().await?.is_empty() {
            return Err(AccountError::Conflict(
                "Credential store already holds accounts".to_string(),
            ));
        }

        let password_hash = hash_blocking(self.store.hasher(), password).await?;
        let account = self
            .store
            .upsert(self.store.administrator(), &password_hash, email.as_deref())
            .await?;

        info!(username = %account.username, "Administrator account persisted");
        Ok(self.summary(&account))
    }
}
