//! Domain service for account administration.

use serde::Serialize;
use thiserror::Error;

use crate::models::AccountSummary;
use crate::services::auth_service::Session;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Administrator rights required")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// An unsafe change refused before anything was written.
    #[error("Refused: {0}")]
    Guard(String),

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::GuardRejected(msg) => Self::Guard(msg),
            StoreError::AlreadyExists(username) => {
                Self::Conflict(format!("Account '{username}' already exists"))
            }
            other @ (StoreError::Corrupt { .. } | StoreError::Hashing(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    /// Generated when absent.
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedAccount {
    pub account: AccountSummary,

    /// Only set when the password was generated; shown once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

/// Domain service trait for account administration.
///
/// Every operation requires an administrator session.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    async fn list_accounts(&self, session: &Session) -> Result<Vec<AccountSummary>, AccountError>;

    /// # Errors
    ///
    /// Returns [`AccountError::Conflict`] if the username is taken.
    async fn add_account(
        &self,
        session: &Session,
        account: NewAccount,
    ) -> Result<CreatedAccount, AccountError>;

    /// Returns whether the account existed.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Guard`] for the administrator account.
    async fn delete_account(&self, session: &Session, username: &str)
    -> Result<bool, AccountError>;

    /// Sets a new password chosen by the administrator (or generated) and
    /// flags it as not yet changed by its holder. Returns the generated one.
    async fn reset_password(
        &self,
        session: &Session,
        username: &str,
        password: Option<String>,
    ) -> Result<Option<String>, AccountError>;

    /// `None` clears the address.
    async fn set_email(
        &self,
        session: &Session,
        username: &str,
        email: Option<String>,
    ) -> Result<AccountSummary, AccountError>;

    /// Persists the administrator account after a break-glass login.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Conflict`] unless the credential store is empty.
    async fn bootstrap_administrator(
        &self,
        session: &Session,
        password: &str,
        email: Option<String>,
    ) -> Result<AccountSummary, AccountError>;
}
