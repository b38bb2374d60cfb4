//! Domain service for authentication.
//!
//! Handles login (including the break-glass administrator path) and
//! self-service password changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AccountSummary;
use crate::store::StoreError;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user and wrong password are deliberately the same error.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Who is logged in. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub is_administrator: bool,
}

impl Session {
    #[must_use]
    pub fn new(username: &str, administrator: &str) -> Self {
        Self {
            username: username.to_string(),
            is_administrator: username == administrator,
        }
    }
}

/// Why a login succeeded on the break-glass path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginWarning {
    /// No account is stored yet; the administrator should persist one.
    StoreEmpty,
    /// The credential store could not be reached.
    StoreUnreachable,
}

impl LoginWarning {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StoreEmpty => "store_empty",
            Self::StoreUnreachable => "store_unreachable",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub session: Session,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<LoginWarning>,

    /// The account still has the password it was given by the administrator.
    pub must_change_password: bool,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails and
    /// [`AuthError::StoreUnavailable`] when the credential store cannot be
    /// read and the break-glass path does not apply.
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError>;

    /// Stored account behind a session; `None` for a break-glass session.
    async fn account_info(&self, session: &Session) -> Result<Option<AccountSummary>, AuthError>;

    /// Changes the session holder's own password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is incorrect,
    /// the new one is too short or unchanged, or no stored account exists.
    async fn change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
