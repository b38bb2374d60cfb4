//! Credential-store implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::AccountSummary;
use crate::password::hash_blocking;
use crate::services::auth_service::{AuthError, AuthService, LoginOutcome, LoginWarning, Session};
use crate::store::{CredentialStore, StoreError};

pub struct BlobAuthService {
    store: Arc<CredentialStore>,
    bootstrap_password: Option<String>,
    min_password_length: usize,
}

impl BlobAuthService {
    #[must_use]
    pub const fn new(
        store: Arc<CredentialStore>,
        bootstrap_password: Option<String>,
        min_password_length: usize,
    ) -> Self {
        Self {
            store,
            bootstrap_password,
            min_password_length,
        }
    }

    fn is_bootstrap_login(&self, username: &str, password: &str) -> bool {
        username == self.store.administrator()
            && self
                .bootstrap_password
                .as_deref()
                .is_some_and(|secret| secret == password)
    }

    fn break_glass(&self, username: &str, warning: LoginWarning) -> LoginOutcome {
        warn!(
            username,
            reason = warning.as_str(),
            "Break-glass administrator login"
        );
        metrics::counter!("breakglass_logins_total", "reason" => warning.as_str()).increment(1);
        record_login("breakglass");

        LoginOutcome {
            session: Session::new(username, self.store.administrator()),
            warning: Some(warning),
            must_change_password: true,
        }
    }
}

fn record_login(outcome: &'static str) {
    metrics::counter!("logins_total", "outcome" => outcome).increment(1);
}

#[async_trait]
impl AuthService for BlobAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        if username.is_empty() || password.is_empty() {
            record_login("failure");
            return Err(AuthError::InvalidCredentials);
        }

        let table = match self.store.load().await {
            Ok(table) => table,
            Err(StoreError::Unavailable(msg)) => {
                if self.is_bootstrap_login(username, password) {
                    warn!(error = %msg, "Credential store unreachable during administrator login");
                    return Ok(self.break_glass(username, LoginWarning::StoreUnreachable));
                }
                record_login("unavailable");
                return Err(AuthError::StoreUnavailable(msg));
            }
            Err(e) => {
                record_login("error");
                return Err(e.into());
            }
        };

        // The bootstrap secret only opens an empty store; once any account
        // exists, only stored hashes count.
        if table.is_empty() {
            if self.is_bootstrap_login(username, password) {
                return Ok(self.break_glass(username, LoginWarning::StoreEmpty));
            }
            record_login("failure");
            return Err(AuthError::InvalidCredentials);
        }

        let Some(account) = table.get(username) else {
            record_login("failure");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.store.verify_in(&table, username, password).await? {
            record_login("failure");
            return Err(AuthError::InvalidCredentials);
        }

        record_login("success");
        info!(username, "User logged in");
        Ok(LoginOutcome {
            session: Session::new(username, self.store.administrator()),
            warning: None,
            must_change_password: !account.password_changed,
        })
    }

    async fn account_info(&self, session: &Session) -> Result<Option<AccountSummary>, AuthError> {
        let account = self.store.get(&session.username).await?;
        Ok(account.map(|a| a.summary(self.store.administrator())))
    }

    async fn change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.chars().count() < self.min_password_length {
            return Err(AuthError::Validation(format!(
                "New password must be at least {} characters",
                self.min_password_length
            )));
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let table = self.store.load().await?;
        if !table.contains_key(&session.username) {
            return Err(AuthError::Validation(
                "No stored account for this session".to_string(),
            ));
        }

        if !self
            .store
            .verify_in(&table, &session.username, current_password)
            .await?
        {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let hash = hash_blocking(self.store.hasher(), new_password).await?;
        let updated = self
            .store
            .update(&session.username, |account| {
                account.password_hash = hash;
                account.password_changed = true;
            })
            .await?;

        if updated.is_none() {
            return Err(AuthError::Validation(
                "No stored account for this session".to_string(),
            ));
        }

        info!(username = %session.username, "Password changed");
        Ok(())
    }
}
