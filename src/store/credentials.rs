use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::table::{LegacyLayout, Schema, TableError};
use super::{CSV_CONTENT_TYPE, StoreError};
use crate::blob::{BlobError, BlobRepository};
use crate::models::{Account, AccountTable};
use crate::password::{CredentialHasher, verify_blocking};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn add_empty_email(mut row: Vec<String>) -> Vec<String> {
    row.push(String::new());
    row
}

static CREDENTIAL_SCHEMA: Schema = Schema {
    columns: &[
        "username",
        "password_hash",
        "password_changed",
        "last_modified",
        "email",
    ],
    // Tables written before e-mail addresses were collected.
    legacy: &[LegacyLayout {
        columns: &[
            "username",
            "password_hash",
            "password_changed",
            "last_modified",
        ],
        upgrade: add_empty_email,
    }],
};

/// Username → account mapping kept as one table blob.
pub struct CredentialStore {
    repo: Arc<dyn BlobRepository>,
    hasher: Arc<dyn CredentialHasher>,
    blob_name: String,
    administrator: String,
}

impl CredentialStore {
    pub fn new(
        repo: Arc<dyn BlobRepository>,
        hasher: Arc<dyn CredentialHasher>,
        blob_name: impl Into<String>,
        administrator: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            hasher,
            blob_name: blob_name.into(),
            administrator: administrator.into(),
        }
    }

    #[must_use]
    pub fn administrator(&self) -> &str {
        &self.administrator
    }

    #[must_use]
    pub fn hasher(&self) -> Arc<dyn CredentialHasher> {
        Arc::clone(&self.hasher)
    }

    /// Reads the whole table. A missing blob is an empty table, not an error.
    pub async fn load(&self) -> Result<AccountTable, StoreError> {
        let Some(blob) = self.repo.find_by_name(&self.blob_name).await? else {
            debug!(blob = %self.blob_name, "Credential table absent");
            return Ok(AccountTable::new());
        };

        let bytes = match self.repo.get(&blob.id).await {
            Ok(bytes) => bytes,
            // Deleted between list and get by a concurrent replace.
            Err(BlobError::NotFound(_)) => return Ok(AccountTable::new()),
            Err(e) => return Err(e.into()),
        };

        decode_accounts(&bytes).map_err(|e| StoreError::Corrupt {
            blob: self.blob_name.clone(),
            reason: e.to_string(),
        })
    }

    /// Replaces the table blob with `table`.
    ///
    /// An empty table is never written: it would wipe every account.
    pub async fn save(&self, table: &AccountTable) -> Result<(), StoreError> {
        if table.is_empty() {
            warn!(blob = %self.blob_name, "Refusing to persist an empty credential table");
            return Err(StoreError::GuardRejected(
                "refusing to persist an empty credential table".to_string(),
            ));
        }

        let bytes = encode_accounts(table);
        self.repo
            .replace(&self.blob_name, bytes, CSV_CONTENT_TYPE)
            .await?;
        debug!(blob = %self.blob_name, accounts = table.len(), "Credential table saved");
        Ok(())
    }

    pub async fn get(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.load().await?.remove(username))
    }

    /// Creates or updates `username` with a new password hash.
    ///
    /// Supplying a password always marks it as changed. `email` is only
    /// touched when given.
    pub async fn upsert(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> Result<Account, StoreError> {
        let mut table = self.load().await?;
        let now = now();

        let account = table
            .entry(username.to_string())
            .and_modify(|account| {
                account.password_hash = password_hash.to_string();
                account.password_changed = true;
                account.last_modified = now;
                if let Some(email) = email {
                    account.email = non_empty(email);
                }
            })
            .or_insert_with(|| Account {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                password_changed: true,
                last_modified: now,
                email: email.and_then(non_empty),
            })
            .clone();

        self.save(&table).await?;
        Ok(account)
    }

    /// Adds a brand-new account whose password was set by someone other
    /// than its holder. Fails if the username is taken.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
    ) -> Result<Account, StoreError> {
        let mut table = self.load().await?;
        if table.contains_key(username) {
            return Err(StoreError::AlreadyExists(username.to_string()));
        }
        let account = Account {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            password_changed: false,
            last_modified: now(),
            email: email.and_then(non_empty),
        };
        table.insert(account.username.clone(), account.clone());
        self.save(&table).await?;
        info!(username = %account.username, "Account created");
        Ok(account)
    }

    /// Applies `change` to an existing account and stamps it.
    /// Returns `None` (and writes nothing) when the account does not exist.
    pub async fn update<F>(&self, username: &str, change: F) -> Result<Option<Account>, StoreError>
    where
        F: FnOnce(&mut Account) + Send,
    {
        let mut table = self.load().await?;
        let Some(account) = table.get_mut(username) else {
            return Ok(None);
        };
        change(account);
        account.last_modified = now();
        let updated = account.clone();

        self.save(&table).await?;
        Ok(Some(updated))
    }

    /// Removes `username`. Returns whether it existed.
    pub async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        if username == self.administrator {
            warn!(username, "Refusing to delete the administrator account");
            return Err(StoreError::GuardRejected(format!(
                "the administrator account '{username}' cannot be deleted"
            )));
        }

        let mut table = self.load().await?;
        if table.remove(username).is_none() {
            return Ok(false);
        }

        self.save(&table).await?;
        info!(username, "Account deleted");
        Ok(true)
    }

    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let table = self.load().await?;
        self.verify_in(&table, username, password).await
    }

    /// Checks `password` against an already loaded table.
    pub async fn verify_in(
        &self,
        table: &AccountTable,
        username: &str,
        password: &str,
    ) -> Result<bool, StoreError> {
        let Some(account) = table.get(username) else {
            return Ok(false);
        };
        verify_blocking(self.hasher(), password, &account.password_hash)
            .await
            .map_err(|e| StoreError::Hashing(e.to_string()))
    }
}

fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn encode_accounts(table: &AccountTable) -> Vec<u8> {
    CREDENTIAL_SCHEMA.encode(table.values().map(|account| {
        vec![
            account.username.clone(),
            account.password_hash.clone(),
            if account.password_changed { "yes" } else { "no" }.to_string(),
            account.last_modified.format(DATETIME_FORMAT).to_string(),
            account.email.clone().unwrap_or_default(),
        ]
    }))
}

fn decode_accounts(bytes: &[u8]) -> Result<AccountTable, TableError> {
    let decoded = CREDENTIAL_SCHEMA.decode(bytes)?;
    if let Some(columns) = decoded.migrated_from {
        info!(from = %columns.join(","), "Upgrading credential table layout");
    }

    let mut table = AccountTable::new();
    for (line, mut row) in decoded.rows {
        let email = row.pop().unwrap_or_default();
        let last_modified = row.pop().unwrap_or_default();
        let password_changed = row.pop().unwrap_or_default();
        let password_hash = row.pop().unwrap_or_default();
        let username = row.pop().unwrap_or_default();

        if username.is_empty() {
            return Err(TableError::InvalidValue {
                line,
                reason: "empty username".to_string(),
            });
        }
        if table.contains_key(&username) {
            return Err(TableError::InvalidValue {
                line,
                reason: format!("duplicate username '{username}'"),
            });
        }

        let password_changed = match password_changed.trim() {
            "yes" => true,
            "no" => false,
            other => {
                return Err(TableError::InvalidValue {
                    line,
                    reason: format!("password_changed must be yes or no, found '{other}'"),
                });
            }
        };

        let last_modified =
            parse_timestamp(last_modified.trim()).ok_or_else(|| TableError::InvalidValue {
                line,
                reason: format!("unreadable last_modified '{last_modified}'"),
            })?;

        table.insert(
            username.clone(),
            Account {
                username,
                password_hash,
                password_changed,
                last_modified,
                email: non_empty(&email),
            },
        );
    }

    Ok(table)
}

/// Accepts full timestamps and the bare dates older tables carried.
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
