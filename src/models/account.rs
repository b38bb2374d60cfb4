use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Accounts keyed by username. Ordered so the serialized table is stable.
pub type AccountTable = BTreeMap<String, Account>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,

    /// Argon2 PHC string; never the clear-text password.
    pub password_hash: String,

    /// Whether the holder has chosen their own password since the account was created.
    pub password_changed: bool,

    pub last_modified: NaiveDateTime,

    pub email: Option<String>,
}

impl Account {
    #[must_use]
    pub fn summary(&self, administrator: &str) -> AccountSummary {
        AccountSummary {
            username: self.username.clone(),
            password_changed: self.password_changed,
            last_modified: self.last_modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            email: self.email.clone(),
            is_administrator: self.username == administrator,
        }
    }
}

/// Account view safe to hand out: everything except the hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountSummary {
    pub username: String,
    pub password_changed: bool,
    pub last_modified: String,
    pub email: Option<String>,
    pub is_administrator: bool,
}

/// Usernames end up as bare cells in a comma-separated table, so the
/// characters that would break a row are rejected up front.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username is required".to_string());
    }
    if username.trim() != username {
        return Err("Username must not start or end with whitespace".to_string());
    }
    if username.chars().any(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        return Err("Username must not contain commas, quotes or line breaks".to_string());
    }
    if username.chars().count() > 64 {
        return Err("Username must be at most 64 characters".to_string());
    }
    Ok(())
}

/// Loose shape check; delivery is someone else's problem.
pub fn validate_email(email: &str) -> Result<(), String> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("E-mail address must contain '@'".to_string());
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(format!("Invalid e-mail address '{email}'"));
    }
    if email
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ',' | '"'))
    {
        return Err("E-mail address must not contain spaces, commas or quotes".to_string());
    }
    Ok(())
}
