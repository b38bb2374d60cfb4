use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::account::validate_username;

pub const BOOTSTRAP_PASSWORD_ENV: &str = "RASSEGNA_BOOTSTRAP_PASSWORD";
pub const DRIVE_TOKEN_ENV: &str = "RASSEGNA_DRIVE_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub storage: StorageConfig,

    pub accounts: AccountsConfig,

    pub security: SecurityConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; everything is lost on exit.
    Memory,
    /// A directory on the local filesystem.
    Local,
    /// A Google Drive folder.
    Drive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Folder holding every digest and table.
    pub container: String,

    /// Parent directory of the container for the `local` backend.
    pub local_root: String,

    pub drive_api_base: String,

    /// Bearer token for the Drive API. Prefer `RASSEGNA_DRIVE_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_access_token: Option<String>,

    pub request_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            container: "rassegna".to_string(),
            local_root: "./data".to_string(),
            drive_api_base: "https://www.googleapis.com".to_string(),
            drive_access_token: None,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// The one account with administrator rights.
    pub administrator: String,

    /// Emergency password for the administrator, honoured only while the
    /// credential table is empty or unreachable. Unset disables it.
    /// Prefer `RASSEGNA_BOOTSTRAP_PASSWORD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_password: Option<String>,

    pub credentials_blob: String,

    pub activity_blob: String,

    pub digest_prefix: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            administrator: "admin".to_string(),
            bootstrap_password: None,
            credentials_blob: "users.csv".to_string(),
            activity_blob: "views.csv".to_string(),
            digest_prefix: "rassegna_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    pub min_password_length: usize,

    /// Length of passwords generated for new accounts.
    pub generated_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 8,
            generated_password_length: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Sessions expire after this much inactivity.
    pub session_idle_minutes: i64,

    /// Largest digest accepted by the upload endpoint.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6790,
            cors_allowed_origins: vec![
                "http://localhost:6790".to_string(),
                "http://127.0.0.1:6790".to_string(),
            ],
            secure_cookies: true,
            session_idle_minutes: 8 * 60,
            max_upload_mb: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = HashMap::new();
        labels.insert("app".to_string(), "rassegna".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("rassegna").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".rassegna").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Secrets may come from the environment instead of the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(BOOTSTRAP_PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.accounts.bootstrap_password = Some(password);
        }
        if let Some(token) = lookup(DRIVE_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.storage.drive_access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_username(&self.accounts.administrator)
            .map_err(|e| anyhow::anyhow!("Invalid administrator name: {e}"))?;

        if self.accounts.credentials_blob.is_empty() || self.accounts.activity_blob.is_empty() {
            anyhow::bail!("Credential and activity blob names cannot be empty");
        }

        if self.accounts.credentials_blob == self.accounts.activity_blob {
            anyhow::bail!("Credential and activity tables must use different blob names");
        }

        if self.accounts.digest_prefix.is_empty() {
            anyhow::bail!("Digest prefix cannot be empty");
        }

        if self.accounts.bootstrap_password.as_deref() == Some("") {
            anyhow::bail!("Bootstrap password cannot be empty; leave it unset to disable it");
        }

        if self.storage.container.is_empty() {
            anyhow::bail!("Storage container cannot be empty");
        }

        if self.storage.backend == StorageBackend::Drive
            && self.storage.drive_access_token.as_deref().unwrap_or("").is_empty()
        {
            anyhow::bail!("Drive backend requires an access token (set {DRIVE_TOKEN_ENV})");
        }

        if self.security.min_password_length == 0 {
            anyhow::bail!("Minimum password length must be > 0");
        }

        if self.security.generated_password_length < self.security.min_password_length {
            anyhow::bail!("Generated passwords must be at least the minimum password length");
        }

        if self.server.session_idle_minutes <= 0 {
            anyhow::bail!("Session idle timeout must be > 0 minutes");
        }

        Ok(())
    }
}
